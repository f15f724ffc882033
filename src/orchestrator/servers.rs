// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Metrics-server operations

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::{failures, fan_out, Orchestrator, TargetResult};
use crate::connector::Endpoint;
use crate::error::{BackendError, ErrorBody};

/// Overview look-back, in seconds
const OVERVIEW_WINDOW: u64 = 60;

/// Health look-back, in seconds
const HEALTH_WINDOW: u64 = 600;

/// Reachability derived from the info call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerOverview {
    pub status: ServerStatus,
    pub context: String,
    /// `None` when the server is offline
    pub hostname: Option<String>,
    pub cpu: TargetResult,
    pub ram: TargetResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerHealthReport {
    pub server_name: String,
    pub context: String,
    pub info: TargetResult<Value>,
    pub cpu: TargetResult,
    pub ram: TargetResult,
    /// One series per `disk_space.*` chart, or the discovery error
    pub disk: TargetResult<BTreeMap<String, TargetResult>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub server_name: String,
    pub context: String,
    pub time_range_seconds: u64,
    pub available_charts: Vec<String>,
    pub network_data: BTreeMap<String, TargetResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerList {
    pub server_name: String,
    pub context: String,
    pub container_count: usize,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatsReport {
    pub server_name: String,
    pub context: String,
    pub container_stats: BTreeMap<String, TargetResult>,
}

fn is_network_chart(id: &str) -> bool {
    id.starts_with("net.") || id.starts_with("net_packets.")
}

fn is_container_chart(id: &str) -> bool {
    id.contains("cgroup_") || id.contains("docker_")
}

fn is_container_usage_chart(id: &str) -> bool {
    id.contains("cgroup") && (id.contains("cpu") || id.contains("mem"))
}

/// Container name from a chart id such as `cgroup_nginx.cpu`
fn container_name(chart_id: &str) -> Option<String> {
    let (family, rest) = chart_id.split_once('.')?;
    let name = ["cgroup_", "docker_"]
        .iter()
        .find_map(|prefix| family.strip_prefix(prefix))
        .unwrap_or_else(|| rest.rsplit('.').next().unwrap_or(rest));
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl Orchestrator {
    /// Discovery step: chart ids on `server` that pass `keep`
    async fn discover_charts(
        &self,
        server: &str,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, ErrorBody> {
        let listing = self
            .metrics
            .query(server, &Endpoint::Charts)
            .await
            .map_err(ErrorBody::from)?;
        let charts = listing
            .get("charts")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ErrorBody::from(BackendError::Decode(
                    "chart listing has no 'charts' object".into(),
                ))
            })?;
        Ok(charts.keys().filter(|id| keep(id)).cloned().collect())
    }

    async fn chart_series(&self, server: &str, endpoint: Endpoint) -> TargetResult {
        TargetResult::series(self.metrics.query(server, &endpoint).await)
    }

    async fn server_overview(&self, server: String) -> ServerOverview {
        let info = Endpoint::Info;
        let cpu = Endpoint::data("system.cpu", OVERVIEW_WINDOW).with_points(1);
        let ram = Endpoint::data("system.ram", OVERVIEW_WINDOW).with_points(1);
        let (info, cpu, ram) = tokio::join!(
            self.metrics.query(&server, &info),
            self.chart_series(&server, cpu),
            self.chart_series(&server, ram),
        );

        let (status, hostname) = match &info {
            Ok(info) => (
                ServerStatus::Online,
                Some(
                    info.get("hostname")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                ),
            ),
            Err(e) => {
                log::debug!("{} offline: {}", server, e);
                (ServerStatus::Offline, None)
            }
        };

        ServerOverview {
            status,
            context: self.config.server_context(&server),
            hostname,
            cpu,
            ram,
        }
    }

    /// Flat fan-out: every configured server at once
    pub async fn servers_overview(&self) -> BTreeMap<String, ServerOverview> {
        let names: Vec<String> = self.config.servers.keys().cloned().collect();
        fan_out(names, move |name| self.server_overview(name)).await
    }

    async fn disk_usage(&self, server: &str) -> TargetResult<BTreeMap<String, TargetResult>> {
        let charts = match self
            .discover_charts(server, |id| id.starts_with("disk_space."))
            .await
        {
            Ok(charts) => charts,
            Err(e) => return TargetResult::Error(e),
        };
        let results = fan_out(charts, move |chart| {
            self.chart_series(server, Endpoint::data(chart, HEALTH_WINDOW))
        })
        .await;
        log::debug!(
            "{}: {} disk charts, {} failed",
            server,
            results.len(),
            failures(&results)
        );
        TargetResult::Ok(results)
    }

    /// Info, CPU, RAM and disk discovery run together; a failed disk
    /// discovery only fills the `disk` entry with its error
    pub async fn server_health(&self, server: &str) -> ServerHealthReport {
        let info = Endpoint::Info;
        let cpu = Endpoint::data("system.cpu", HEALTH_WINDOW);
        let ram = Endpoint::data("system.ram", HEALTH_WINDOW);
        let (info, cpu, ram, disk) = tokio::join!(
            self.metrics.query(server, &info),
            self.chart_series(server, cpu),
            self.chart_series(server, ram),
            self.disk_usage(server),
        );

        ServerHealthReport {
            server_name: server.to_string(),
            context: self.config.server_context(server),
            info: info.into(),
            cpu,
            ram,
            disk,
        }
    }

    pub async fn network_stats(
        &self,
        server: &str,
        time_range: u64,
    ) -> Result<NetworkReport, ErrorBody> {
        let charts = self.discover_charts(server, is_network_chart).await?;
        let network_data = fan_out(charts.clone(), move |chart| {
            self.chart_series(server, Endpoint::data(chart, time_range))
        })
        .await;
        log::debug!(
            "{}: {} network charts, {} failed",
            server,
            network_data.len(),
            failures(&network_data)
        );

        Ok(NetworkReport {
            server_name: server.to_string(),
            context: self.config.server_context(server),
            time_range_seconds: time_range,
            available_charts: charts,
            network_data,
        })
    }

    pub async fn list_containers(&self, server: &str) -> Result<ContainerList, ErrorBody> {
        let charts = self.discover_charts(server, is_container_chart).await?;
        let names: BTreeSet<String> = charts.iter().filter_map(|id| container_name(id)).collect();

        Ok(ContainerList {
            server_name: server.to_string(),
            context: self.config.server_context(server),
            container_count: names.len(),
            containers: names.into_iter().collect(),
        })
    }

    pub async fn container_stats(&self, server: &str) -> Result<ContainerStatsReport, ErrorBody> {
        let charts = self.discover_charts(server, is_container_usage_chart).await?;
        let container_stats = fan_out(charts, move |chart| {
            self.chart_series(server, Endpoint::latest(chart))
        })
        .await;

        Ok(ContainerStatsReport {
            server_name: server.to_string(),
            context: self.config.server_context(server),
            container_stats,
        })
    }
}
