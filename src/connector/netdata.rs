// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Netdata metrics-server connector

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use super::HttpConnector;
use crate::config::Config;
use crate::error::{BackendError, BackendResult};

/// Netdata `/api/v1` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Agent info (hostname, version, OS)
    Info,
    /// Chart catalogue, used for discovery
    Charts,
    /// Time-series for one chart
    Data {
        chart: String,
        /// Look back this many seconds
        after_secs: Option<u64>,
        /// Number of points to aggregate into
        points: Option<u32>,
    },
}

impl Endpoint {
    /// Data for `chart` over the last `after_secs` seconds
    pub fn data(chart: impl Into<String>, after_secs: u64) -> Self {
        Endpoint::Data {
            chart: chart.into(),
            after_secs: Some(after_secs),
            points: None,
        }
    }

    /// Latest single point of `chart`
    pub fn latest(chart: impl Into<String>) -> Self {
        Endpoint::Data {
            chart: chart.into(),
            after_secs: None,
            points: Some(1),
        }
    }

    pub fn with_points(self, points: u32) -> Self {
        match self {
            Endpoint::Data {
                chart, after_secs, ..
            } => Endpoint::Data {
                chart,
                after_secs,
                points: Some(points),
            },
            other => other,
        }
    }

    /// Path relative to `/api/v1/`
    pub fn path(&self) -> String {
        match self {
            Endpoint::Info => "info".into(),
            Endpoint::Charts => "charts".into(),
            Endpoint::Data {
                chart,
                after_secs,
                points,
            } => {
                let mut path = format!("data?chart={}", chart);
                if let Some(after) = after_secs {
                    path.push_str(&format!("&after=-{}", after));
                }
                if let Some(points) = points {
                    path.push_str(&format!("&points={}", points));
                }
                path
            }
        }
    }
}

/// Query interface of a time-series metrics server
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn query(&self, server: &str, endpoint: &Endpoint) -> BackendResult;
}

/// HTTP connector for a set of Netdata agents keyed by server name
#[derive(Debug, Clone)]
pub struct NetdataConnector {
    http: HttpConnector,
    servers: BTreeMap<String, String>,
    timeout: Duration,
}

impl NetdataConnector {
    pub fn new(servers: BTreeMap<String, String>, timeout: Duration) -> Self {
        let servers = servers
            .into_iter()
            .map(|(name, url)| (name, url.trim_end_matches('/').to_string()))
            .collect();
        Self {
            http: HttpConnector::new(),
            servers,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let servers = config
            .servers
            .iter()
            .map(|(name, srv)| (name.clone(), srv.netdata_url.clone()))
            .collect();
        Self::new(servers, config.timeouts.metrics())
    }

    /// Full URL of an endpoint on a server
    pub fn url(&self, server: &str, endpoint: &Endpoint) -> BackendResult<String> {
        let base = self
            .servers
            .get(server)
            .ok_or_else(|| BackendError::NotFound(format!("Unknown server: {}", server)))?;
        Ok(format!("{}/api/v1/{}", base, endpoint.path()))
    }
}

#[async_trait]
impl MetricsBackend for NetdataConnector {
    async fn query(&self, server: &str, endpoint: &Endpoint) -> BackendResult {
        let url = self.url(server, endpoint)?;
        log::trace!("netdata {} -> {}", server, url);
        self.http.get_json(&url, self.timeout).await
    }
}
