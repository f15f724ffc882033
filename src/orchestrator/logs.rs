// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Log-aggregator operations

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{Orchestrator, TargetResult};
use crate::connector::{ContainerSummary, LogBackend, LogPage, LogQuery};
use crate::error::{BackendError, ErrorBody};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogHost {
    pub id: String,
    pub container_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogHostsReport {
    pub description: String,
    pub host_count: usize,
    pub hosts: Vec<LogHost>,
}

/// Container as shown to the caller; missing health reads `N/A`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub health: String,
    pub host: String,
    pub created: Option<Value>,
    pub started_at: Option<Value>,
}

impl From<ContainerSummary> for ContainerView {
    fn from(c: ContainerSummary) -> Self {
        Self {
            id: c.id,
            name: c.name,
            image: c.image,
            state: c.state,
            health: c.health.unwrap_or_else(|| "N/A".into()),
            host: c.host,
            created: c.created,
            started_at: c.started_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogContainersReport {
    pub description: String,
    pub container_count: usize,
    pub containers: Vec<ContainerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerLogsReport {
    pub container_id: String,
    pub container_name: String,
    pub host_id: String,
    pub requested_tail: usize,
    pub logs: TargetResult<LogPage>,
}

/// Hosts in first-seen order with their container counts
pub fn group_by_host(containers: &[ContainerSummary]) -> Vec<LogHost> {
    let mut hosts: Vec<LogHost> = Vec::new();
    for container in containers.iter().filter(|c| !c.host.is_empty()) {
        match hosts.iter_mut().find(|h| h.id == container.host) {
            Some(host) => host.container_count += 1,
            None => hosts.push(LogHost {
                id: container.host.clone(),
                container_count: 1,
            }),
        }
    }
    hosts
}

/// First container whose id or name matches
pub fn find_container<'a>(
    containers: &'a [ContainerSummary],
    id_or_name: &str,
) -> Option<&'a ContainerSummary> {
    containers
        .iter()
        .find(|c| c.id == id_or_name || c.name == id_or_name)
        .filter(|c| !c.host.is_empty())
}

impl Orchestrator {
    fn log_backend(&self) -> Result<(&Arc<dyn LogBackend>, String), ErrorBody> {
        match (&self.logs, self.config.log_aggregator()) {
            (Some(backend), Some(cfg)) => Ok((backend, cfg.description.clone())),
            _ => Err(BackendError::NotFound("Dozzle not enabled in config".into()).into()),
        }
    }

    pub async fn log_hosts(&self) -> Result<LogHostsReport, ErrorBody> {
        let (backend, description) = self.log_backend()?;
        let containers = backend.containers().await?;
        let hosts = group_by_host(&containers);
        Ok(LogHostsReport {
            description,
            host_count: hosts.len(),
            hosts,
        })
    }

    pub async fn log_containers(&self) -> Result<LogContainersReport, ErrorBody> {
        let (backend, description) = self.log_backend()?;
        let containers: Vec<ContainerView> = backend
            .containers()
            .await?
            .into_iter()
            .map(ContainerView::from)
            .collect();
        Ok(LogContainersReport {
            description,
            container_count: containers.len(),
            containers,
        })
    }

    /// Discovery (container list, resolve host) then the logs call
    pub async fn container_logs(
        &self,
        id_or_name: &str,
        query: &LogQuery,
    ) -> Result<ContainerLogsReport, ErrorBody> {
        let (backend, _) = self.log_backend()?;
        let containers = backend.containers().await?;
        let container = find_container(&containers, id_or_name).ok_or_else(|| {
            ErrorBody::new(format!("Container {} not found", id_or_name))
                .with_hint("Use get_dozzle_containers to list available containers")
        })?;

        let logs = backend
            .logs(&container.host, &container.id, query)
            .await
            .into();
        Ok(ContainerLogsReport {
            container_id: container.id.clone(),
            container_name: container.name.clone(),
            host_id: container.host.clone(),
            requested_tail: query.tail,
            logs,
        })
    }
}
