// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Fan-out orchestrator
//!
//! Turns one [`Operation`] into the backend calls it needs, runs them
//! concurrently and merges the outcomes into one JSON response. Two shapes:
//!
//! - *flat*: independent calls issued together (e.g. one per server)
//! - *discovery then fan-out*: a listing call first, then one data call per
//!   discovered identifier. A failed listing short-circuits with one error.
//!
//! Every target gets an entry in the response; a failed target carries an
//! `{"error": ...}` object instead of a series. [`Orchestrator::run`] never
//! fails.

pub mod logs;
pub mod operation;
pub mod router;
pub mod servers;

pub use operation::{Operation, DEFAULT_TIME_RANGE};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::connector::{
    DozzleConnector, LogBackend, MetricsBackend, NetdataConnector, RouterBackend, RouterConnector,
};
use crate::error::{BackendResult, ErrorBody};
use crate::series::{self, SeriesResult};

/// Per-target outcome: the value, or a structured error in its place
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetResult<T = SeriesResult> {
    Ok(T),
    Error(ErrorBody),
}

impl<T> TargetResult<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, TargetResult::Error(_))
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            TargetResult::Ok(value) => Some(value),
            TargetResult::Error(_) => None,
        }
    }
}

impl<T> From<Result<T, ErrorBody>> for TargetResult<T> {
    fn from(result: Result<T, ErrorBody>) -> Self {
        match result {
            Ok(value) => TargetResult::Ok(value),
            Err(body) => TargetResult::Error(body),
        }
    }
}

impl<T> From<BackendResult<T>> for TargetResult<T> {
    fn from(result: BackendResult<T>) -> Self {
        result.map_err(ErrorBody::from).into()
    }
}

impl TargetResult<SeriesResult> {
    /// Normalize a raw time-series call
    pub fn series(result: BackendResult) -> Self {
        series::normalize_result(&result).into()
    }
}

/// Run one future per target concurrently and key the outputs by target.
///
/// Each call owns its own timeout, so a slow target never cancels its
/// siblings.
pub async fn fan_out<K, F, Fut, T>(targets: impl IntoIterator<Item = K>, call: F) -> BTreeMap<K, T>
where
    K: Ord + Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = T>,
{
    let calls = targets.into_iter().map(|target| {
        let fut = call(target.clone());
        async move { (target, fut.await) }
    });
    join_all(calls).await.into_iter().collect()
}

/// Count error entries in a fan-out result, for logging
fn failures<K, T>(results: &BTreeMap<K, TargetResult<T>>) -> usize {
    results.values().filter(|r| r.is_error()).count()
}

/// Serialize a response, falling back to an error object
fn to_response<T: Serialize>(result: Result<T, ErrorBody>) -> Value {
    let value = result.and_then(|report| {
        serde_json::to_value(report)
            .map_err(|e| ErrorBody::new(format!("Serialization error: {}", e)))
    });
    match value {
        Ok(value) => value,
        Err(body) => serde_json::to_value(&body)
            .unwrap_or_else(|_| serde_json::json!({ "error": body.error })),
    }
}

/// Executes operations against the configured backends
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    metrics: Arc<dyn MetricsBackend>,
    router: Option<Arc<dyn RouterBackend>>,
    logs: Option<Arc<dyn LogBackend>>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, metrics: Arc<dyn MetricsBackend>) -> Self {
        Self {
            config,
            metrics,
            router: None,
            logs: None,
        }
    }

    pub fn with_router(mut self, router: Arc<dyn RouterBackend>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_logs(mut self, logs: Arc<dyn LogBackend>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Wire the real connectors for every enabled backend
    pub fn from_config(config: Arc<Config>) -> Self {
        let metrics = Arc::new(NetdataConnector::from_config(&config));
        let router = RouterConnector::from_config(&config);
        let logs = DozzleConnector::from_config(&config);

        let mut orchestrator = Self::new(config, metrics);
        if let Some(router) = router {
            orchestrator = orchestrator.with_router(Arc::new(router));
        }
        if let Some(logs) = logs {
            orchestrator = orchestrator.with_logs(Arc::new(logs));
        }
        orchestrator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute an operation; failures are carried inside the response
    pub async fn run(&self, op: &Operation) -> Value {
        log::debug!("running {}", op.name());
        match op {
            Operation::ServersOverview => to_response(Ok(self.servers_overview().await)),
            Operation::ServerHealth { server } => to_response(Ok(self.server_health(server).await)),
            Operation::NetworkStats { server, time_range } => {
                to_response(self.network_stats(server, *time_range).await)
            }
            Operation::ListContainers { server } => to_response(self.list_containers(server).await),
            Operation::ContainerStats { server } => {
                to_response(self.container_stats(server).await)
            }
            Operation::RouterInterfaces => to_response(self.router_interfaces().await),
            Operation::RouterResources => to_response(self.router_resources().await),
            Operation::RouterDhcpLeases => to_response(self.router_dhcp_leases().await),
            Operation::RouterTraffic => to_response(self.router_traffic().await),
            Operation::LogHosts => to_response(self.log_hosts().await),
            Operation::LogContainers => to_response(self.log_containers().await),
            Operation::ContainerLogs { container, query } => {
                to_response(self.container_logs(container, query).await)
            }
        }
    }
}

/// In-memory backends for orchestrator tests
#[cfg(test)]
pub(crate) mod fakes {
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use crate::connector::{
        ContainerSummary, Endpoint, LogBackend, LogPage, LogQuery, MetricsBackend, RouterBackend,
        RouterRecord,
    };
    use crate::error::{BackendError, BackendResult};

    /// Canned replies keyed by `"<server> <path>"`; unknown keys are 404s
    #[derive(Default)]
    pub struct FakeMetrics {
        pub replies: BTreeMap<String, BackendResult>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeMetrics {
        pub fn reply(mut self, server: &str, path: &str, result: BackendResult) -> Self {
            self.replies.insert(format!("{} {}", server, path), result);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl MetricsBackend for FakeMetrics {
        async fn query(&self, server: &str, endpoint: &Endpoint) -> BackendResult {
            let key = format!("{} {}", server, endpoint.path());
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(key.clone());
            }
            self.replies
                .get(&key)
                .cloned()
                .unwrap_or(Err(BackendError::HttpStatus(404)))
        }
    }

    pub fn series_payload(value: f64) -> Value {
        serde_json::json!({
            "labels": ["time", "value"],
            "data": [[1700000000, value]],
            "dimension_names": ["value"],
            "dimension_ids": ["value"]
        })
    }

    pub fn chart_list(ids: &[&str]) -> Value {
        let charts: serde_json::Map<String, Value> = ids
            .iter()
            .map(|id| (id.to_string(), serde_json::json!({ "id": id })))
            .collect();
        serde_json::json!({ "charts": charts })
    }

    #[derive(Default)]
    pub struct FakeRouter {
        pub replies: BTreeMap<String, BackendResult<Vec<RouterRecord>>>,
    }

    impl FakeRouter {
        pub fn reply(mut self, path: &str, records: &[&[(&str, &str)]]) -> Self {
            let records = records
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .collect();
            self.replies.insert(path.to_string(), Ok(records));
            self
        }

        pub fn fail(mut self, path: &str, err: BackendError) -> Self {
            self.replies.insert(path.to_string(), Err(err));
            self
        }
    }

    #[async_trait]
    impl RouterBackend for FakeRouter {
        async fn query(&self, path: &str) -> BackendResult<Vec<RouterRecord>> {
            self.replies
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(BackendError::Transport("no such path".into())))
        }
    }

    pub struct FakeLogs {
        pub containers: BackendResult<Vec<ContainerSummary>>,
        pub logs: BTreeMap<(String, String), String>,
        pub log_calls: Mutex<Vec<(String, String, LogQuery)>>,
    }

    impl FakeLogs {
        pub fn new(containers: BackendResult<Vec<ContainerSummary>>) -> Self {
            Self {
                containers,
                logs: BTreeMap::new(),
                log_calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_log(mut self, host: &str, id: &str, body: &str) -> Self {
            self.logs
                .insert((host.to_string(), id.to_string()), body.to_string());
            self
        }
    }

    pub fn container(id: &str, name: &str, host: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.into(),
            name: name.into(),
            image: format!("{}:latest", name),
            state: "running".into(),
            host: host.into(),
            ..ContainerSummary::default()
        }
    }

    #[async_trait]
    impl LogBackend for FakeLogs {
        async fn containers(&self) -> BackendResult<Vec<ContainerSummary>> {
            self.containers.clone()
        }

        async fn logs(
            &self,
            host_id: &str,
            container_id: &str,
            query: &LogQuery,
        ) -> BackendResult<LogPage> {
            if let Ok(mut calls) = self.log_calls.lock() {
                calls.push((host_id.into(), container_id.into(), query.clone()));
            }
            match self.logs.get(&(host_id.to_string(), container_id.to_string())) {
                Some(body) => Ok(LogPage::from_json_lines(body, query)),
                None => Err(BackendError::HttpStatus(404)),
            }
        }
    }
}
