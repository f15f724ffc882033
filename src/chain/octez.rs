// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Octez (Tezos) node collector over the node RPC

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{Chart, Collector, Dimension, Sample, SyncLag};
use crate::connector::HttpConnector;
use crate::error::BackendResult;

const UPDATE_EVERY: Duration = Duration::from_secs(10);

const HEAD_HEADER: &str = "/chains/main/blocks/head/header";
const CONNECTIONS: &str = "/network/connections";
const HEAD_OPERATIONS: &str = "/chains/main/blocks/head/operations";
const BOOTSTRAPPED: &str = "/chains/main/is_bootstrapped";

pub struct OctezCollector {
    http: HttpConnector,
    rpc_url: String,
    timeout: Duration,
}

impl OctezCollector {
    pub fn new(rpc_url: &str, timeout: Duration) -> Self {
        Self {
            http: HttpConnector::new(),
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn rpc(&self, path: &str) -> BackendResult {
        let url = format!("{}{}", self.rpc_url, path);
        self.http.get_json(&url, self.timeout).await.map_err(|e| {
            log::error!("Failed to fetch {}: {}", path, e);
            e
        })
    }
}

/// `is_bootstrapped` reply; anything but a bootstrapped, synced node is syncing
pub fn sync_lag(bootstrapped: &Value) -> SyncLag {
    let is_bootstrapped = bootstrapped["bootstrapped"].as_bool().unwrap_or(false);
    let state = bootstrapped["sync_state"].as_str().unwrap_or("unknown");
    if !is_bootstrapped || matches!(state, "syncing" | "unsynced") {
        SyncLag::Syncing
    } else {
        SyncLag::Synced
    }
}

/// Total operations across all validation passes of a block
pub fn count_operations(passes: &Value) -> i64 {
    passes
        .as_array()
        .map(|passes| {
            passes
                .iter()
                .filter_map(Value::as_array)
                .map(|ops| ops.len() as i64)
                .sum()
        })
        .unwrap_or(0)
}

pub fn summarize(
    header: &Value,
    connections: Option<&Value>,
    operations: Option<&Value>,
    bootstrapped: Option<&Value>,
) -> Sample {
    let level = header["level"].as_i64().unwrap_or(0);
    let connected = connections
        .and_then(Value::as_array)
        .map_or(0, |peers| peers.len() as i64);
    let lag = bootstrapped.map_or(SyncLag::Synced, sync_lag);

    Sample::from([
        ("level".to_string(), level),
        ("connected".to_string(), connected),
        ("operations".to_string(), operations.map_or(0, count_operations)),
        ("blocks_behind".to_string(), lag.chart_value()),
    ])
}

#[async_trait]
impl Collector for OctezCollector {
    fn name(&self) -> &str {
        "octez_monitor"
    }

    fn update_every(&self) -> Duration {
        UPDATE_EVERY
    }

    fn charts(&self) -> Vec<Chart> {
        vec![
            Chart::line("octez.sync", "Octez Sync Status", "blocks behind", "sync", 70200)
                .dimension(Dimension::new("blocks_behind", "blocks behind")),
            Chart::line("octez.peers", "Octez Connected Peers", "peers", "network", 70201)
                .dimension(Dimension::new("connected", "connected")),
            Chart::line("octez.head", "Octez Chain Head", "block level", "chain", 70202)
                .dimension(Dimension::new("level", "level")),
            Chart::line(
                "octez.operations",
                "Octez Operations in Head",
                "operations",
                "chain",
                70203,
            )
            .dimension(Dimension::new("operations", "operations")),
        ]
    }

    /// Head header is required; the other calls default to zero
    async fn collect(&self) -> Option<Sample> {
        let (header, connections, operations, bootstrapped) = tokio::join!(
            self.rpc(HEAD_HEADER),
            self.rpc(CONNECTIONS),
            self.rpc(HEAD_OPERATIONS),
            self.rpc(BOOTSTRAPPED),
        );
        let header = header.ok()?;
        Some(summarize(
            &header,
            connections.ok().as_ref(),
            operations.ok().as_ref(),
            bootstrapped.ok().as_ref(),
        ))
    }
}
