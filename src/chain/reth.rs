// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Reth execution client collector

use async_trait::async_trait;
use std::time::Duration;

use super::{to_dimension, Chart, Collector, Dimension, Sample};
use crate::connector::HttpConnector;
use crate::prometheus::{self, get_by_name, MetricMap};

const UPDATE_EVERY: Duration = Duration::from_secs(5);

pub struct RethCollector {
    http: HttpConnector,
    metrics_url: String,
    timeout: Duration,
}

impl RethCollector {
    pub fn new(metrics_url: &str, timeout: Duration) -> Self {
        Self {
            http: HttpConnector::new(),
            metrics_url: metrics_url.to_string(),
            timeout,
        }
    }
}

pub fn summarize(metrics: &MetricMap) -> Sample {
    let syncing = get_by_name(metrics, "reth_stages_checkpoint_sync") > 0.0;
    Sample::from([
        ("syncing".to_string(), i64::from(syncing)),
        (
            "active_peers".to_string(),
            to_dimension(get_by_name(metrics, "reth_network_active_sessions")),
        ),
        (
            "head_block".to_string(),
            to_dimension(get_by_name(metrics, "reth_consensus_engine_head_block_number")),
        ),
        (
            "gas_used".to_string(),
            to_dimension(get_by_name(metrics, "reth_executor_block_gas_used")),
        ),
    ])
}

#[async_trait]
impl Collector for RethCollector {
    fn name(&self) -> &str {
        "reth_monitor"
    }

    fn update_every(&self) -> Duration {
        UPDATE_EVERY
    }

    fn charts(&self) -> Vec<Chart> {
        vec![
            Chart::line("reth.sync", "Reth Sync Status", "boolean", "sync", 70100)
                .dimension(Dimension::new("syncing", "syncing")),
            Chart::line("reth.peers", "Reth Peer Count", "peers", "network", 70101)
                .dimension(Dimension::new("active_peers", "active peers")),
            Chart::line("reth.chain", "Reth Chain Head", "block number", "chain", 70102)
                .dimension(Dimension::new("head_block", "head block")),
            Chart::line("reth.gas", "Reth Gas Usage", "gas", "chain", 70103)
                .dimension(Dimension::new("gas_used", "gas used")),
        ]
    }

    async fn collect(&self) -> Option<Sample> {
        match self.http.get_text(&self.metrics_url, self.timeout).await {
            Ok(text) => Some(summarize(&prometheus::decode(&text))),
            Err(e) => {
                log::error!("Failed to fetch metrics from {}: {}", self.metrics_url, e);
                None
            }
        }
    }
}
