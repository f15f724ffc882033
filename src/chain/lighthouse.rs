// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Lighthouse consensus and validator client collector

use async_trait::async_trait;
use std::time::Duration;

use super::{to_dimension, Chart, Collector, Dimension, Sample, SyncLag};
use crate::connector::HttpConnector;
use crate::prometheus::{self, get_by_name, sum_containing, sum_prefix, MetricMap};

const UPDATE_EVERY: Duration = Duration::from_secs(5);

/// Scrapes both Lighthouse `/metrics` endpoints in parallel
pub struct LighthouseCollector {
    http: HttpConnector,
    consensus_url: String,
    validator_url: String,
    timeout: Duration,
}

impl LighthouseCollector {
    pub fn new(consensus_url: &str, validator_url: &str, timeout: Duration) -> Self {
        Self {
            http: HttpConnector::new(),
            consensus_url: consensus_url.to_string(),
            validator_url: validator_url.to_string(),
            timeout,
        }
    }
}

/// Any positive `sync_slots_per_second` series means the node is catching up
pub fn sync_lag(consensus: &MetricMap) -> SyncLag {
    let syncing = consensus
        .iter()
        .any(|(key, value)| key.contains("sync_slots_per_second") && *value > 0.0);
    if syncing {
        SyncLag::Syncing
    } else {
        SyncLag::Synced
    }
}

/// Reduce the two scrapes to chart dimensions
pub fn summarize(consensus: &MetricMap, validator: &MetricMap) -> Sample {
    let mut sample = Sample::new();
    let mut set = |id: &str, value: f64| {
        sample.insert(id.to_string(), to_dimension(value));
    };

    set("slots_behind", sync_lag(consensus).chart_value() as f64);
    set("connected_peers", get_by_name(consensus, "libp2p_peers"));
    set("head_slot", get_by_name(consensus, "beacon_head_slot"));

    set(
        "successful",
        sum_containing(validator, "validator_monitor_prev_epoch_on_chain_attester_hit"),
    );
    set(
        "failed",
        sum_containing(validator, "validator_monitor_prev_epoch_on_chain_attester_miss"),
    );
    set("total_balance", sum_prefix(validator, "validator_balance_gwei"));
    set(
        "successful_proposals",
        sum_containing(validator, "validator_monitor_prev_epoch_on_chain_proposer_hit"),
    );
    set(
        "failed_proposals",
        sum_containing(validator, "validator_monitor_prev_epoch_on_chain_proposer_miss"),
    );
    set(
        "sync_committee_messages",
        sum_containing(
            validator,
            "validator_monitor_prev_epoch_on_chain_sync_committee_messages",
        ),
    );
    sample
}

#[async_trait]
impl Collector for LighthouseCollector {
    fn name(&self) -> &str {
        "lighthouse_monitor"
    }

    fn update_every(&self) -> Duration {
        UPDATE_EVERY
    }

    fn charts(&self) -> Vec<Chart> {
        vec![
            Chart::line("lighthouse.sync", "Lighthouse Sync Status", "slots behind", "sync", 70000)
                .dimension(Dimension::new("slots_behind", "slots behind")),
            Chart::line("lighthouse.peers", "Lighthouse Peer Count", "peers", "network", 70001)
                .dimension(Dimension::new("connected_peers", "connected peers")),
            Chart::line(
                "lighthouse.attestations",
                "Validator Attestations",
                "attestations",
                "validator",
                70002,
            )
            .dimension(Dimension::new("successful", "successful"))
            .dimension(Dimension::new("failed", "failed")),
            Chart::line("lighthouse.balance", "Validator Balance", "gwei", "validator", 70003)
                .dimension(Dimension::new("total_balance", "total balance")),
            Chart::line("lighthouse.proposals", "Block Proposals", "proposals", "validator", 70004)
                .dimension(Dimension::new("successful_proposals", "successful"))
                .dimension(Dimension::new("failed_proposals", "failed")),
            Chart::line(
                "lighthouse.sync_committee",
                "Sync Committee Participation",
                "contributions",
                "validator",
                70005,
            )
            .dimension(Dimension::new("sync_committee_messages", "messages")),
            Chart::line("lighthouse.head", "Beacon Chain Head", "slot", "chain", 70006)
                .dimension(Dimension::new("head_slot", "head slot")),
        ]
    }

    /// The consensus scrape is required; a failed validator scrape only
    /// zeroes the validator dimensions
    async fn collect(&self) -> Option<Sample> {
        let (consensus, validator) = tokio::join!(
            self.http.get_text(&self.consensus_url, self.timeout),
            self.http.get_text(&self.validator_url, self.timeout),
        );
        let consensus = match consensus {
            Ok(text) => prometheus::decode(&text),
            Err(e) => {
                log::error!("Failed to fetch metrics from {}: {}", self.consensus_url, e);
                return None;
            }
        };
        let validator = validator
            .map(|text| prometheus::decode(&text))
            .unwrap_or_default();
        Some(summarize(&consensus, &validator))
    }
}
