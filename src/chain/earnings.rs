// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Validator and baker earnings from balance changes over time

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use super::{to_dimension, Chart, Collector, Dimension, Sample};
use crate::config::Config;
use crate::connector::HttpConnector;
use crate::error::{BackendError, BackendResult};
use crate::prometheus::{self, sum_prefix};
use crate::rate::{RateObservation, RateTracker};

const UPDATE_EVERY: Duration = Duration::from_secs(60);

const GWEI_PER_ETH: i64 = 1_000_000_000;
const MUTEZ_PER_XTZ: i64 = 1_000_000;

/// Tracked balances and the dimension ids each one feeds
struct Ledger {
    prefix: &'static str,
    daily_dimension: &'static str,
}

const ETH: Ledger = Ledger {
    prefix: "eth",
    daily_dimension: "eth_daily_eth",
};

const TEZOS: Ledger = Ledger {
    prefix: "tezos",
    daily_dimension: "tezos_daily_xtz",
};

pub struct EarningsCollector {
    http: HttpConnector,
    tracker: RateTracker,
    validator_url: String,
    octez_url: String,
    scrape_timeout: Duration,
    rpc_timeout: Duration,
}

impl EarningsCollector {
    /// Open with the persisted rate state from `chain.state_file`
    pub fn open(config: &Config) -> Self {
        Self::with_tracker(config, RateTracker::open(&config.chain.state_file))
    }

    pub fn with_tracker(config: &Config, tracker: RateTracker) -> Self {
        Self {
            http: HttpConnector::new(),
            tracker,
            validator_url: config.chain.lighthouse_validator_url.clone(),
            octez_url: config.chain.octez_rpc_url.trim_end_matches('/').to_string(),
            scrape_timeout: config.timeouts.scrape(),
            rpc_timeout: config.timeouts.rpc(),
        }
    }

    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }

    /// Summed validator balance in gwei
    async fn eth_balance(&self) -> BackendResult<f64> {
        let text = self.http.get_text(&self.validator_url, self.scrape_timeout).await?;
        Ok(sum_prefix(&prometheus::decode(&text), "validator_balance_gwei"))
    }

    /// Balance of the node's first delegate in mutez
    async fn tezos_balance(&self) -> BackendResult<f64> {
        let delegates_url = format!("{}/chains/main/blocks/head/context/delegates", self.octez_url);
        let delegates = self.http.get_json(&delegates_url, self.rpc_timeout).await?;
        let delegate = first_delegate(&delegates)
            .ok_or_else(|| BackendError::NotFound("node reports no delegates".into()))?;

        let balance_url = format!("{}/{}/balance", delegates_url, delegate);
        let balance = self.http.get_json(&balance_url, self.rpc_timeout).await?;
        parse_mutez(&balance)
            .ok_or_else(|| BackendError::Decode(format!("unexpected balance value {}", balance)))
    }

    /// Record both balances in one rate-tracker cycle
    pub fn record(&self, eth: Option<f64>, tezos: Option<f64>, now: DateTime<Utc>) -> Sample {
        let mut cycle = self.tracker.cycle();
        let mut sample = Sample::new();
        for (ledger, balance) in [(&ETH, eth), (&TEZOS, tezos)] {
            let observation = balance
                .map(|value| cycle.observe(ledger.prefix, value, now))
                .unwrap_or_default();
            insert_observation(&mut sample, ledger, &observation);
        }
        sample
    }
}

fn insert_observation(sample: &mut Sample, ledger: &Ledger, obs: &RateObservation) {
    sample.insert(
        format!("{}_hourly_rate", ledger.prefix),
        to_dimension(obs.hourly_rate),
    );
    sample.insert(format!("{}_balance_diff", ledger.prefix), to_dimension(obs.delta));
    sample.insert(
        ledger.daily_dimension.to_string(),
        to_dimension(obs.daily_estimate),
    );
}

/// First delegate of a delegates listing, or the value itself if it is a
/// bare address
pub fn first_delegate(delegates: &Value) -> Option<&str> {
    match delegates {
        Value::Array(list) => list.first().and_then(Value::as_str),
        Value::String(address) => Some(address),
        _ => None,
    }
}

/// The RPC returns mutez as a JSON string
pub fn parse_mutez(balance: &Value) -> Option<f64> {
    match balance {
        Value::String(s) => s.trim().parse::<i64>().ok().map(|v| v as f64),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[async_trait]
impl Collector for EarningsCollector {
    fn name(&self) -> &str {
        "earnings_monitor"
    }

    fn update_every(&self) -> Duration {
        UPDATE_EVERY
    }

    fn charts(&self) -> Vec<Chart> {
        vec![
            Chart::line("eth.earnings_rate", "Ethereum Earnings Rate", "gwei/hour", "earnings", 70400)
                .dimension(Dimension::new("eth_hourly_rate", "gwei per hour")),
            Chart::line("eth.balance_change", "Ethereum Balance Change", "gwei", "earnings", 70401)
                .dimension(Dimension::new("eth_balance_diff", "balance change")),
            Chart::line(
                "eth.daily_estimate",
                "Ethereum Daily Earnings Estimate",
                "ETH",
                "earnings",
                70402,
            )
            .dimension(Dimension::new("eth_daily_eth", "ETH per day").with_divisor(GWEI_PER_ETH)),
            Chart::line("tezos.earnings_rate", "Tezos Earnings Rate", "mutez/hour", "earnings", 70403)
                .dimension(Dimension::new("tezos_hourly_rate", "mutez per hour")),
            Chart::line("tezos.balance_change", "Tezos Balance Change", "mutez", "earnings", 70404)
                .dimension(Dimension::new("tezos_balance_diff", "balance change")),
            Chart::line(
                "tezos.daily_estimate",
                "Tezos Daily Earnings Estimate",
                "XTZ",
                "earnings",
                70405,
            )
            .dimension(Dimension::new("tezos_daily_xtz", "XTZ per day").with_divisor(MUTEZ_PER_XTZ)),
        ]
    }

    /// A failed fetch zeroes that chain's dimensions and leaves its baseline
    /// untouched
    async fn collect(&self) -> Option<Sample> {
        let (eth, tezos) = tokio::join!(self.eth_balance(), self.tezos_balance());
        let eth = eth
            .map_err(|e| log::error!("Failed to fetch ETH balance: {}", e))
            .ok();
        let tezos = tezos
            .map_err(|e| log::error!("Failed to fetch Tezos balance: {}", e))
            .ok();
        Some(self.record(eth, tezos, Utc::now()))
    }
}
