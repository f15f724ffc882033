// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Helium hotspot collector over the public Helium API
//!
//! The hotspot record is fetched first; without it the cycle is skipped.
//! Witnesses, both reward windows and the activity count are then fetched
//! concurrently and default to zero on failure.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

use super::{to_dimension, Chart, Collector, Dimension, Sample};
use crate::connector::HttpConnector;
use crate::error::{BackendError, BackendResult};

const UPDATE_EVERY: Duration = Duration::from_secs(60);

const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct HeliumCollector {
    http: HttpConnector,
    api_url: String,
    hotspot: String,
    timeout: Duration,
}

/// Fields of the hotspot record that feed the status charts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotspotStatus {
    pub online: bool,
    /// Online and reachable on at least one non-relayed address
    pub synced: bool,
    pub block_height: i64,
}

impl HotspotStatus {
    pub fn from_record(record: &Value) -> Self {
        let online = record["status"]["online"].as_str() == Some("online");
        let listening = record["listen_addrs"]
            .as_array()
            .map(|addrs| {
                addrs
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|addr| !addr.contains("/p2p/"))
            })
            .unwrap_or(false);
        Self {
            online,
            synced: online && listening,
            block_height: record["block"].as_i64().unwrap_or(0),
        }
    }
}

/// Min/max query bounds for a trailing window ending at `now`
pub fn reward_window(now: DateTime<Utc>, days: i64) -> (String, String) {
    let min = now - ChronoDuration::days(days);
    (
        min.format(API_TIME_FORMAT).to_string(),
        now.format(API_TIME_FORMAT).to_string(),
    )
}

impl HeliumCollector {
    pub fn new(api_url: &str, hotspot: &str, timeout: Duration) -> Self {
        Self {
            http: HttpConnector::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            hotspot: hotspot.to_string(),
            timeout,
        }
    }

    fn hotspot_url(&self, suffix: &str) -> String {
        format!("{}/hotspots/{}{}", self.api_url, self.hotspot, suffix)
    }

    /// GET and unwrap the API's `data` envelope
    async fn fetch_data(&self, url: &str) -> BackendResult {
        let mut body = self.http.get_json(url, self.timeout).await.map_err(|e| {
            log::error!("Failed to fetch {}: {}", url, e);
            e
        })?;
        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(BackendError::Decode("response has no 'data' field".into())),
        }
    }

    async fn rewards_sum(&self, now: DateTime<Utc>, days: i64) -> i64 {
        let (min_time, max_time) = reward_window(now, days);
        let url = match Url::parse(&self.hotspot_url("/rewards/sum")) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("min_time", &min_time)
                    .append_pair("max_time", &max_time);
                url
            }
            Err(e) => {
                log::error!("Invalid Helium API url: {}", e);
                return 0;
            }
        };
        self.fetch_data(url.as_str())
            .await
            .map(|data| to_dimension(data["total"].as_f64().unwrap_or(0.0)))
            .unwrap_or(0)
    }

    async fn witness_count(&self) -> i64 {
        self.fetch_data(&self.hotspot_url("/witnessed"))
            .await
            .ok()
            .and_then(|data| data.as_array().map(|w| w.len() as i64))
            .unwrap_or(0)
    }

    async fn challenges(&self) -> i64 {
        self.fetch_data(&self.hotspot_url("/activity/count"))
            .await
            .map(|data| data["poc_request_v1"].as_i64().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Collector for HeliumCollector {
    fn name(&self) -> &str {
        "helium_monitor"
    }

    fn update_every(&self) -> Duration {
        UPDATE_EVERY
    }

    fn charts(&self) -> Vec<Chart> {
        vec![
            Chart::line("helium.status", "Helium Hotspot Status", "status", "status", 70300)
                .dimension(Dimension::new("online", "online"))
                .dimension(Dimension::new("synced", "synced")),
            Chart::line("helium.height", "Helium Block Height", "blocks", "sync", 70301)
                .dimension(Dimension::new("block_height", "block height")),
            Chart::line(
                "helium.witnesses",
                "Helium Witness Activity",
                "witnesses",
                "activity",
                70302,
            )
            .dimension(Dimension::new("witness_count", "witness count")),
            Chart::line("helium.rewards_24h", "Helium Rewards 24h", "HNT bones", "earnings", 70303)
                .dimension(Dimension::new("rewards_24h", "rewards 24h")),
            Chart::line("helium.rewards_30d", "Helium Rewards 30d", "HNT bones", "earnings", 70304)
                .dimension(Dimension::new("rewards_30d", "rewards 30d")),
            Chart::line(
                "helium.challenger",
                "Helium Challenger Activity (24h)",
                "challenges",
                "activity",
                70305,
            )
            .dimension(Dimension::new("challenges_24h", "challenges")),
        ]
    }

    async fn collect(&self) -> Option<Sample> {
        let record = match self.fetch_data(&self.hotspot_url("")).await {
            Ok(record) => record,
            Err(_) => {
                log::error!("Could not fetch hotspot info for {}", self.hotspot);
                return None;
            }
        };
        let status = HotspotStatus::from_record(&record);

        let now = Utc::now();
        let (witnesses, rewards_24h, rewards_30d, challenges) = tokio::join!(
            self.witness_count(),
            self.rewards_sum(now, 1),
            self.rewards_sum(now, 30),
            self.challenges(),
        );

        Some(Sample::from([
            ("online".to_string(), i64::from(status.online)),
            ("synced".to_string(), i64::from(status.synced)),
            ("block_height".to_string(), status.block_height),
            ("witness_count".to_string(), witnesses),
            ("rewards_24h".to_string(), rewards_24h),
            ("rewards_30d".to_string(), rewards_30d),
            ("challenges_24h".to_string(), challenges),
        ]))
    }
}
