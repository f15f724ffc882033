// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Blockchain node and validator collectors
//!
//! Each collector scrapes one node (Prometheus text or JSON RPC), reduces it
//! to a flat set of integer dimensions and describes the charts those
//! dimensions belong to. The [`crate::plugin`] loop turns both into the
//! charting host's line protocol.
//!
//! | Collector | Source | Shape |
//! |---|---|---|
//! | [`LighthouseCollector`] | consensus + validator `/metrics` | flat |
//! | [`RethCollector`] | execution `/metrics` | single |
//! | [`OctezCollector`] | Tezos RPC | flat |
//! | [`HeliumCollector`] | Helium API | discovery then fan-out |
//! | [`EarningsCollector`] | validator `/metrics` + Tezos RPC | rate tracker |

pub mod earnings;
pub mod helium;
pub mod lighthouse;
pub mod octez;
pub mod reth;

pub use earnings::EarningsCollector;
pub use helium::HeliumCollector;
pub use lighthouse::LighthouseCollector;
pub use octez::OctezCollector;
pub use reth::RethCollector;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::{MonitorError, Result};

/// Dimension id to value for one collection cycle
pub type Sample = BTreeMap<String, i64>;

/// Value charted while a node is still syncing
pub const SYNC_LAG_SENTINEL: i64 = -1;

/// Coarse sync state; the real distance to head is not computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLag {
    Synced,
    Syncing,
}

impl SyncLag {
    pub fn chart_value(self) -> i64 {
        match self {
            SyncLag::Synced => 0,
            SyncLag::Syncing => SYNC_LAG_SENTINEL,
        }
    }
}

/// How the charting host turns collected values into points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Absolute,
    Incremental,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Absolute => write!(f, "absolute"),
            Algorithm::Incremental => write!(f, "incremental"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub id: String,
    pub name: String,
    pub algorithm: Algorithm,
    pub multiplier: i64,
    pub divisor: i64,
}

impl Dimension {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            algorithm: Algorithm::Absolute,
            multiplier: 1,
            divisor: 1,
        }
    }

    pub fn with_divisor(mut self, divisor: i64) -> Self {
        self.divisor = divisor;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Area,
    Stacked,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Line => write!(f, "line"),
            ChartKind::Area => write!(f, "area"),
            ChartKind::Stacked => write!(f, "stacked"),
        }
    }
}

/// Chart definition
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// `type.id`, e.g. `lighthouse.sync`
    pub id: String,
    pub title: String,
    pub units: String,
    pub family: String,
    pub context: String,
    pub kind: ChartKind,
    pub priority: u32,
    pub dimensions: Vec<Dimension>,
}

impl Chart {
    pub fn line(id: &str, title: &str, units: &str, family: &str, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            units: units.to_string(),
            family: family.to_string(),
            context: id.to_string(),
            kind: ChartKind::Line,
            priority,
            dimensions: Vec::new(),
        }
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }
}

/// A periodic data source for the charting host
#[async_trait]
pub trait Collector: Send + Sync {
    /// Plugin name, also the dimension id of the execution-time chart
    fn name(&self) -> &str;

    fn update_every(&self) -> Duration;

    fn charts(&self) -> Vec<Chart>;

    /// Collect one cycle; `None` skips the cycle's chart updates
    async fn collect(&self) -> Option<Sample>;
}

/// Collectors the plugin binary can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    Lighthouse,
    Reth,
    Octez,
    Helium,
    Earnings,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 5] = [
        CollectorKind::Lighthouse,
        CollectorKind::Reth,
        CollectorKind::Octez,
        CollectorKind::Helium,
        CollectorKind::Earnings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectorKind::Lighthouse => "lighthouse",
            CollectorKind::Reth => "reth",
            CollectorKind::Octez => "octez",
            CollectorKind::Helium => "helium",
            CollectorKind::Earnings => "earnings",
        }
    }
}

impl FromStr for CollectorKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        CollectorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MonitorError::Configuration(format!("unknown collector '{}'", s)))
    }
}

/// Build a collector from configuration
pub fn build(kind: CollectorKind, config: &Config) -> Result<Box<dyn Collector>> {
    let chain = &config.chain;
    let timeouts = &config.timeouts;
    Ok(match kind {
        CollectorKind::Lighthouse => Box::new(LighthouseCollector::new(
            &chain.lighthouse_consensus_url,
            &chain.lighthouse_validator_url,
            timeouts.scrape(),
        )),
        CollectorKind::Reth => Box::new(RethCollector::new(&chain.reth_metrics_url, timeouts.scrape())),
        CollectorKind::Octez => Box::new(OctezCollector::new(&chain.octez_rpc_url, timeouts.rpc())),
        CollectorKind::Helium => {
            let hotspot = chain.helium_hotspot.as_deref().ok_or_else(|| {
                MonitorError::Configuration("chain.helium_hotspot is not set".into())
            })?;
            Box::new(HeliumCollector::new(
                &chain.helium_api_url,
                hotspot,
                timeouts.rpc(),
            ))
        }
        CollectorKind::Earnings => Box::new(EarningsCollector::open(config)),
    })
}

/// Convert a float reading to a chart integer, truncating toward zero
pub(crate) fn to_dimension(value: f64) -> i64 {
    if value.is_finite() {
        value as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_lag_sentinel() {
        assert_eq!(SyncLag::Synced.chart_value(), 0);
        assert_eq!(SyncLag::Syncing.chart_value(), -1);
    }

    #[test]
    fn test_collector_kind_parse() {
        assert_eq!("reth".parse::<CollectorKind>().unwrap(), CollectorKind::Reth);
        assert_eq!("Helium".parse::<CollectorKind>().unwrap(), CollectorKind::Helium);
        assert!("geth".parse::<CollectorKind>().is_err());
    }

    #[test]
    fn test_helium_requires_hotspot() {
        let config = Config::default();
        assert!(build(CollectorKind::Helium, &config).is_err());
        assert_eq!(build(CollectorKind::Reth, &config).unwrap().name(), "reth_monitor");
    }

    #[test]
    fn test_to_dimension() {
        assert_eq!(to_dimension(12.9), 12);
        assert_eq!(to_dimension(-3.5), -3);
        assert_eq!(to_dimension(f64::NAN), 0);
        assert_eq!(to_dimension(f64::INFINITY), 0);
    }
}
