// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Static configuration: backend endpoint tables and enabled-feature flags
//!
//! Loaded once at startup and shared read-only (behind an `Arc`) with the
//! orchestrator, connectors and chain collectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// One Netdata-monitored server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Netdata agent, e.g. `http://burger:19999`
    pub netdata_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// MikroTik router REST access (RouterOS 7.1+, `www` or `www-ssl` service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub enabled: bool,
    pub host: String,
    #[serde(default = "default_router_port")]
    pub port: u16,
    /// Use `https` (the `www-ssl` service)
    #[serde(default)]
    pub tls: bool,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub description: String,
}

fn default_router_port() -> u16 {
    80
}

impl RouterConfig {
    /// Base URL of the REST API, e.g. `http://192.168.88.1:80/rest`
    pub fn rest_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}/rest", scheme, self.host, self.port)
    }
}

/// Dozzle log aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAggregatorConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Blockchain node and validator endpoints used by the chart collectors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub lighthouse_consensus_url: String,
    pub lighthouse_validator_url: String,
    pub reth_metrics_url: String,
    pub octez_rpc_url: String,
    pub helium_api_url: String,
    pub helium_hotspot: Option<String>,
    /// Durable rate-state file for the earnings collector
    pub state_file: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            lighthouse_consensus_url: "http://localhost:8008/metrics".into(),
            lighthouse_validator_url: "http://localhost:8009/metrics".into(),
            reth_metrics_url: "http://localhost:6060/metrics".into(),
            octez_rpc_url: "http://localhost:8732".into(),
            helium_api_url: "https://api.helium.io/v1".into(),
            helium_hotspot: None,
            state_file: "/var/lib/hlmon/earnings.state".into(),
        }
    }
}

/// Per-connector request timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub metrics_secs: u64,
    pub rpc_secs: u64,
    pub scrape_secs: u64,
    pub stream_secs: u64,
    pub router_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metrics_secs: 10,
            rpc_secs: 10,
            scrape_secs: 5,
            stream_secs: 3,
            router_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn metrics(&self) -> Duration {
        Duration::from_secs(self.metrics_secs)
    }

    pub fn rpc(&self) -> Duration {
        Duration::from_secs(self.rpc_secs)
    }

    pub fn scrape(&self) -> Duration {
        Duration::from_secs(self.scrape_secs)
    }

    pub fn stream(&self) -> Duration {
        Duration::from_secs(self.stream_secs)
    }

    pub fn router(&self) -> Duration {
        Duration::from_secs(self.router_secs)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub mikrotik: Option<RouterConfig>,
    #[serde(default)]
    pub dozzle: Option<LogAggregatorConfig>,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Config {
    /// Load from a TOML or JSON file, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations with nothing to monitor or unusable endpoints
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() && self.router().is_none() && self.log_aggregator().is_none() {
            return Err(MonitorError::Configuration(
                "no servers configured and no router or log aggregator enabled".into(),
            ));
        }
        for (name, server) in &self.servers {
            if !server.netdata_url.starts_with("http://") && !server.netdata_url.starts_with("https://") {
                return Err(MonitorError::Configuration(format!(
                    "server '{}': netdata_url must be an http(s) URL",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Router settings, only when enabled
    pub fn router(&self) -> Option<&RouterConfig> {
        self.mikrotik.as_ref().filter(|r| r.enabled)
    }

    /// Log aggregator settings, only when enabled
    pub fn log_aggregator(&self) -> Option<&LogAggregatorConfig> {
        self.dozzle.as_ref().filter(|d| d.enabled)
    }

    /// Descriptor string for a server: `"<description> (<role>)"`
    pub fn server_context(&self, name: &str) -> String {
        match self.servers.get(name) {
            Some(srv) => format!(
                "{} ({})",
                srv.description,
                srv.role.as_deref().unwrap_or("unknown role")
            ),
            None => String::new(),
        }
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Homelab Monitor configuration

[servers.burger]
netdata_url = "http://burger:19999"
description = "Main Docker host"
role = "containers"

[servers.cheese]
netdata_url = "http://cheese:19999"
description = "Storage server with bonded NICs"
role = "nas"

# Optional: MikroTik router REST API (RouterOS 7.1+)
# [mikrotik]
# enabled = true
# host = "192.168.88.1"
# port = 80
# tls = false
# username = "monitor"
# password = "secret"
# model = "RB5009"
# description = "Core router"

# Optional: Dozzle log aggregator
# [dozzle]
# enabled = true
# url = "http://dozzle:8080"
# description = "Dozzle master (burger, cheese, tomato, fries)"

# [chain]
# lighthouse_consensus_url = "http://localhost:8008/metrics"
# lighthouse_validator_url = "http://localhost:8009/metrics"
# reth_metrics_url = "http://localhost:6060/metrics"
# octez_rpc_url = "http://localhost:8732"
# helium_hotspot = "11abc..."
# state_file = "/var/lib/hlmon/earnings.state"

# [timeouts]
# metrics_secs = 10
# stream_secs = 3
"#
        .into()
    }
}
