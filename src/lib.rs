// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! # Homelab Monitor
//!
//! Aggregates a small fleet's monitoring backends into normalized JSON for AI
//! agents, and feeds blockchain node health into Netdata as an external
//! plugin.
//!
//! ## Backends
//!
//! - **Netdata** agents, one per server: system, disk, network and cgroup charts
//! - **RouterOS** API: interfaces, resources, DHCP leases, bonding
//! - **Dozzle**: container inventory (server-sent events) and container logs
//! - **Chain nodes**: Lighthouse, Reth, Octez, Helium, validator earnings
//!
//! ## Quick Start
//!
//! ```no_run
//! use homelab::{Config, Operation, Orchestrator};
//! use std::sync::Arc;
//!
//! # async fn demo() -> homelab::Result<()> {
//! let config = Arc::new(Config::from_file("hlmon.toml")?);
//! let orchestrator = Orchestrator::from_config(config);
//!
//! let report = orchestrator.run(&Operation::ServersOverview).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Binaries
//!
//! - `hlmon`: MCP server on stdio
//! - `hlmon-plugin <collector>`: Netdata external plugin

pub mod chain;
pub mod config;
pub mod connector;
pub mod error;
pub mod mcp_server;
pub mod orchestrator;
pub mod plugin;
pub mod prometheus;
pub mod rate;
pub mod series;
pub mod sse;
pub mod tools;

pub use chain::{Collector, CollectorKind};
pub use config::Config;
pub use error::{BackendError, BackendResult, ErrorBody, MonitorError, Result};
pub use mcp_server::McpServer;
pub use orchestrator::{Operation, Orchestrator, TargetResult};
pub use rate::RateTracker;
pub use series::SeriesResult;
pub use sse::{SseFrame, StreamDemux};
