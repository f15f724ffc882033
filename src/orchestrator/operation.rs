// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Closed set of logical operations the orchestrator can run

use serde::{Deserialize, Serialize};

use crate::connector::LogQuery;

/// Default look-back window for network stats, in seconds
pub const DEFAULT_TIME_RANGE: u64 = 600;

/// One logical query, carrying its typed parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Health overview of every configured server
    ServersOverview,
    /// Info, CPU, RAM and every disk of one server
    ServerHealth { server: String },
    /// Every network interface chart of one server
    NetworkStats { server: String, time_range: u64 },
    /// Container names discovered from cgroup charts
    ListContainers { server: String },
    /// Latest CPU and memory point of every container chart
    ContainerStats { server: String },
    RouterInterfaces,
    RouterResources,
    RouterDhcpLeases,
    /// Interfaces plus bonding state
    RouterTraffic,
    /// Hosts seen by the log aggregator, with container counts
    LogHosts,
    LogContainers,
    /// Logs of one container, looked up by id or name
    ContainerLogs { container: String, query: LogQuery },
}

impl Operation {
    /// Tool name exposed to the calling agent
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ServersOverview => "get_all_servers_overview",
            Operation::ServerHealth { .. } => "get_server_health",
            Operation::NetworkStats { .. } => "get_network_stats",
            Operation::ListContainers { .. } => "list_containers",
            Operation::ContainerStats { .. } => "get_container_stats",
            Operation::RouterInterfaces => "get_mikrotik_interfaces",
            Operation::RouterResources => "get_mikrotik_resources",
            Operation::RouterDhcpLeases => "get_mikrotik_dhcp_leases",
            Operation::RouterTraffic => "get_mikrotik_traffic",
            Operation::LogHosts => "get_dozzle_hosts",
            Operation::LogContainers => "get_dozzle_containers",
            Operation::ContainerLogs { .. } => "get_dozzle_container_logs",
        }
    }

}
