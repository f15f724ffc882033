// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Tool definitions and argument parsing for the agent-facing surface
//!
//! Each tool maps onto exactly one [`Operation`]. Router and log tools are
//! only listed when their backend is enabled in configuration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::connector::{LogQuery, MAX_LOG_TAIL};
use crate::orchestrator::operation::DEFAULT_TIME_RANGE;
use crate::orchestrator::Operation;

/// Tool definition as advertised to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.into(),
            input_schema,
        }
    }

    fn no_arguments(name: &str, description: &str) -> Self {
        Self::new(name, description, json!({"type": "object", "properties": {}}))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

fn server_schema(server_names: &[&String], description: Option<&str>) -> Value {
    let mut schema = json!({"type": "string", "enum": server_names});
    if let Some(description) = description {
        schema["description"] = json!(description);
    }
    schema
}

/// Tools available under this configuration
pub fn definitions(config: &Config) -> Vec<ToolDefinition> {
    let names: Vec<&String> = config.servers.keys().collect();
    let server_list = names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let single_server = json!({
        "type": "object",
        "properties": {"server_name": server_schema(&names, None)},
        "required": ["server_name"]
    });

    let mut tools = vec![
        ToolDefinition::new(
            "get_all_servers_overview",
            format!("Get health overview of all homelab servers: {}", server_list),
            json!({"type": "object", "properties": {}}),
        ),
        ToolDefinition::new(
            "get_server_health",
            "Get detailed health stats for a specific server",
            json!({
                "type": "object",
                "properties": {
                    "server_name": server_schema(&names, Some("Which server to check"))
                },
                "required": ["server_name"]
            }),
        ),
        ToolDefinition::new(
            "get_network_stats",
            "Get network interface statistics (bandwidth, packets, errors) for a server, including bonded interfaces",
            json!({
                "type": "object",
                "properties": {
                    "server_name": server_schema(&names, Some("Which server to check")),
                    "time_range": {
                        "type": "integer",
                        "description": "Seconds of historical data to retrieve (default: 600 = 10 minutes)",
                        "default": DEFAULT_TIME_RANGE
                    }
                },
                "required": ["server_name"]
            }),
        ),
        ToolDefinition::new(
            "list_containers",
            "List all Docker containers running on a server",
            single_server.clone(),
        ),
        ToolDefinition::new(
            "get_container_stats",
            "Get CPU and memory stats for containers on a server",
            single_server,
        ),
    ];

    if config.router().is_some() {
        tools.extend([
            ToolDefinition::no_arguments(
                "get_mikrotik_interfaces",
                "Get all network interfaces on the MikroTik router including status, traffic stats, and bonding info",
            ),
            ToolDefinition::no_arguments(
                "get_mikrotik_resources",
                "Get MikroTik system resources (CPU, memory, uptime, temperature)",
            ),
            ToolDefinition::no_arguments(
                "get_mikrotik_dhcp_leases",
                "Get all DHCP leases from the MikroTik router",
            ),
            ToolDefinition::no_arguments(
                "get_mikrotik_traffic",
                "Get interface traffic statistics from MikroTik",
            ),
        ]);
    }

    if config.log_aggregator().is_some() {
        tools.extend([
            ToolDefinition::no_arguments(
                "get_dozzle_hosts",
                "Get all hosts monitored by the Dozzle master instance",
            ),
            ToolDefinition::no_arguments(
                "get_dozzle_containers",
                "Get all containers visible to Dozzle across all monitored hosts, with their status and basic info",
            ),
            ToolDefinition::new(
                "get_dozzle_container_logs",
                "Get historical logs from a container with advanced filtering. Supports time ranges, regex patterns, and log level filtering. Works for both active and idle containers.",
                json!({
                    "type": "object",
                    "properties": {
                        "container_id": {"type": "string", "description": "Container ID or name"},
                        "tail": {
                            "type": "integer",
                            "description": format!(
                                "Number of most recent log lines to return (default: 100, max: {})",
                                MAX_LOG_TAIL
                            ),
                            "default": 100
                        },
                        "from_time": {
                            "type": "string",
                            "description": "Start time in RFC3339 format (e.g., '2025-10-28T00:00:00Z'). If provided, to_time is also required."
                        },
                        "to_time": {
                            "type": "string",
                            "description": "End time in RFC3339 format (e.g., '2025-10-29T23:59:59Z'). If provided, from_time is also required."
                        },
                        "filter": {
                            "type": "string",
                            "description": "Regex pattern to filter log messages (e.g., 'error|failed|exception' for errors)"
                        },
                        "levels": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Array of log levels to filter by (e.g., ['ERROR', 'WARN'])"
                        }
                    },
                    "required": ["container_id"]
                }),
            ),
        ]);
    }

    tools
}

/// Typed view over a call's arguments object
struct Arguments<'a>(Option<&'a Map<String, Value>>);

impl<'a> Arguments<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.0.and_then(|m| m.get(name)).filter(|v| !v.is_null())
    }

    fn string(&self, name: &'static str) -> Result<Option<String>, ToolError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ToolError::InvalidArgument {
                name,
                reason: format!("expected a string, got {}", other),
            }),
        }
    }

    fn required_string(&self, name: &'static str) -> Result<String, ToolError> {
        self.string(name)?.ok_or(ToolError::MissingArgument(name))
    }

    fn unsigned(&self, name: &'static str, default: u64) -> Result<u64, ToolError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_u64().ok_or_else(|| ToolError::InvalidArgument {
                name,
                reason: format!("expected a non-negative integer, got {}", value),
            }),
        }
    }

    fn strings(&self, name: &'static str) -> Result<Vec<String>, ToolError> {
        let Some(value) = self.get(name) else {
            return Ok(Vec::new());
        };
        let invalid = || ToolError::InvalidArgument {
            name,
            reason: "expected an array of strings".into(),
        };
        value
            .as_array()
            .ok_or_else(invalid)?
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
            .collect()
    }
}

/// Turn a tool call into an operation
pub fn parse_call(name: &str, arguments: &Value) -> Result<Operation, ToolError> {
    let args = Arguments(arguments.as_object());
    let op = match name {
        "get_all_servers_overview" => Operation::ServersOverview,
        "get_server_health" => Operation::ServerHealth {
            server: args.required_string("server_name")?,
        },
        "get_network_stats" => Operation::NetworkStats {
            server: args.required_string("server_name")?,
            time_range: args.unsigned("time_range", DEFAULT_TIME_RANGE)?,
        },
        "list_containers" => Operation::ListContainers {
            server: args.required_string("server_name")?,
        },
        "get_container_stats" => Operation::ContainerStats {
            server: args.required_string("server_name")?,
        },
        "get_mikrotik_interfaces" => Operation::RouterInterfaces,
        "get_mikrotik_resources" => Operation::RouterResources,
        "get_mikrotik_dhcp_leases" => Operation::RouterDhcpLeases,
        "get_mikrotik_traffic" => Operation::RouterTraffic,
        "get_dozzle_hosts" => Operation::LogHosts,
        "get_dozzle_containers" => Operation::LogContainers,
        "get_dozzle_container_logs" => {
            let default = LogQuery::default();
            Operation::ContainerLogs {
                container: args.required_string("container_id")?,
                query: LogQuery {
                    tail: args.unsigned("tail", default.tail as u64)? as usize,
                    from_time: args.string("from_time")?,
                    to_time: args.string("to_time")?,
                    filter: args.string("filter")?,
                    levels: args.strings("levels")?,
                },
            }
        }
        other => return Err(ToolError::UnknownTool(other.to_string())),
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogAggregatorConfig, ServerConfig};

    fn config() -> Config {
        let mut config = Config::default();
        for name in ["burger", "cheese"] {
            config.servers.insert(
                name.to_string(),
                ServerConfig {
                    netdata_url: format!("http://{}:19999", name),
                    description: name.to_string(),
                    role: Some("host".into()),
                },
            );
        }
        config
    }

    #[test]
    fn test_definitions_follow_enabled_backends() {
        let mut config = config();
        let names: Vec<String> = definitions(&config).into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 5);
        assert!(!names.iter().any(|n| n.starts_with("get_dozzle")));

        config.dozzle = Some(LogAggregatorConfig {
            enabled: true,
            url: "http://dozzle:8080".into(),
            description: "logs".into(),
        });
        let tools = definitions(&config);
        assert_eq!(tools.len(), 8);
        assert!(tools.iter().any(|t| t.name == "get_dozzle_container_logs"));
    }

    #[test]
    fn test_definitions_enumerate_servers() {
        let tools = definitions(&config());
        assert_eq!(
            tools[0].description,
            "Get health overview of all homelab servers: burger, cheese"
        );
        let health = &tools[1].input_schema;
        assert_eq!(
            health["properties"]["server_name"]["enum"],
            json!(["burger", "cheese"])
        );
        let value = serde_json::to_value(&tools[1]).unwrap();
        assert!(value.get("inputSchema").is_some());
    }

    #[test]
    fn test_every_tool_parses_to_its_operation() {
        let mut config = config();
        config.dozzle = Some(LogAggregatorConfig {
            enabled: true,
            url: "http://dozzle:8080".into(),
            description: "logs".into(),
        });
        let args = json!({"server_name": "burger", "container_id": "nginx"});
        for tool in definitions(&config) {
            let op = parse_call(&tool.name, &args).unwrap();
            assert_eq!(op.name(), tool.name);
        }
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(
            parse_call("get_network_stats", &json!({"server_name": "burger"})).unwrap(),
            Operation::NetworkStats {
                server: "burger".into(),
                time_range: 600
            }
        );
        match parse_call("get_dozzle_container_logs", &json!({"container_id": "a1"})).unwrap() {
            Operation::ContainerLogs { container, query } => {
                assert_eq!(container, "a1");
                assert_eq!(query, LogQuery::default());
                assert_eq!(query.tail, 100);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_log_query() {
        let op = parse_call(
            "get_dozzle_container_logs",
            &json!({
                "container_id": "a1",
                "tail": 20,
                "filter": "error|failed",
                "levels": ["ERROR", "WARN"],
                "from_time": null
            }),
        )
        .unwrap();
        let Operation::ContainerLogs { query, .. } = op else {
            panic!("expected container logs");
        };
        assert_eq!(query.tail, 20);
        assert_eq!(query.filter.as_deref(), Some("error|failed"));
        assert_eq!(query.levels, vec!["ERROR", "WARN"]);
        assert_eq!(query.from_time, None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_call("get_server_health", &json!({})),
            Err(ToolError::MissingArgument("server_name"))
        );
        assert_eq!(
            parse_call("reboot_everything", &json!({})).unwrap_err().to_string(),
            "Unknown tool: reboot_everything"
        );
        assert!(matches!(
            parse_call("get_network_stats", &json!({"server_name": "a", "time_range": -5})),
            Err(ToolError::InvalidArgument { name: "time_range", .. })
        ));
        assert!(matches!(
            parse_call("get_dozzle_container_logs", &json!({"container_id": "a", "levels": [1]})),
            Err(ToolError::InvalidArgument { name: "levels", .. })
        ));
    }
}
