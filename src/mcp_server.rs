// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Model Context Protocol (MCP) server
//!
//! JSON-RPC 2.0, one message per line over stdio. Tool calls are parsed into
//! an [`Operation`], run by the [`Orchestrator`] and returned as a single
//! pretty-printed text block.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{ErrorBody, Result};
use crate::orchestrator::{Operation, Orchestrator};
use crate::tools::{self, ToolError};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

pub struct McpServer {
    orchestrator: Orchestrator,
    server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl McpRequest {
    /// Notifications carry no id and get no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    fn reply(id: Option<Value>, result: std::result::Result<Value, McpError>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// `TextContent` result carrying pretty JSON
fn text_content(value: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let mut result = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        result["isError"] = json!(true);
    }
    result
}

impl McpServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            server_info: ServerInfo {
                name: "homelab-monitor".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run_stdio(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve line-delimited requests from `reader`, one response line each
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<McpRequest>(&line) {
                Ok(request) if request.is_notification() => {
                    log::debug!("notification {}", request.method);
                    continue;
                }
                Ok(request) => self.handle_request(request).await,
                Err(e) => McpResponse::reply(
                    None,
                    Err(McpError::new(PARSE_ERROR, format!("Parse error: {}", e))),
                ),
            };

            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
        log::info!("stdin closed, MCP server exiting");
        Ok(())
    }

    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "ping" => Ok(json!({})),
            _ => Err(McpError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        };
        McpResponse::reply(request.id, result)
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "serverInfo": self.server_info,
            "capabilities": { "tools": { "listChanged": false } }
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": tools::definitions(self.orchestrator.config()) })
    }

    async fn handle_tools_call(&self, params: &Value) -> std::result::Result<Value, McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing tool name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let op: Operation = match tools::parse_call(name, &arguments) {
            Ok(op) => op,
            Err(e @ ToolError::UnknownTool(_)) => {
                let body = json!({ "error": e.to_string() });
                return Ok(text_content(&body, false));
            }
            Err(e) => {
                let body = json!(ErrorBody::new(e.to_string()));
                return Ok(text_content(&body, true));
            }
        };

        let value = self.orchestrator.run(&op).await;
        Ok(text_content(&value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ServerConfig};
    use crate::orchestrator::fakes::*;
    use std::sync::Arc;

    fn server() -> McpServer {
        let mut config = Config::default();
        config.servers.insert(
            "burger".into(),
            ServerConfig {
                netdata_url: "http://burger:19999".into(),
                description: "Main host".into(),
                role: None,
            },
        );
        let metrics = FakeMetrics::default()
            .reply("burger", "info", Ok(json!({"hostname": "burger"})))
            .reply(
                "burger",
                "data?chart=system.cpu&after=-60&points=1",
                Ok(series_payload(12.5)),
            );
        McpServer::new(Orchestrator::new(Arc::new(config), Arc::new(metrics)))
    }

    fn request(method: &str, params: Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params,
        }
    }

    fn text_of(response: &McpResponse) -> Value {
        let result = response.result.as_ref().unwrap();
        serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server().handle_request(request("initialize", json!({}))).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "homelab-monitor");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = server().handle_request(request("tools/list", json!({}))).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["name"], "get_all_servers_overview");
        assert!(tools[0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_tools_call_runs_operation() {
        let response = server()
            .handle_request(request(
                "tools/call",
                json!({"name": "get_all_servers_overview", "arguments": {}}),
            ))
            .await;
        let body = text_of(&response);
        assert_eq!(body["burger"]["status"], "online");
        assert_eq!(body["burger"]["hostname"], "burger");
        assert!(body["burger"]["ram"].get("error").is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = server()
            .handle_request(request("tools/call", json!({"name": "format_disks"})))
            .await;
        assert_eq!(text_of(&response)["error"], "Unknown tool: format_disks");
    }

    #[tokio::test]
    async fn test_invalid_arguments_flagged() {
        let response = server()
            .handle_request(request("tools/call", json!({"name": "get_server_health"})))
            .await;
        let result = response.result.as_ref().unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(
            text_of(&response)["error"],
            "Missing required argument: server_name"
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server().handle_request(request("resources/list", json!({}))).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_lines() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "not json\n",
        );
        let mut output = Vec::new();
        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"], json!({}));
        assert_eq!(lines[1]["error"]["code"], PARSE_ERROR);
    }
}
