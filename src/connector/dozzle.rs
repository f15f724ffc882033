// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Dozzle log-aggregator connector
//!
//! Container state comes from the `/api/events/stream` SSE feed: the first
//! `containers-changed` event carries the full container list. Logs come from
//! the per-container JSON-lines endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{map_reqwest_error, with_timeout, HttpConnector};
use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::sse::StreamDemux;

/// SSE event carrying the container list
pub const CONTAINERS_EVENT: &str = "containers-changed";

/// Default number of log lines returned
pub const DEFAULT_LOG_TAIL: usize = 100;

/// Upper bound on returned log lines
pub const MAX_LOG_TAIL: usize = 500;

/// Essential fields of one container; stats and labels are left out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub health: Option<String>,
    pub host: String,
    pub created: Option<Value>,
    pub started_at: Option<Value>,
}

/// Log query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    pub tail: usize,
    /// RFC3339 start; only used together with `to_time`
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    /// Regex applied by Dozzle to messages
    pub filter: Option<String>,
    pub levels: Vec<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            tail: DEFAULT_LOG_TAIL,
            from_time: None,
            to_time: None,
            filter: None,
            levels: Vec::new(),
        }
    }
}

impl LogQuery {
    /// Requested tail clamped to `1..=MAX_LOG_TAIL`
    pub fn effective_tail(&self) -> usize {
        self.tail.clamp(1, MAX_LOG_TAIL)
    }

    /// Time window, only when both ends are given
    pub fn time_range(&self) -> Option<(&str, &str)> {
        match (self.from_time.as_deref(), self.to_time.as_deref()) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    fn echo(&self) -> QueryEcho {
        let (time_range, scope) = match self.time_range() {
            Some((from, to)) => (Some(format!("{} to {}", from, to)), None),
            None => (None, Some("all available logs".to_string())),
        };
        QueryEcho {
            time_range,
            scope,
            filter: self.filter.clone(),
            levels: if self.levels.is_empty() {
                None
            } else {
                Some(self.levels.clone())
            },
        }
    }
}

/// Description of the query that produced a [`LogPage`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEcho {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<String>>,
}

/// One log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: Value,
    /// Unix milliseconds
    pub timestamp: Value,
    /// `stdout`, `stderr` or `unknown`
    pub stream: String,
}

/// Dozzle's compact wire form
#[derive(Deserialize)]
struct RawLogLine {
    #[serde(default)]
    m: Value,
    #[serde(default)]
    ts: Value,
    #[serde(default)]
    s: Option<String>,
}

impl From<RawLogLine> for LogEntry {
    fn from(raw: RawLogLine) -> Self {
        Self {
            message: if raw.m.is_null() { Value::from("") } else { raw.m },
            timestamp: if raw.ts.is_null() { Value::from("") } else { raw.ts },
            stream: raw.s.unwrap_or_else(|| "unknown".into()),
        }
    }
}

/// Tail of a container's logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub log_count: usize,
    pub total_available: usize,
    pub query: QueryEcho,
    pub logs: Vec<LogEntry>,
    pub note: String,
}

impl LogPage {
    /// Build a page from a JSON-lines body; undecodable lines are skipped
    pub fn from_json_lines(body: &str, query: &LogQuery) -> Self {
        let mut logs: Vec<LogEntry> = Vec::new();
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<RawLogLine>(line) {
                Ok(raw) => logs.push(raw.into()),
                Err(_) => continue,
            }
        }

        let total = logs.len();
        let tail = query.effective_tail();
        let note = if total == 0 {
            "No logs found matching the query criteria".to_string()
        } else {
            format!("Showing last {} of {} log lines", tail.min(total), total)
        };
        let logs = logs.split_off(total.saturating_sub(tail));

        Self {
            log_count: total,
            total_available: total,
            query: query.echo(),
            logs,
            note,
        }
    }
}

/// Query interface of a container-log aggregator
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Current containers across all hosts
    async fn containers(&self) -> BackendResult<Vec<ContainerSummary>>;

    /// Logs of one container on one host
    async fn logs(&self, host_id: &str, container_id: &str, query: &LogQuery)
        -> BackendResult<LogPage>;
}

/// HTTP/SSE connector for a Dozzle master
#[derive(Debug, Clone)]
pub struct DozzleConnector {
    http: HttpConnector,
    base_url: String,
    stream_timeout: Duration,
    request_timeout: Duration,
}

impl DozzleConnector {
    pub fn new(base_url: &str, stream_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            http: HttpConnector::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            stream_timeout,
            request_timeout,
        }
    }

    /// Connector for the enabled aggregator, if any
    pub fn from_config(config: &Config) -> Option<Self> {
        config.log_aggregator().map(|dozzle| {
            Self::new(
                &dozzle.url,
                config.timeouts.stream(),
                config.timeouts.metrics(),
            )
        })
    }

    /// Logs URL with the query string Dozzle expects
    pub fn logs_url(
        &self,
        host_id: &str,
        container_id: &str,
        query: &LogQuery,
    ) -> BackendResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!(
            "{}/api/hosts/{}/containers/{}/logs",
            self.base_url, host_id, container_id
        ))
        .map_err(|e| BackendError::Transport(format!("Invalid log URL: {}", e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("stdout", "true");
            pairs.append_pair("stderr", "true");
            match query.time_range() {
                Some((from, to)) => {
                    pairs.append_pair("from", from);
                    pairs.append_pair("to", to);
                }
                None => {
                    pairs.append_pair("everything", "true");
                }
            }
            if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
                pairs.append_pair("filter", filter);
            }
            for level in &query.levels {
                pairs.append_pair("levels", level);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl LogBackend for DozzleConnector {
    async fn containers(&self) -> BackendResult<Vec<ContainerSummary>> {
        let url = format!("{}/api/events/stream", self.base_url);
        let read = async {
            let resp = self.http.get_stream(&url, self.stream_timeout).await?;
            let mut demux = StreamDemux::new().with_event(CONTAINERS_EVENT);
            let mut body = resp.bytes_stream();

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(map_reqwest_error)?;
                if let Some(frame) = demux.feed(&chunk)?.next() {
                    return frame.decode::<Vec<ContainerSummary>>();
                }
            }
            Err(BackendError::NotFound(format!(
                "No {} event found in stream",
                CONTAINERS_EVENT
            )))
        };
        with_timeout(self.stream_timeout, read).await.map_err(|e| {
            log::warn!("dozzle event stream: {}", e);
            e
        })
    }

    async fn logs(
        &self,
        host_id: &str,
        container_id: &str,
        query: &LogQuery,
    ) -> BackendResult<LogPage> {
        let url = self.logs_url(host_id, container_id, query)?;
        let body = self.http.get_text(url.as_str(), self.request_timeout).await?;
        Ok(LogPage::from_json_lines(&body, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::test_server::{serve, Reply};

    const CONTAINERS: &str = r#"[{"id":"a1","name":"nginx","image":"nginx:1.25","state":"running","host":"burger","created":1700000000,"startedAt":"2024-01-01T00:00:00Z","stats":[1,2,3],"labels":{"x":"y"}},{"id":"b2","name":"pihole","image":"pihole/pihole","state":"exited","health":"unhealthy","host":"fries"}]"#;

    fn connector(addr: std::net::SocketAddr) -> DozzleConnector {
        DozzleConnector::new(
            &format!("http://{}/", addr),
            Duration::from_millis(800),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_containers_from_event_stream() {
        let frame = format!("event: {}\ndata: {}\n\n", CONTAINERS_EVENT, CONTAINERS);
        let (head, tail) = frame.as_bytes().split_at(40);
        let chunks = vec![
            b": ping\n\nevent: container-stat\ndata: {\"id\":\"a1\"}\n\n".to_vec(),
            head.to_vec(),
            tail.to_vec(),
        ];
        let addr = serve(move |path| {
            assert_eq!(path, "/api/events/stream");
            Reply::chunked(chunks.clone(), Duration::from_millis(10)).keep_open()
        })
        .await;

        let containers = connector(addr).containers().await.unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "nginx");
        assert_eq!(containers[0].health, None);
        assert_eq!(
            containers[0].started_at,
            Some(Value::from("2024-01-01T00:00:00Z"))
        );
        assert_eq!(containers[1].health.as_deref(), Some("unhealthy"));

        let value = serde_json::to_value(&containers[0]).unwrap();
        assert!(value.get("stats").is_none());
        assert!(value.get("startedAt").is_some());
    }

    #[tokio::test]
    async fn test_stream_without_event_is_not_found() {
        let addr = serve(|_| {
            Reply::chunked(
                vec![b"event: container-stat\ndata: {}\n\n".to_vec()],
                Duration::ZERO,
            )
        })
        .await;
        let err = connector(addr).containers().await.unwrap_err();
        assert_eq!(
            err,
            BackendError::NotFound("No containers-changed event found in stream".into())
        );
    }

    #[tokio::test]
    async fn test_silent_stream_times_out() {
        let addr = serve(|_| {
            Reply::chunked(vec![b": keep-alive\n\n".to_vec()], Duration::ZERO).keep_open()
        })
        .await;
        let err = connector(addr).containers().await.unwrap_err();
        assert_eq!(err, BackendError::Timeout);
    }

    #[test]
    fn test_logs_url_everything() {
        let c = DozzleConnector::new("http://dozzle:8080", Duration::ZERO, Duration::ZERO);
        let url = c.logs_url("burger", "a1", &LogQuery::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://dozzle:8080/api/hosts/burger/containers/a1/logs?stdout=true&stderr=true&everything=true"
        );
    }

    #[test]
    fn test_logs_url_range_filter_levels() {
        let c = DozzleConnector::new("http://dozzle:8080", Duration::ZERO, Duration::ZERO);
        let query = LogQuery {
            from_time: Some("2025-10-28T00:00:00Z".into()),
            to_time: Some("2025-10-29T00:00:00Z".into()),
            filter: Some("error|failed".into()),
            levels: vec!["ERROR".into(), "WARN".into()],
            ..LogQuery::default()
        };
        let url = c.logs_url("burger", "a1", &query).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("from".into(), "2025-10-28T00:00:00Z".into())));
        assert!(pairs.contains(&("filter".into(), "error|failed".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "everything"));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "levels").count(), 2);
        assert!(url.as_str().contains("filter=error%7Cfailed"));
    }

    #[test]
    fn test_only_from_time_means_everything() {
        let query = LogQuery {
            from_time: Some("2025-10-28T00:00:00Z".into()),
            ..LogQuery::default()
        };
        assert!(query.time_range().is_none());
        assert_eq!(query.echo().scope.as_deref(), Some("all available logs"));
    }

    #[test]
    fn test_log_page_tail_and_bad_lines() {
        let body = "{\"m\":\"one\",\"ts\":1,\"s\":\"stdout\"}\n\
                    not json\n\
                    {\"m\":\"two\",\"ts\":2,\"s\":\"stderr\"}\n\
                    \n\
                    {\"m\":\"three\",\"ts\":3}\n";
        let query = LogQuery {
            tail: 2,
            ..LogQuery::default()
        };
        let page = LogPage::from_json_lines(body, &query);
        assert_eq!(page.log_count, 3);
        assert_eq!(page.logs.len(), 2);
        assert_eq!(page.logs[0].message, "two");
        assert_eq!(page.logs[1].stream, "unknown");
        assert_eq!(page.note, "Showing last 2 of 3 log lines");
    }

    #[test]
    fn test_log_page_empty() {
        let page = LogPage::from_json_lines("", &LogQuery::default());
        assert!(page.logs.is_empty());
        assert_eq!(page.note, "No logs found matching the query criteria");
    }

    #[test]
    fn test_tail_is_clamped() {
        let query = LogQuery {
            tail: 5000,
            ..LogQuery::default()
        };
        assert_eq!(query.effective_tail(), MAX_LOG_TAIL);
    }

    #[tokio::test]
    async fn test_logs_round_trip() {
        let addr = serve(|path| {
            assert!(path.starts_with("/api/hosts/fries/containers/b2/logs?"));
            Reply::ok(
                "application/x-jsonl",
                "{\"m\":\"started\",\"ts\":1700000000000,\"s\":\"stdout\"}\n",
            )
        })
        .await;
        let page = connector(addr)
            .logs("fries", "b2", &LogQuery::default())
            .await
            .unwrap();
        assert_eq!(page.logs.len(), 1);
        assert_eq!(page.logs[0].timestamp, 1_700_000_000_000u64);
    }
}
