// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Backend connectors
//!
//! One connector per backend kind. Every call is bounded by a timeout and
//! returns a [`BackendResult`]; no failure escapes a connector as a panic or
//! an error of another type.
//!
//! | Backend | Connector | Wire format |
//! |---|---|---|
//! | Netdata metrics server | [`NetdataConnector`] | JSON time-series |
//! | Dozzle log aggregator | [`DozzleConnector`] | SSE stream, JSON lines |
//! | MikroTik router | [`RouterConnector`] | RouterOS REST JSON |
//! | Chain nodes / validators | [`HttpConnector`] | Prometheus text, JSON RPC |

pub mod dozzle;
pub mod netdata;
pub mod router;

pub use dozzle::{
    ContainerSummary, DozzleConnector, LogBackend, LogEntry, LogPage, LogQuery, MAX_LOG_TAIL,
};
pub use netdata::{Endpoint, MetricsBackend, NetdataConnector};
pub use router::{RouterBackend, RouterConnector, RouterRecord};

use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::error::{BackendError, BackendResult};

/// Map a reqwest failure onto the backend taxonomy
pub fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if let Some(status) = err.status() {
        BackendError::HttpStatus(status.as_u16())
    } else if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Run a backend future under a hard deadline
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout),
    }
}

/// Shared HTTP client for one-shot GET requests
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpConnector {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("homelab-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Issue a GET and check the status; the body is left unread
    pub async fn get_stream(&self, url: &str, timeout: Duration) -> BackendResult<reqwest::Response> {
        let send = async {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(BackendError::HttpStatus(status.as_u16()));
            }
            Ok(resp)
        };
        with_timeout(timeout, send).await.map_err(|e| {
            log::warn!("GET {} failed: {}", url, e);
            e
        })
    }

    /// GET and decode a JSON body
    pub async fn get_json(&self, url: &str, timeout: Duration) -> BackendResult<Value> {
        let fetch = async {
            let resp = self.get_stream(url, timeout).await?;
            let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
            serde_json::from_slice::<Value>(&bytes).map_err(BackendError::from)
        };
        with_timeout(timeout, fetch).await
    }

    /// GET a text body (invalid UTF-8 is replaced)
    pub async fn get_text(&self, url: &str, timeout: Duration) -> BackendResult<String> {
        let fetch = async {
            let resp = self.get_stream(url, timeout).await?;
            let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        };
        with_timeout(timeout, fetch).await
    }
}
