// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! MikroTik RouterOS connector
//!
//! Talks to the REST interface of RouterOS 7.1+ (`/rest/<menu path>`) with
//! HTTP basic auth. Listing a menu returns a JSON array of records; single
//! item menus such as `system/resource` return one object.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{map_reqwest_error, with_timeout};
use crate::config::{Config, RouterConfig};
use crate::error::{BackendError, BackendResult};

/// One router record, attribute name to value
pub type RouterRecord = BTreeMap<String, String>;

/// Query interface of a router management API
#[async_trait]
pub trait RouterBackend: Send + Sync {
    /// Print every record under a menu path such as `interface/bonding`
    async fn query(&self, path: &str) -> BackendResult<Vec<RouterRecord>>;
}

fn record_from(object: serde_json::Map<String, Value>) -> RouterRecord {
    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

/// Flatten a REST reply into records
pub fn decode_records(body: Value) -> BackendResult<Vec<RouterRecord>> {
    match body {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(object) => Some(record_from(object)),
                _ => None,
            })
            .collect()),
        Value::Object(object) => Ok(vec![record_from(object)]),
        other => Err(BackendError::Decode(format!(
            "Unexpected router reply: {}",
            other
        ))),
    }
}

/// REST client for the configured router
#[derive(Debug, Clone)]
pub struct RouterConnector {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl RouterConnector {
    pub fn new(router: &RouterConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: router.rest_url(),
            username: router.username.clone(),
            password: router.password.clone(),
            timeout,
        }
    }

    /// Connector for the enabled router, if any
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .router()
            .map(|router| Self::new(router, config.timeouts.router()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_matches('/'))
    }
}

#[async_trait]
impl RouterBackend for RouterConnector {
    async fn query(&self, path: &str) -> BackendResult<Vec<RouterRecord>> {
        let url = self.url(path);
        let run = async {
            let resp = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(BackendError::HttpStatus(status.as_u16()));
            }
            let body: Value = resp.json().await.map_err(map_reqwest_error)?;
            decode_records(body)
        };
        with_timeout(self.timeout, run).await.map_err(|e| {
            log::warn!("router {}: {}", url, e);
            e
        })
    }
}
