// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Result normalization for Netdata time-series payloads
//!
//! Netdata's `/api/v1/data` answers with a label array and row-major values,
//! newest row first. [`normalize`] maps that into [`SeriesResult`] and derives
//! the `latest` projection from the first row.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{BackendResult, ErrorBody};

/// Canonical series shape
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesResult {
    /// Column labels; the first is normally `time`
    pub labels: Vec<String>,
    /// Rows, newest first
    #[serde(rename = "data")]
    pub rows: Vec<Vec<Value>>,
    /// Number of rows
    pub points: usize,
    #[serde(default)]
    pub after: Option<i64>,
    #[serde(default)]
    pub before: Option<i64>,
    #[serde(default)]
    pub dimension_names: Vec<String>,
    #[serde(default)]
    pub dimension_ids: Vec<String>,
    /// Label to value of the newest row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<BTreeMap<String, Value>>,
}

/// Raw Netdata field names; everything optional so partial payloads still map
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSeries {
    labels: Vec<String>,
    data: Vec<Vec<Value>>,
    after: Option<i64>,
    before: Option<i64>,
    dimension_names: Vec<String>,
    dimension_ids: Vec<String>,
}

impl SeriesResult {
    /// Value of a label in the newest row, as a number
    pub fn latest_f64(&self, label: &str) -> Option<f64> {
        self.latest.as_ref()?.get(label)?.as_f64()
    }
}

/// Normalize a raw payload.
///
/// A payload that already carries an `error` field is passed through as that
/// error, so normalizing an error is idempotent.
pub fn normalize(raw: &Value) -> Result<SeriesResult, ErrorBody> {
    if raw.get("error").is_some() {
        return Err(serde_json::from_value::<ErrorBody>(raw.clone())
            .unwrap_or_else(|_| ErrorBody::new(raw["error"].to_string())));
    }

    let parsed: RawSeries = serde_json::from_value(raw.clone())
        .map_err(|e| ErrorBody::new(format!("Parse error: {}", e)))?;

    let latest = match (parsed.labels.is_empty(), parsed.data.first()) {
        (false, Some(first)) => Some(
            parsed
                .labels
                .iter()
                .cloned()
                .zip(first.iter().cloned())
                .collect(),
        ),
        _ => None,
    };

    Ok(SeriesResult {
        points: parsed.data.len(),
        labels: parsed.labels,
        rows: parsed.data,
        after: parsed.after,
        before: parsed.before,
        dimension_names: parsed.dimension_names,
        dimension_ids: parsed.dimension_ids,
        latest,
    })
}

/// Normalize the outcome of a backend call
pub fn normalize_result(result: &BackendResult) -> Result<SeriesResult, ErrorBody> {
    match result {
        Ok(raw) => normalize(raw),
        Err(e) => Err(ErrorBody::from(e)),
    }
}
