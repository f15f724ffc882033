// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Prometheus Exposition Decoder
//!
//! Turns Prometheus text exposition (as served by Lighthouse, Reth and other
//! `/metrics` endpoints) into a flat map of metric key to value. Keys keep the
//! label block verbatim, so `validator_balance_gwei{validator="1"}` and
//! `validator_balance_gwei{validator="2"}` remain distinct entries.
//!
//! # Examples
//!
//! ```
//! use homelab::prometheus::{decode, sum_prefix};
//!
//! let text = "# TYPE validator_balance_gwei gauge\n\
//!             validator_balance_gwei{v=\"1\"} 1000\n\
//!             validator_balance_gwei{v=\"2\"} 2000\n";
//! let metrics = decode(text);
//! assert_eq!(sum_prefix(&metrics, "validator_balance_gwei"), 3000.0);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decoded exposition: metric key (with label block) to value
pub type MetricMap = BTreeMap<String, f64>;

/// A single decoded exposition line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric name including its label block, if any
    pub key: String,
    /// Metric value
    pub value: f64,
}

/// Decode a whole exposition document.
///
/// Comment and blank lines are skipped; a line that does not yield a key and
/// a numeric value is dropped without affecting the rest of the document.
/// A repeated key keeps its last value.
pub fn decode(text: &str) -> MetricMap {
    let mut metrics = MetricMap::new();
    for line in text.lines() {
        match parse_line(line) {
            Some(sample) => {
                metrics.insert(sample.key, sample.value);
            }
            None => continue,
        }
    }
    metrics
}

/// Decode one exposition line
pub fn parse_line(line: &str) -> Option<MetricSample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value_token) = match (line.find('{'), line.rfind('}')) {
        (Some(open), Some(close)) if close > open => {
            let key = &line[..=close];
            let value_token = line[close + 1..].split_whitespace().next()?;
            (key, value_token)
        }
        (Some(_), _) => return None,
        (None, _) => {
            let mut parts = line.split_whitespace();
            (parts.next()?, parts.next()?)
        }
    };

    if key.starts_with('{') {
        return None;
    }

    Some(MetricSample {
        key: key.to_string(),
        value: parse_value(value_token)?,
    })
}

/// Parse a sample value, including the `+Inf`/`-Inf`/`NaN` spellings
fn parse_value(token: &str) -> Option<f64> {
    match token {
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => token.parse::<f64>().ok(),
    }
}

/// Metric name of a key, without its label block
pub fn metric_name(key: &str) -> &str {
    match key.find('{') {
        Some(idx) => &key[..idx],
        None => key,
    }
}

/// Sum of every entry whose key starts with `prefix`
pub fn sum_prefix(metrics: &MetricMap, prefix: &str) -> f64 {
    metrics
        .iter()
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(_, value)| *value)
        .sum()
}

/// Sum of every entry whose key contains `needle`
pub fn sum_containing(metrics: &MetricMap, needle: &str) -> f64 {
    metrics
        .iter()
        .filter(|(key, _)| key.contains(needle))
        .map(|(_, value)| *value)
        .sum()
}

/// Value of an exact key, or 0 when absent
pub fn get_or_zero(metrics: &MetricMap, key: &str) -> f64 {
    metrics.get(key).copied().unwrap_or(0.0)
}

/// Value of a metric by bare name, ignoring labels.
///
/// The unlabelled key wins; otherwise the last labelled series in key order.
pub fn get_by_name(metrics: &MetricMap, name: &str) -> f64 {
    if let Some(value) = metrics.get(name) {
        return *value;
    }
    metrics
        .iter()
        .filter(|(key, _)| metric_name(key) == name)
        .map(|(_, value)| *value)
        .last()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line() {
        let metrics = decode("foo 3.5");
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics["foo"], 3.5);
    }

    #[test]
    fn test_labeled_line_keeps_label_block() {
        let metrics = decode("foo{a=\"b\"} 3.5");
        assert_eq!(metrics["foo{a=\"b\"}"], 3.5);
        assert!(!metrics.contains_key("foo"));
    }

    #[test]
    fn test_malformed_line_is_dropped() {
        let metrics = decode("up 1\nfoo bar\nlibp2p_peers 42\n");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["up"], 1.0);
        assert_eq!(metrics["libp2p_peers"], 42.0);
        assert!(!metrics.contains_key("foo"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# HELP beacon_head_slot Slot of the head block\n\
                    # TYPE beacon_head_slot gauge\n\
                    \n\
                    beacon_head_slot 9123456\n";
        let metrics = decode(text);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics["beacon_head_slot"], 9_123_456.0);
    }

    #[test]
    fn test_last_write_wins() {
        let metrics = decode("reth_network_active_sessions 3\nreth_network_active_sessions 7\n");
        assert_eq!(metrics["reth_network_active_sessions"], 7.0);
    }

    #[test]
    fn test_trailing_timestamp_ignored() {
        let metrics = decode("http_requests_total{code=\"200\"} 1027 1395066363000");
        assert_eq!(metrics["http_requests_total{code=\"200\"}"], 1027.0);
    }

    #[test]
    fn test_special_values() {
        let metrics = decode("a +Inf\nb -Inf\nc NaN\nd 1.5e3\n");
        assert!(metrics["a"].is_infinite() && metrics["a"] > 0.0);
        assert!(metrics["b"].is_infinite() && metrics["b"] < 0.0);
        assert!(metrics["c"].is_nan());
        assert_eq!(metrics["d"], 1500.0);
    }

    #[test]
    fn test_unterminated_label_block_dropped() {
        assert!(parse_line("foo{a=\"b\" 1").is_none());
        assert!(parse_line("{a=\"b\"} 1").is_none());
        assert!(parse_line("lonely").is_none());
    }

    #[test]
    fn test_label_value_containing_spaces() {
        let sample = parse_line("build_info{version=\"v5.1.0 stable\"} 1").unwrap();
        assert_eq!(sample.key, "build_info{version=\"v5.1.0 stable\"}");
        assert_eq!(sample.value, 1.0);
    }

    #[test]
    fn test_validator_balance_sum() {
        let text = "validator_balance_gwei{v=\"1\"} 1000\nvalidator_balance_gwei{v=\"2\"} 2000\n";
        let metrics = decode(text);
        assert_eq!(sum_prefix(&metrics, "validator_balance_gwei"), 3000.0);
    }

    #[test]
    fn test_sum_containing_and_helpers() {
        let text = "validator_monitor_prev_epoch_on_chain_attester_hit{validator=\"1\"} 1\n\
                    validator_monitor_prev_epoch_on_chain_attester_hit{validator=\"2\"} 1\n\
                    validator_monitor_prev_epoch_on_chain_attester_miss{validator=\"2\"} 1\n";
        let metrics = decode(text);
        assert_eq!(sum_containing(&metrics, "attester_hit"), 2.0);
        assert_eq!(sum_containing(&metrics, "attester_miss"), 1.0);
        assert_eq!(get_or_zero(&metrics, "libp2p_peers"), 0.0);
        assert_eq!(
            metric_name("validator_monitor_prev_epoch_on_chain_attester_hit{validator=\"1\"}"),
            "validator_monitor_prev_epoch_on_chain_attester_hit"
        );
        assert_eq!(metric_name("up"), "up");
    }

    #[test]
    fn test_get_by_name() {
        let metrics = decode(
            "reth_consensus_engine_head_block_number{chain=\"1\"} 21000000\n\
             reth_network_active_sessions 12\n",
        );
        assert_eq!(get_by_name(&metrics, "reth_consensus_engine_head_block_number"), 21_000_000.0);
        assert_eq!(get_by_name(&metrics, "reth_network_active_sessions"), 12.0);
        assert_eq!(get_by_name(&metrics, "reth_executor_block_gas_used"), 0.0);
    }
}
