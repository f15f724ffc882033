// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for Homelab Monitor
//!
//! Two layers: [`BackendError`] describes why a single backend call failed and
//! is always carried as data (never raised past an aggregate), while
//! [`MonitorError`] covers the crate-level failures of startup and I/O.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Outcome of one backend call
pub type BackendResult<T = serde_json::Value> = std::result::Result<T, BackendError>;

/// Failure of a single backend call or decode step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The call exceeded its bounded timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection, DNS or TLS failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// Malformed payload (JSON, exposition line, router reply)
    #[error("Decode error: {0}")]
    Decode(String),

    /// A stream grew past its buffer cap without completing a frame
    #[error("Response too large (over {limit} bytes without a complete frame)")]
    StreamTooLarge { limit: usize },

    /// Unknown target, backend, container or prefix
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable state could not be read or written
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

/// Serializable discriminant of [`BackendError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Transport,
    HttpStatus,
    Decode,
    StreamTooLarge,
    NotFound,
    Persistence,
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::HttpStatus(_) => ErrorKind::HttpStatus,
            Self::Decode(_) => ErrorKind::Decode,
            Self::StreamTooLarge { .. } => ErrorKind::StreamTooLarge,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Structured `{"error": ...}` object placed in aggregate responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Failure class, when the error came from a backend call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Suggestion for the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: None,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<&BackendError> for ErrorBody {
    fn from(err: &BackendError) -> Self {
        Self {
            error: err.to_string(),
            kind: Some(err.kind()),
            hint: None,
        }
    }
}

impl From<BackendError> for ErrorBody {
    fn from(err: BackendError) -> Self {
        ErrorBody::from(&err)
    }
}

/// Main error type for Homelab Monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend call failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
