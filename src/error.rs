//! Error types for the fetch pipeline.
//!
//! Fetch errors never leave the retry loop except as the reason attached to an
//! exhausted [`FetchOutcome::Failure`](crate::models::FetchOutcome). Sink errors
//! are logged by the dispatcher and counted. Only registry errors can stop the
//! process, and only at startup.

use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or a body read that broke off.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with something other than 200.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// The body was not valid JSON.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Network(format!("timed out: {e}"))
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// Delivery-side failure reported by an [`ArticleSink`](crate::sink::ArticleSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems loading or validating the source registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("source name must not be empty")]
    EmptyName,
    #[error("duplicate source name: {0}")]
    DuplicateName(String),
    #[error("source '{name}' has invalid URL '{url}': {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },
}
