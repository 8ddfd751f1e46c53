//! Error types for wayfind-places
//!
//! Severity:
//! - `ProviderError`, `SourceFailure`: soft, scoped to one source
//! - `CacheTierError`: soft, logged and swallowed by the cache manager
//! - `PipelineError`: hard, surfaced to the caller

use crate::types::SourceName;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a source client
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{provider} [{code}]: {message}")]
pub struct ProviderError {
    pub provider: SourceName,
    /// Short machine-readable code (`timeout`, `http_503`, `invalid_credentials`, ...)
    pub code: String,
    pub message: String,
    /// Transient failures (timeouts, 5xx, 429) that a later attempt may not repeat
    pub retryable: bool,
}

impl ProviderError {
    pub fn retryable(provider: SourceName, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider,
            code: code.into(),
            message: message.into(),
            retryable: true,
        }
    }

    pub fn terminal(provider: SourceName, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider,
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(provider: SourceName, status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate(body, 200))
        };

        match status.as_u16() {
            429 => Self::retryable(provider, "rate_limited", message),
            401 | 403 => Self::terminal(provider, "invalid_credentials", message),
            code if status.is_server_error() => {
                Self::retryable(provider, format!("http_{}", code), message)
            }
            code => Self::terminal(provider, format!("http_{}", code), message),
        }
    }

    /// Classify a transport-level failure
    pub fn from_reqwest(provider: SourceName, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::retryable(provider, "timeout", err.to_string())
        } else if err.is_connect() {
            Self::retryable(provider, "connect", err.to_string())
        } else if err.is_decode() {
            Self::terminal(provider, "malformed_response", err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(provider, status, "")
        } else {
            Self::retryable(provider, "transport", err.to_string())
        }
    }

    pub fn malformed(provider: SourceName, err: impl std::fmt::Display) -> Self {
        Self::terminal(provider, "malformed_response", err.to_string())
    }

    pub fn not_configured(provider: SourceName) -> Self {
        Self::terminal(provider, "not_configured", "source is not configured")
    }

    pub fn missing_coordinates(provider: SourceName) -> Self {
        Self::terminal(
            provider,
            "missing_coordinates",
            "provider requires concept coordinates",
        )
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

/// Rate limiter refused a permit within the bounded wait
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{provider} rate limited after waiting {waited:?}")]
pub struct RateLimited {
    pub provider: SourceName,
    pub waited: Duration,
}

/// Why one source produced no records in a resolution run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    #[error("{provider} timed out after {after:?}")]
    Timeout { provider: SourceName, after: Duration },
}

impl SourceFailure {
    pub fn provider(&self) -> SourceName {
        match self {
            SourceFailure::Provider(e) => e.provider,
            SourceFailure::RateLimited(e) => e.provider,
            SourceFailure::Timeout { provider, .. } => *provider,
        }
    }

    /// Short code for logs
    pub fn code(&self) -> &str {
        match self {
            SourceFailure::Provider(e) => &e.code,
            SourceFailure::RateLimited(_) => "rate_limited",
            SourceFailure::Timeout { .. } => "timeout",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SourceFailure::Provider(e) => e.retryable,
            SourceFailure::RateLimited(_) | SourceFailure::Timeout { .. } => true,
        }
    }
}

/// Cache tier read/write failure (never propagated past the cache manager)
#[derive(Debug, Clone, Error)]
#[error("{tier} cache tier: {message}")]
pub struct CacheTierError {
    pub tier: &'static str,
    pub message: String,
}

impl CacheTierError {
    pub fn new(tier: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            tier,
            message: err.to_string(),
        }
    }
}

/// Pipeline-level failure
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No requested source produced records
    #[error("all sources failed: {}", summarize(.failures))]
    AllSourcesFailed {
        failures: BTreeMap<SourceName, SourceFailure>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] wayfind_common::Error),
}

fn summarize(failures: &BTreeMap<SourceName, SourceFailure>) -> String {
    if failures.is_empty() {
        return "no sources requested".to_string();
    }
    failures
        .iter()
        .map(|(name, failure)| format!("{}={}", name, failure.code()))
        .collect::<Vec<_>>()
        .join(", ")
}
