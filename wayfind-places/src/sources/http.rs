//! Shared HTTP plumbing for source clients

use crate::error::ProviderError;
use crate::types::SourceName;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub(crate) const USER_AGENT: &str = concat!("wayfind/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(provider: SourceName, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::terminal(provider, "client_init", e.to_string()))
}

/// Send, classify non-success statuses, and decode the JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: SourceName,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let started = std::time::Instant::now();
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, &e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, &e))?;

    debug!(
        source = %provider,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        bytes = body.len(),
        "Provider responded"
    );

    if !status.is_success() {
        return Err(ProviderError::from_status(provider, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::malformed(provider, e))
}

/// Providers disagree on whether numbers are JSON numbers or strings
pub(crate) fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}
