//! L2: shared network cache over the Redis REST protocol
//!
//! Speaks the Upstash-compatible REST dialect (`/get/{key}`, `/set/{key}?EX=`,
//! `/del/{key}`) with bearer auth. Values are stored as a JSON envelope holding
//! the whole `CacheEntry` so the remaining TTL survives the round trip.

use super::{CacheEntry, CacheTier};
use crate::error::CacheTierError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TIER: &str = "l2";

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct RemoteTier {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    ttl_ceiling: Duration,
}

impl RemoteTier {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
        ttl_ceiling: Duration,
    ) -> Result<Self, CacheTierError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheTierError::new(TIER, e))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            ttl_ceiling,
        })
    }

    fn url(&self, command: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, command, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RestReply, CacheTierError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| CacheTierError::new(TIER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CacheTierError::new(TIER, e))?;

        let reply = parse_reply(&body)?;
        if !status.is_success() {
            let detail = reply.error.unwrap_or(body);
            return Err(CacheTierError::new(TIER, format!("HTTP {}: {}", status, detail)));
        }
        Ok(reply)
    }
}

fn parse_reply(body: &str) -> Result<RestReply, CacheTierError> {
    serde_json::from_str(body).map_err(|e| CacheTierError::new(TIER, format!("bad reply: {}", e)))
}

/// Decode a `/get` reply into the stored envelope
fn entry_from_reply(reply: RestReply) -> Result<Option<CacheEntry>, CacheTierError> {
    if let Some(error) = reply.error {
        return Err(CacheTierError::new(TIER, error));
    }
    match reply.result {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(envelope)) => serde_json::from_str(&envelope)
            .map(Some)
            .map_err(|e| CacheTierError::new(TIER, format!("bad envelope: {}", e))),
        Some(other) => Err(CacheTierError::new(
            TIER,
            format!("unexpected result type: {}", other),
        )),
    }
}

#[async_trait]
impl CacheTier for RemoteTier {
    fn name(&self) -> &'static str {
        TIER
    }

    fn ttl_ceiling(&self) -> Duration {
        self.ttl_ceiling
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheTierError> {
        let reply = self.send(self.http_client.get(self.url("get", key))).await?;
        entry_from_reply(reply)
    }

    async fn set(&self, entry: &CacheEntry) -> Result<(), CacheTierError> {
        let envelope = serde_json::to_string(entry).map_err(|e| CacheTierError::new(TIER, e))?;
        // Redis expiry is whole seconds; round up so it never undercuts the entry
        let expire_secs = entry.ttl.as_secs() + u64::from(entry.ttl.subsec_nanos() > 0);

        let request = self
            .http_client
            .post(self.url("set", &entry.key))
            .query(&[("EX", expire_secs)])
            .body(envelope);
        let reply = self.send(request).await?;

        if let Some(error) = reply.error {
            return Err(CacheTierError::new(TIER, error));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheTierError> {
        self.send(self.http_client.post(self.url("del", key)))
            .await
            .map(|_| ())
    }
}
