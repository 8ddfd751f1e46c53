//! Per-provider rate limiting
//!
//! Each provider gets its own token bucket (steady refill plus burst) and a
//! concurrency cap. Buckets are independent: draining one provider never
//! delays another. Callers wait at most `max_wait` for a permit.

use crate::error::RateLimited;
use crate::types::SourceName;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Bucket};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

type DirectBucket = Bucket<NotKeyed, InMemoryState, DefaultClock>;

/// Quota for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Steady refill rate
    pub per_minute: u32,
    /// Requests allowed back-to-back before refill applies
    pub burst: u32,
    /// Simultaneous in-flight requests
    pub max_concurrent: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 60,
            burst: 5,
            max_concurrent: 4,
        }
    }
}

impl RateLimitConfig {
    /// Published quotas of each provider
    pub fn defaults_for(source: SourceName) -> Self {
        match source {
            SourceName::Google => Self {
                per_minute: 100,
                burst: 10,
                max_concurrent: 8,
            },
            SourceName::Yelp => Self {
                per_minute: 50,
                burst: 5,
                max_concurrent: 5,
            },
            SourceName::Amadeus | SourceName::Weather => Self::default(),
        }
    }

    fn quota(&self) -> Quota {
        Quota::per_minute(non_zero(self.per_minute)).allow_burst(non_zero(self.burst))
    }
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

struct ProviderLimiter {
    bucket: DirectBucket,
    slots: Arc<Semaphore>,
}

/// Grant to make one upstream call; releases its concurrency slot on drop
#[derive(Debug)]
pub struct Permit {
    provider: SourceName,
    waited: Duration,
    _slot: Option<OwnedSemaphorePermit>,
}

impl Permit {
    pub fn provider(&self) -> SourceName {
        self.provider
    }

    /// Time spent waiting for the permit
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Token buckets for every throttled provider
pub struct RateLimiter {
    limiters: BTreeMap<SourceName, ProviderLimiter>,
    max_wait: Duration,
}

impl RateLimiter {
    pub fn new(configs: impl IntoIterator<Item = (SourceName, RateLimitConfig)>, max_wait: Duration) -> Self {
        let limiters = configs
            .into_iter()
            .map(|(source, config)| {
                let limiter = ProviderLimiter {
                    bucket: Bucket::direct(config.quota()),
                    slots: Arc::new(Semaphore::new(config.max_concurrent.max(1) as usize)),
                };
                (source, limiter)
            })
            .collect();

        Self { limiters, max_wait }
    }

    /// Limiter that never throttles (tests, offline replays)
    pub fn unlimited() -> Self {
        Self {
            limiters: BTreeMap::new(),
            max_wait: Duration::ZERO,
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Wait up to `max_wait` for a token and a concurrency slot
    pub async fn acquire(&self, provider: SourceName) -> Result<Permit, RateLimited> {
        let Some(limiter) = self.limiters.get(&provider) else {
            return Ok(Permit {
                provider,
                waited: Duration::ZERO,
                _slot: None,
            });
        };

        let started = Instant::now();
        let wait = async {
            // The semaphore is never closed, so acquisition only fails on shutdown
            let slot = limiter.slots.clone().acquire_owned().await.ok();
            limiter.bucket.until_ready().await;
            slot
        };

        match tokio::time::timeout(self.max_wait, wait).await {
            Ok(slot) => {
                let waited = started.elapsed();
                if waited > Duration::from_millis(50) {
                    debug!(source = %provider, waited_ms = waited.as_millis() as u64, "Rate limit delayed request");
                }
                Ok(Permit {
                    provider,
                    waited,
                    _slot: slot,
                })
            }
            Err(_) => {
                let waited = started.elapsed();
                debug!(source = %provider, waited_ms = waited.as_millis() as u64, "Rate limit wait exhausted");
                Err(RateLimited { provider, waited })
            }
        }
    }
}
