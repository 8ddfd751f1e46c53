//! Three-tier cache
//!
//! # Architecture
//! - **L1** (`MemoryTier`): process memory, smallest TTL ceiling
//! - **L2** (`RemoteTier`): shared network cache visible across processes
//! - **L3** (`DurableTier`): SQLite, longest retention
//!
//! Reads walk L1 → L2 → L3; a hit at tier N backfills tiers 1..N-1 with the
//! remaining TTL. Writes go to every tier.
//!
//! # Error Handling
//! Tier failures are logged and swallowed. With every tier down the manager
//! behaves as "always fetch live".

pub mod durable;
pub mod keys;
pub mod memory;
pub mod remote;

pub use durable::DurableTier;
pub use memory::MemoryTier;
pub use remote::RemoteTier;

use crate::error::CacheTierError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use wayfind_common::time::{self, Clock};

/// One cached value, same shape at every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Opaque JSON blob
    pub value: String,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            stored_at,
            ttl,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.stored_at + time::to_chrono(self.ttl)
    }

    /// TTL left at `now`, `None` once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        time::remaining(self.stored_at, self.ttl, now)
    }
}

/// Storage layer behind the cache manager
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name for logs and stats (`l1`, `l2`, `l3`)
    fn name(&self) -> &'static str;

    /// Longest TTL this tier retains an entry for
    fn ttl_ceiling(&self) -> Duration;

    /// Stored entry regardless of expiry; the manager judges freshness
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheTierError>;

    async fn set(&self, entry: &CacheEntry) -> Result<(), CacheTierError>;

    async fn remove(&self, key: &str) -> Result<(), CacheTierError>;
}

/// Cache settings (`[cache]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enable_memory: bool,
    pub l1_ttl_ceiling_secs: u64,
    pub max_l1_entries: usize,
    /// Redis REST endpoint; L2 disabled when unset
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub remote_timeout_ms: u64,
    pub l2_ttl_ceiling_secs: u64,
    pub enable_durable: bool,
    pub database_path: Option<PathBuf>,
    pub l3_ttl_ceiling_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_memory: true,
            l1_ttl_ceiling_secs: 300,
            max_l1_entries: 1000,
            remote_url: None,
            remote_token: None,
            remote_timeout_ms: 1_500,
            l2_ttl_ceiling_secs: 3_600,
            enable_durable: true,
            database_path: None,
            l3_ttl_ceiling_secs: 86_400,
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Hits per tier name
    pub hits: BTreeMap<&'static str, u64>,
    /// Lookups that missed every tier
    pub misses: u64,
    pub read_errors: u64,
    pub write_errors: u64,
}

impl CacheStats {
    pub fn total_hits(&self) -> u64 {
        self.hits.values().sum()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.total_hits() as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: Vec<AtomicU64>,
    misses: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Tiered cache with get / set / cache-or-fetch
pub struct CacheManager {
    tiers: Vec<Arc<dyn CacheTier>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
    in_flight: Mutex<HashMap<String, Gate>>,
}

impl CacheManager {
    /// Manager with no tiers (every lookup misses)
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tiers: Vec::new(),
            clock,
            counters: Counters::default(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Build the configured tiers. A tier that cannot start is skipped with a
    /// warning; the pipeline still works with fewer (or no) tiers.
    pub async fn from_config(config: &CacheConfig, database_path: &Path, clock: Arc<dyn Clock>) -> Self {
        let mut manager = Self::new(clock);

        if config.enable_memory {
            manager = manager.with_tier(Arc::new(MemoryTier::new(
                config.max_l1_entries,
                Duration::from_secs(config.l1_ttl_ceiling_secs),
            )));
        }

        if let Some(url) = config.remote_url.as_deref().filter(|u| !u.trim().is_empty()) {
            match RemoteTier::new(
                url,
                config.remote_token.clone(),
                Duration::from_millis(config.remote_timeout_ms),
                Duration::from_secs(config.l2_ttl_ceiling_secs),
            ) {
                Ok(tier) => manager = manager.with_tier(Arc::new(tier)),
                Err(e) => warn!(error = %e, "Remote cache unavailable, continuing without L2"),
            }
        }

        if config.enable_durable {
            match wayfind_common::db::init_cache_database(database_path).await {
                Ok(pool) => {
                    let tier = DurableTier::new(pool, Duration::from_secs(config.l3_ttl_ceiling_secs));
                    if let Err(e) = tier.purge_expired(manager.clock.now()).await {
                        warn!(error = %e, "Failed to purge expired durable entries");
                    }
                    manager = manager.with_tier(Arc::new(tier));
                }
                Err(e) => warn!(
                    path = %database_path.display(),
                    error = %e,
                    "Durable cache unavailable, continuing without L3"
                ),
            }
        }

        info!(tiers = ?manager.tier_names(), "Cache ready");
        manager
    }

    /// Append the next-slower tier
    pub fn with_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.tiers.push(tier);
        self.counters.hits.push(AtomicU64::new(0));
        self
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Raw JSON blob for `key`
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        self.lookup(key, true).await.map(|(value, _)| value)
    }

    /// Blob plus the TTL it has left
    async fn lookup(&self, key: &str, count_miss: bool) -> Option<(String, Duration)> {
        let now = self.clock.now();

        for (index, tier) in self.tiers.iter().enumerate() {
            let entry = match tier.get(key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(tier = tier.name(), key, error = %e, "Cache read failed, trying next tier");
                    continue;
                }
            };

            let Some(remaining) = entry.remaining(now) else {
                // Stale entries are dropped lazily
                if let Err(e) = tier.remove(key).await {
                    debug!(tier = tier.name(), key, error = %e, "Failed to drop expired entry");
                }
                continue;
            };

            self.counters.hits[index].fetch_add(1, Ordering::Relaxed);
            debug!(tier = tier.name(), key, remaining_secs = remaining.as_secs(), "Cache hit");

            self.backfill(index, key, &entry.value, remaining, now).await;
            return Some((entry.value, remaining));
        }

        if count_miss {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        debug!(key, "Cache miss");
        None
    }

    /// Typed lookup; undecodable blobs count as misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup_typed(key, true).await.map(|(value, _)| value)
    }

    /// Store a JSON blob in every tier
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = self.clock.now();
        self.write_tiers(&self.tiers, key, value, ttl, now).await;
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw, ttl).await,
            Err(e) => warn!(key, error = %e, "Value failed to encode, not cached"),
        }
    }

    /// Remove `key` from every tier
    pub async fn invalidate(&self, key: &str) {
        for tier in &self.tiers {
            if let Err(e) = tier.remove(key).await {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!(tier = tier.name(), key, error = %e, "Cache invalidate failed");
            }
        }
    }

    /// Return the cached value or run `fetch`, caching a successful result
    ///
    /// Concurrent callers for the same key share one fetch: later callers wait
    /// for the first and then read its result from the cache. Errors are never
    /// cached, so waiters of a failed fetch try again themselves.
    pub async fn cache_or_fetch<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cache_or_fetch_with_ttl(key, ttl, fetch)
            .await
            .map(|(value, _)| value)
    }

    /// `cache_or_fetch`, also returning how long the value stays fresh
    ///
    /// A cache hit reports the entry's remaining TTL; a fresh fetch reports `ttl`.
    pub async fn cache_or_fetch_with_ttl<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<(T, Duration), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup_typed(key, true).await {
            return Ok(hit);
        }

        let _in_flight = self.enter(key).await;

        // Filled by another caller while we waited
        if let Some(hit) = self.lookup_typed(key, false).await {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.set(key, &value, ttl).await;
        Ok((value, ttl))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self
                .tiers
                .iter()
                .zip(&self.counters.hits)
                .map(|(tier, hits)| (tier.name(), hits.load(Ordering::Relaxed)))
                .collect(),
            misses: self.counters.misses.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    async fn lookup_typed<T: DeserializeOwned>(&self, key: &str, count_miss: bool) -> Option<(T, Duration)> {
        let (raw, remaining) = self.lookup(key, count_miss).await?;
        Some((decode(key, raw)?, remaining))
    }

    async fn backfill(&self, hit_index: usize, key: &str, value: &str, remaining: Duration, now: DateTime<Utc>) {
        if hit_index == 0 {
            return;
        }
        self.write_tiers(&self.tiers[..hit_index], key, value, remaining, now)
            .await;
    }

    async fn write_tiers(&self, tiers: &[Arc<dyn CacheTier>], key: &str, value: &str, ttl: Duration, now: DateTime<Utc>) {
        for tier in tiers {
            let tier_ttl = ttl.min(tier.ttl_ceiling());
            if tier_ttl.is_zero() {
                continue;
            }
            let entry = CacheEntry::new(key, value, now, tier_ttl);
            if let Err(e) = tier.set(&entry).await {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!(tier = tier.name(), key, error = %e, "Cache write failed, continuing");
            }
        }
    }

    fn gate(&self, key: &str) -> Gate {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.entry(key.to_string()).or_default().clone()
    }

    /// Wait for exclusive use of `key`
    async fn enter<'a>(&'a self, key: &'a str) -> InFlight<'a> {
        let mut in_flight = InFlight {
            manager: self,
            key,
            gate: self.gate(key),
            lock: None,
        };
        in_flight.lock = Some(in_flight.gate.clone().lock_owned().await);
        in_flight
    }

    fn release_gate(&self, key: &str, gate: &Gate) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map plus ours: nobody else is waiting
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(key);
        }
    }
}

/// Holder of a key's gate. Dropping it, including when the owning future is
/// cancelled mid-fetch, unlocks the gate and forgets it once nobody waits.
struct InFlight<'a> {
    manager: &'a CacheManager,
    key: &'a str,
    gate: Gate,
    lock: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.lock.take();
        self.manager.release_gate(self.key, &self.gate);
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: String) -> Option<T> {
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Cached value failed to decode, ignoring");
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FlakyTier;
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use wayfind_common::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_unix(1_700_000_000))
    }

    fn three_tiers(clock: Arc<ManualClock>) -> (CacheManager, Arc<FlakyTier>, Arc<FlakyTier>, Arc<FlakyTier>) {
        let l1 = Arc::new(FlakyTier::new("l1", Duration::from_secs(300)));
        let l2 = Arc::new(FlakyTier::new("l2", HOUR));
        let l3 = Arc::new(FlakyTier::new("l3", 24 * HOUR));
        let manager = CacheManager::new(clock)
            .with_tier(l1.clone())
            .with_tier(l2.clone())
            .with_tier(l3.clone());
        (manager, l1, l2, l3)
    }

    #[tokio::test]
    async fn test_set_then_get_then_expire() {
        let clock = clock();
        let manager = CacheManager::new(clock.clone())
            .with_tier(Arc::new(MemoryTier::new(100, HOUR)));

        manager.set("weather:35.66:139.70", &"sunny", Duration::from_secs(60)).await;
        assert_eq!(manager.get::<String>("weather:35.66:139.70").await.as_deref(), Some("sunny"));

        clock.advance(Duration::from_secs(59));
        assert!(manager.get::<String>("weather:35.66:139.70").await.is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(manager.get::<String>("weather:35.66:139.70").await, None);
    }

    #[tokio::test]
    async fn test_write_clamps_to_tier_ceiling() {
        let clock = clock();
        let (manager, l1, l2, l3) = three_tiers(clock.clone());

        manager.set("k", &1u32, 6 * HOUR).await;

        assert_eq!(l1.inner.get("k").await.unwrap().unwrap().ttl, Duration::from_secs(300));
        assert_eq!(l2.inner.get("k").await.unwrap().unwrap().ttl, HOUR);
        assert_eq!(l3.inner.get("k").await.unwrap().unwrap().ttl, 6 * HOUR);
    }

    #[tokio::test]
    async fn test_l3_hit_backfills_faster_tiers_with_remaining_ttl() {
        let clock = clock();
        let (manager, l1, l2, l3) = three_tiers(clock.clone());

        // Only the durable tier has the value, stored 10 minutes ago with 2h TTL
        let stored_at = clock.now();
        l3.inner
            .set(&CacheEntry::new("k", "\"v\"", stored_at, 2 * HOUR))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(600));

        assert_eq!(manager.get::<String>("k").await.as_deref(), Some("v"));

        let l2_entry = l2.inner.get("k").await.unwrap().unwrap();
        assert_eq!(l2_entry.ttl, HOUR, "remaining 1h50m clamped to L2 ceiling");
        assert_eq!(l2_entry.stored_at, clock.now());

        let l1_entry = l1.inner.get("k").await.unwrap().unwrap();
        assert_eq!(l1_entry.ttl, Duration::from_secs(300));

        let stats = manager.stats();
        assert_eq!(stats.hits["l3"], 1);
        assert_eq!(stats.hits["l1"], 0);

        // Next read is served by L1
        assert!(manager.get::<String>("k").await.is_some());
        assert_eq!(manager.stats().hits["l1"], 1);
    }

    #[tokio::test]
    async fn test_backfill_uses_remaining_not_original_ttl() {
        let clock = clock();
        let l1 = Arc::new(MemoryTier::new(100, HOUR));
        let l2 = Arc::new(MemoryTier::named("l2", 100, 24 * HOUR));
        let manager = CacheManager::new(clock.clone())
            .with_tier(l1.clone())
            .with_tier(l2.clone());

        l2.set(&CacheEntry::new("k", "1", clock.now(), Duration::from_secs(100)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(70));

        assert_eq!(manager.get::<u32>("k").await, Some(1));
        assert_eq!(l1.get("k").await.unwrap().unwrap().ttl, Duration::from_secs(30));

        // Backfilled copy expires together with the original
        clock.advance(Duration::from_secs(30));
        assert_eq!(manager.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_failing_tier_is_swallowed() {
        let clock = clock();
        let (manager, l1, l2, _l3) = three_tiers(clock);
        l2.failing.store(true, Ordering::SeqCst);

        manager.set("k", &"v", HOUR).await;
        assert_eq!(manager.stats().write_errors, 1);

        // L1 still serves; after L1 is cleared, L3 serves past the broken L2
        assert_eq!(manager.get::<String>("k").await.as_deref(), Some("v"));
        l1.inner.remove("k").await.unwrap();
        assert_eq!(manager.get::<String>("k").await.as_deref(), Some("v"));

        let stats = manager.stats();
        assert_eq!(stats.hits["l3"], 1);
        assert!(stats.read_errors >= 1);
    }

    #[tokio::test]
    async fn test_all_tiers_down_fetches_live() {
        let clock = clock();
        let (manager, l1, l2, l3) = three_tiers(clock);
        for tier in [&l1, &l2, &l3] {
            tier.failing.store(true, Ordering::SeqCst);
        }

        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let value: Result<u32, String> = manager
                .cache_or_fetch("k", HOUR, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_or_fetch_caches_success_only() {
        let clock = clock();
        let manager = CacheManager::new(clock).with_tier(Arc::new(MemoryTier::new(100, HOUR)));
        let calls = AtomicUsize::new(0);

        let failed: Result<u32, &str> = manager
            .cache_or_fetch("k", HOUR, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            })
            .await;
        assert_eq!(failed, Err("boom"));

        for _ in 0..3 {
            let ok: Result<u32, &str> = manager
                .cache_or_fetch("k", HOUR, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(ok, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let manager = Arc::new(
            CacheManager::new(clock()).with_tier(Arc::new(MemoryTier::new(100, HOUR))),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .cache_or_fetch("place:google:search:ramen", HOUR, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(vec!["ichiran".to_string()])
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec!["ichiran".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_releases_gate() {
        let manager = CacheManager::new(clock()).with_tier(Arc::new(MemoryTier::new(100, HOUR)));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            manager.cache_or_fetch("place:google:search:slow", HOUR, || async {
                std::future::pending::<Result<u32, String>>().await
            }),
        )
        .await;

        assert!(abandoned.is_err());
        assert!(manager.in_flight.lock().unwrap().is_empty());

        // The key is usable again right away
        let value: Result<u32, String> = manager
            .cache_or_fetch("place:google:search:slow", HOUR, || async { Ok(5) })
            .await;
        assert_eq!(value, Ok(5));
    }

    #[tokio::test]
    async fn test_cache_or_fetch_reports_remaining_ttl() {
        let clock = clock();
        let manager = CacheManager::new(clock.clone()).with_tier(Arc::new(MemoryTier::new(100, HOUR)));

        let (_, fresh) = manager
            .cache_or_fetch_with_ttl("k", Duration::from_secs(60), || async { Ok::<_, String>(1u8) })
            .await
            .unwrap();
        clock.advance(Duration::from_secs(45));
        let (_, cached) = manager
            .cache_or_fetch_with_ttl("k", Duration::from_secs(60), || async { Ok::<_, String>(2u8) })
            .await
            .unwrap();

        assert_eq!(fresh, Duration::from_secs(60));
        assert_eq!(cached, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss() {
        let manager = CacheManager::new(clock()).with_tier(Arc::new(MemoryTier::new(100, HOUR)));
        manager.set("k", &"text", HOUR).await;
        assert_eq!(manager.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_no_tiers_always_misses() {
        let manager = CacheManager::new(clock());
        manager.set("k", &1u8, HOUR).await;
        assert_eq!(manager.get::<u8>("k").await, None);
        assert_eq!(manager.stats().misses, 1);
        assert_eq!(manager.stats().hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_from_config_skips_unavailable_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            remote_url: Some("   ".into()),
            ..CacheConfig::default()
        };

        let manager = CacheManager::from_config(&config, &dir.path().join("cache.db"), clock()).await;
        assert_eq!(manager.tier_names(), vec!["l1", "l3"]);

        // Parent of the database path is a file, so L3 cannot open
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let manager = CacheManager::from_config(&config, &blocker.join("cache.db"), clock()).await;
        assert_eq!(manager.tier_names(), vec!["l1"]);
    }
}
