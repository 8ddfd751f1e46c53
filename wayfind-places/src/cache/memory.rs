//! L1: in-process cache tier

use super::{CacheEntry, CacheTier};
use crate::error::CacheTierError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Bounded map; evicts the oldest entry when full
pub struct MemoryTier {
    name: &'static str,
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    ttl_ceiling: Duration,
}

impl MemoryTier {
    pub fn new(max_entries: usize, ttl_ceiling: Duration) -> Self {
        Self::named("l1", max_entries, ttl_ceiling)
    }

    pub fn named(name: &'static str, max_entries: usize, ttl_ceiling: Duration) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl_ceiling,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn ttl_ceiling(&self) -> Duration {
        self.ttl_ceiling
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheTierError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, entry: &CacheEntry) -> Result<(), CacheTierError> {
        let mut entries = self.lock();

        if entries.len() >= self.max_entries && !entries.contains_key(&entry.key) {
            let oldest = entries
                .values()
                .min_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.key.cmp(&b.key)))
                .map(|e| e.key.clone());
            if let Some(oldest) = oldest {
                debug!(tier = self.name, key = %oldest, "Evicting oldest entry");
                entries.remove(&oldest);
            }
        }

        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheTierError> {
        self.lock().remove(key);
        Ok(())
    }
}
