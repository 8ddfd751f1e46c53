//! Test helper utilities
//!
//! Shared fixtures for the wayfind-places integration tests

#![allow(dead_code)]

pub mod fake_source;
pub mod records;

pub use fake_source::FakeSource;
pub use records::{amadeus_activity, google_place, ramen_concept, weather_report, yelp_business};

use std::sync::Arc;
use std::time::Duration;
use wayfind_common::ManualClock;
use wayfind_places::cache::{CacheManager, MemoryTier};
use wayfind_places::sources::{PlaceSource, SourceRegistry};
use wayfind_places::{ConsolidationPipeline, PlacesConfig};

/// Fixed test clock: 2023-11-14T22:13:20Z
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_unix(1_700_000_000))
}

pub fn registry(sources: &[Arc<FakeSource>]) -> SourceRegistry {
    sources
        .iter()
        .map(|s| (s.name(), s.clone() as Arc<dyn PlaceSource>))
        .collect()
}

/// Memory-only cache on the given clock
pub fn memory_cache(clock: Arc<ManualClock>) -> Arc<CacheManager> {
    Arc::new(CacheManager::new(clock).with_tier(Arc::new(MemoryTier::new(1000, Duration::from_secs(300)))))
}

/// Pipeline over fake sources with default matching and consolidation
pub fn pipeline(config: &PlacesConfig, sources: &[Arc<FakeSource>], cache: Arc<CacheManager>) -> ConsolidationPipeline {
    ConsolidationPipeline::with_sources(config, registry(sources), cache)
}
