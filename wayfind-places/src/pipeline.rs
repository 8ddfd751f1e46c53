//! Consolidation pipeline
//!
//! Received → Resolving → Matching → Consolidating → Returned, with an early
//! exit to Failed when no place source produced records. The consolidated
//! cache key covers the matched clusters' contents and the weather record, so
//! a repeated concept over unchanged source data is served without re-merging,
//! while refreshed upstream data always produces a new key.

use crate::cache::{keys, CacheManager};
use crate::config::PlacesConfig;
use crate::consolidation::ConsolidationService;
use crate::error::PipelineError;
use crate::matcher::EntityMatcher;
use crate::rate_limiter::RateLimiter;
use crate::resolution::ApiResolutionService;
use crate::sources::{build_sources, SourceRegistry};
use crate::types::{ConsolidatedPlace, MatchGroup, PlaceConcept, RawApiResults, SourceName};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;
use wayfind_common::{hash, Clock};

/// `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overall budget for all source calls
    pub deadline_ms: u64,
    /// Longest wait for a rate-limit permit
    pub rate_limit_wait_ms: u64,
    pub enable_weather: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 8_000,
            rate_limit_wait_ms: 3_000,
            enable_weather: true,
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn rate_limit_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_wait_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Resolving,
    Matching,
    Consolidating,
    Returned,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Received => "received",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Matching => "matching",
            PipelineStage::Consolidating => "consolidating",
            PipelineStage::Returned => "returned",
            PipelineStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Concept in, ranked consolidated places out
pub struct ConsolidationPipeline {
    resolver: ApiResolutionService,
    matcher: EntityMatcher,
    consolidator: ConsolidationService,
    cache: Arc<CacheManager>,
}

impl ConsolidationPipeline {
    pub fn new(
        resolver: ApiResolutionService,
        matcher: EntityMatcher,
        consolidator: ConsolidationService,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self {
            resolver,
            matcher,
            consolidator,
            cache,
        }
    }

    /// Wire real clients, cache tiers and rate limits from configuration
    pub async fn from_config(config: &PlacesConfig, clock: Arc<dyn Clock>) -> Result<Self, PipelineError> {
        let sources = build_sources(config, clock.clone())
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if sources.is_empty() {
            return Err(PipelineError::Config(
                "no usable sources (set at least one provider API key)".to_string(),
            ));
        }

        let cache = Arc::new(CacheManager::from_config(&config.cache, &config.cache_database_path(), clock).await);
        Ok(Self::with_sources(config, sources, cache))
    }

    /// Assemble around an explicit source registry and cache
    pub fn with_sources(config: &PlacesConfig, sources: SourceRegistry, cache: Arc<CacheManager>) -> Self {
        let rate_limiter = RateLimiter::new(
            SourceName::ALL.into_iter().map(|s| (s, config.rate_limit(s))),
            config.pipeline.rate_limit_wait(),
        );
        let resolver = ApiResolutionService::new(
            sources,
            cache.clone(),
            Arc::new(rate_limiter),
            config.pipeline.deadline(),
        )
        .with_weather(config.pipeline.enable_weather);

        Self::new(
            resolver,
            EntityMatcher::new(config.matching.clone()),
            ConsolidationService::new(config.consolidation.clone()),
            cache,
        )
    }

    pub fn resolver(&self) -> &ApiResolutionService {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Run with the sources routed for the concept's category
    pub async fn run(&self, concept: &PlaceConcept) -> Result<Vec<ConsolidatedPlace>, PipelineError> {
        let sources = self.resolver.sources_for(concept);
        self.run_with_sources(concept, &sources).await
    }

    pub async fn run_with_sources(
        &self,
        concept: &PlaceConcept,
        sources: &[SourceName],
    ) -> Result<Vec<ConsolidatedPlace>, PipelineError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        debug!(%request_id, stage = %PipelineStage::Received, query = %concept.query, "Pipeline");

        debug!(%request_id, stage = %PipelineStage::Resolving, sources = ?sources, "Pipeline");
        let raw = match self.resolver.resolve(concept, sources).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(%request_id, stage = %PipelineStage::Failed, error = %e, "Pipeline");
                return Err(e);
            }
        };

        debug!(%request_id, stage = %PipelineStage::Matching, records = raw.records().count(), "Pipeline");
        let groups = self.matcher.match_records(&raw);

        let key = keys::consolidated_key(&concept.signature(), &cluster_signature(&groups, &raw));

        if let Some(places) = self.cache.get::<Vec<ConsolidatedPlace>>(&key).await {
            debug!(%request_id, stage = %PipelineStage::Returned, key = %key, "Consolidated cache hit");
            return Ok(places);
        }

        debug!(%request_id, stage = %PipelineStage::Consolidating, groups = groups.len(), "Pipeline");
        let mut places = self.consolidator.consolidate(&groups);

        if let Some(weather) = raw.weather() {
            for place in &mut places {
                place.weather = Some(weather.clone());
            }
        }

        rank(&mut places, concept);

        self.cache.set(&key, &places, self.result_ttl(&raw)).await;

        info!(
            %request_id,
            query = %concept.query,
            places = places.len(),
            failed_sources = raw.failures().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Consolidation complete"
        );
        debug!(%request_id, stage = %PipelineStage::Returned, "Pipeline");

        Ok(places)
    }

    /// Consolidated results never outlive the source entries they were built from
    fn result_ttl(&self, raw: &RawApiResults) -> Duration {
        let ttl = self.consolidator.config().consolidated_ttl();
        raw.min_fresh_for().map_or(ttl, |fresh| ttl.min(fresh))
    }
}

/// Digest of every group's contents plus the weather record (or its absence)
fn cluster_signature(groups: &[MatchGroup], raw: &RawApiResults) -> String {
    let weather = raw
        .records()
        .find(|r| r.as_weather().is_some())
        .map_or_else(|| "weather:-".to_string(), |w| format!("weather:{}", w.content_digest()));

    hash::signature(groups.iter().map(MatchGroup::content_signature).chain([weather]))
}

/// Highest confidence first, then relevance to the concept, then id
pub fn rank(places: &mut [ConsolidatedPlace], concept: &PlaceConcept) {
    let family = concept.category.place_category().family();
    let origin = concept.coordinates();

    let distance = |place: &ConsolidatedPlace| -> Option<f64> {
        Some(origin?.distance_meters(&place.location?))
    };

    places.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| (b.category.family() == family).cmp(&(a.category.family() == family)))
            .then_with(|| compare_distance(distance(a), distance(b)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Known distances first, nearest first
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
