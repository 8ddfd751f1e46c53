//! API resolution service
//!
//! Fans a concept out to every requested source at once. Each call goes
//! through the cache first, then the rate limiter, then the client. All calls
//! share one deadline; whatever finished by then is used.

use crate::cache::CacheManager;
use crate::error::{PipelineError, ProviderError, SourceFailure};
use crate::rate_limiter::RateLimiter;
use crate::sources::SourceRegistry;
use crate::types::{ConceptCategory, PlaceConcept, RawApiResults, SourceName, SourceRecord};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use tracing::{debug, warn};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(8);

/// Gathers raw records for a concept from registered sources
pub struct ApiResolutionService {
    sources: SourceRegistry,
    cache: Arc<CacheManager>,
    rate_limiter: Arc<RateLimiter>,
    deadline: Duration,
    enable_weather: bool,
}

impl ApiResolutionService {
    pub fn new(
        sources: SourceRegistry,
        cache: Arc<CacheManager>,
        rate_limiter: Arc<RateLimiter>,
        deadline: Duration,
    ) -> Self {
        Self {
            sources,
            cache,
            rate_limiter,
            deadline,
            enable_weather: true,
        }
    }

    /// Whether `sources_for` adds the weather source
    pub fn with_weather(mut self, enabled: bool) -> Self {
        self.enable_weather = enabled;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Registered source names, in stable order
    pub fn registered(&self) -> Vec<SourceName> {
        self.sources.keys().copied().collect()
    }

    /// Sources worth asking for this concept, limited to registered ones
    pub fn sources_for(&self, concept: &PlaceConcept) -> Vec<SourceName> {
        let mut wanted: Vec<SourceName> = match concept.category {
            ConceptCategory::Eat => vec![SourceName::Yelp, SourceName::Google],
            ConceptCategory::Stay => vec![SourceName::Google, SourceName::Amadeus],
            ConceptCategory::Do => vec![SourceName::Amadeus, SourceName::Google],
            ConceptCategory::Transport => vec![SourceName::Amadeus],
        };
        if self.enable_weather {
            wanted.push(SourceName::Weather);
        }

        wanted.retain(|name| self.sources.contains_key(name));
        wanted
    }

    /// Query `requested` sources concurrently.
    ///
    /// Every requested source gets an entry in the result, successful or not.
    /// Fails when no place source succeeded; weather alone is not a result.
    pub async fn resolve(
        &self,
        concept: &PlaceConcept,
        requested: &[SourceName],
    ) -> Result<RawApiResults, PipelineError> {
        let requested: BTreeSet<SourceName> = requested.iter().copied().collect();
        if requested.iter().all(|name| *name == SourceName::Weather) {
            return Err(PipelineError::Config("no place sources requested".to_string()));
        }

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline;

        let calls = requested.iter().map(|&name| async move {
            let outcome = match timeout_at(deadline, self.resolve_one(name, concept)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SourceFailure::Timeout {
                    provider: name,
                    after: self.deadline,
                }),
            };
            (name, outcome)
        });

        let mut raw = RawApiResults::new(concept.clone());
        for (name, outcome) in join_all(calls).await {
            let outcome = match outcome {
                Ok((records, fresh_for)) => {
                    debug!(
                        source = %name,
                        records = records.len(),
                        fresh_for_secs = fresh_for.as_secs(),
                        "Source resolved"
                    );
                    raw.fresh_for.insert(name, fresh_for);
                    Ok(records)
                }
                Err(failure) => {
                    warn!(
                        source = %name,
                        code = failure.code(),
                        retryable = failure.is_retryable(),
                        error = %failure,
                        "Source failed"
                    );
                    Err(failure)
                }
            };
            raw.by_source.insert(name, outcome);
        }

        debug!(
            sources = raw.by_source.len(),
            failed = raw.failures().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolution finished"
        );

        if raw.all_failed() {
            let failures = std::mem::take(&mut raw.by_source)
                .into_iter()
                .filter_map(|(name, outcome)| outcome.err().map(|e| (name, e)))
                .collect();
            return Err(PipelineError::AllSourcesFailed { failures });
        }

        Ok(raw)
    }

    /// Records plus how long they stay fresh
    async fn resolve_one(
        &self,
        name: SourceName,
        concept: &PlaceConcept,
    ) -> Result<(Vec<SourceRecord>, Duration), SourceFailure> {
        let Some(source) = self.sources.get(&name) else {
            return Err(ProviderError::not_configured(name).into());
        };

        let key = source.cache_key(concept);
        let rate_limiter = &self.rate_limiter;
        self.cache
            .cache_or_fetch_with_ttl(&key, source.cache_ttl(), move || async move {
                let _permit = rate_limiter.acquire(name).await?;
                let records = source.fetch(concept).await?;
                Ok::<_, SourceFailure>(records)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PlaceSource;
    use crate::types::{ConceptLocation, Coordinates};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use wayfind_common::ManualClock;

    struct Stub(SourceName);

    #[async_trait]
    impl PlaceSource for Stub {
        fn name(&self) -> SourceName {
            self.0
        }

        fn cache_key(&self, _concept: &PlaceConcept) -> String {
            format!("stub:{}", self.0)
        }

        fn cache_ttl(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn fetch(&self, _concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn service(names: &[SourceName]) -> ApiResolutionService {
        let sources: SourceRegistry = names
            .iter()
            .map(|&n| (n, Arc::new(Stub(n)) as Arc<dyn PlaceSource>))
            .collect::<BTreeMap<_, _>>();
        let cache = Arc::new(CacheManager::new(Arc::new(ManualClock::at_unix(1_700_000_000))));
        ApiResolutionService::new(sources, cache, Arc::new(RateLimiter::unlimited()), DEFAULT_DEADLINE)
    }

    fn concept(category: ConceptCategory) -> PlaceConcept {
        PlaceConcept::new(
            "anything",
            category,
            ConceptLocation::Coordinates(Coordinates::new(35.6595, 139.7005)),
        )
    }

    #[test]
    fn test_routing_by_category() {
        let service = service(&SourceName::ALL);

        assert_eq!(
            service.sources_for(&concept(ConceptCategory::Eat)),
            vec![SourceName::Yelp, SourceName::Google, SourceName::Weather]
        );
        assert_eq!(
            service.sources_for(&concept(ConceptCategory::Transport)),
            vec![SourceName::Amadeus, SourceName::Weather]
        );
    }

    #[test]
    fn test_routing_skips_unregistered_and_disabled_weather() {
        let service = service(&[SourceName::Google, SourceName::Weather]).with_weather(false);

        assert_eq!(service.sources_for(&concept(ConceptCategory::Stay)), vec![SourceName::Google]);
        assert!(service.sources_for(&concept(ConceptCategory::Transport)).is_empty());
    }

    #[tokio::test]
    async fn test_request_without_place_sources_is_config_error() {
        let service = service(&[SourceName::Google, SourceName::Weather]);

        let empty = service.resolve(&concept(ConceptCategory::Eat), &[]).await.unwrap_err();
        let weather_only = service
            .resolve(&concept(ConceptCategory::Eat), &[SourceName::Weather])
            .await
            .unwrap_err();

        assert!(matches!(empty, PipelineError::Config(_)));
        assert!(matches!(weather_only, PipelineError::Config(_)));
    }

    #[tokio::test]
    async fn test_weather_alone_is_not_a_result() {
        let service = service(&[SourceName::Weather]);

        let err = service
            .resolve(&concept(ConceptCategory::Eat), &[SourceName::Google, SourceName::Weather])
            .await
            .unwrap_err();

        let PipelineError::AllSourcesFailed { failures } = err else {
            panic!("expected AllSourcesFailed");
        };
        assert_eq!(failures.keys().copied().collect::<Vec<_>>(), vec![SourceName::Google]);
    }

    #[tokio::test]
    async fn test_fresh_for_reported_per_source() {
        let service = service(&[SourceName::Google]);

        let raw = service
            .resolve(&concept(ConceptCategory::Eat), &[SourceName::Google])
            .await
            .unwrap();

        // No cache tiers: everything is fetched live with the full TTL
        assert_eq!(raw.fresh_for[&SourceName::Google], Duration::from_secs(60));
        assert_eq!(raw.min_fresh_for(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_unregistered_source_recorded_not_fatal() {
        let service = service(&[SourceName::Google]);

        let raw = service
            .resolve(&concept(ConceptCategory::Eat), &[SourceName::Google, SourceName::Yelp])
            .await
            .unwrap();

        assert!(raw.by_source[&SourceName::Google].is_ok());
        let failure = raw.by_source[&SourceName::Yelp].as_ref().unwrap_err();
        assert_eq!(failure.code(), "not_configured");
        assert!(!failure.is_retryable());
    }
}
