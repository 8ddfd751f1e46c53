//! Source clients
//!
//! One adapter per upstream provider. Each builds its provider's request,
//! normalizes the response into its own record shape once, and classifies
//! failures as retryable or terminal. Clients never swallow errors; the
//! resolution service decides what a failure means for the run.

pub mod amadeus;
pub mod categories;
pub mod google;
mod http;
pub mod weather;
pub mod yelp;

pub use amadeus::AmadeusClient;
pub use google::GooglePlacesClient;
pub use weather::OpenWeatherClient;
pub use yelp::YelpClient;

use crate::config::PlacesConfig;
use crate::error::ProviderError;
use crate::types::{PlaceConcept, SourceName, SourceRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wayfind_common::Clock;

/// Default search radius when the concept does not give one
pub const DEFAULT_RADIUS_M: u32 = 1_500;

/// Upstream provider adapter
#[async_trait]
pub trait PlaceSource: Send + Sync {
    fn name(&self) -> SourceName;

    /// Deterministic cache key for this concept's request
    fn cache_key(&self, concept: &PlaceConcept) -> String;

    /// How long this provider's results stay fresh
    fn cache_ttl(&self) -> Duration;

    async fn fetch(&self, concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError>;
}

pub type SourceRegistry = BTreeMap<SourceName, Arc<dyn PlaceSource>>;

/// Build a client for every enabled provider that has credentials
pub fn build_sources(config: &PlacesConfig, clock: Arc<dyn Clock>) -> Result<SourceRegistry, ProviderError> {
    let mut sources: SourceRegistry = BTreeMap::new();

    for name in SourceName::ALL {
        if !config.is_usable(name) {
            info!(source = %name, "Source not configured, skipping");
            continue;
        }
        let provider = config.providers.get(name);
        let source: Arc<dyn PlaceSource> = match name {
            SourceName::Google => Arc::new(GooglePlacesClient::new(provider, clock.clone())?),
            SourceName::Yelp => Arc::new(YelpClient::new(provider, clock.clone())?),
            SourceName::Amadeus => Arc::new(AmadeusClient::new(provider, clock.clone())?),
            SourceName::Weather => Arc::new(OpenWeatherClient::new(provider, clock.clone())?),
        };
        sources.insert(name, source);
    }

    Ok(sources)
}
