//! wayfind-places library interface
//!
//! Multi-source place consolidation: concurrent provider resolution behind a
//! tiered cache and per-provider rate limits, entity matching across
//! providers, and field-level merging with provenance.

pub mod cache;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod rate_limiter;
pub mod resolution;
pub mod sources;
pub mod types;

pub use crate::cache::CacheManager;
pub use crate::config::PlacesConfig;
pub use crate::consolidation::ConsolidationService;
pub use crate::error::{PipelineError, ProviderError, SourceFailure};
pub use crate::matcher::EntityMatcher;
pub use crate::pipeline::ConsolidationPipeline;
pub use crate::rate_limiter::RateLimiter;
pub use crate::resolution::ApiResolutionService;
pub use crate::sources::PlaceSource;
pub use crate::types::{ConceptCategory, ConceptLocation, ConsolidatedPlace, PlaceConcept, SourceName};
