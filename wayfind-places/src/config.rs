//! Configuration resolution for wayfind-places
//!
//! Provides multi-tier configuration resolution with CLI → ENV → TOML → default
//! priority. CLI overrides are applied by the binary after `PlacesConfig::load`.

use crate::cache::CacheConfig;
use crate::consolidation::ConsolidationConfig;
use crate::matcher::MatcherConfig;
use crate::pipeline::PipelineConfig;
use crate::rate_limiter::RateLimitConfig;
use crate::types::SourceName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use wayfind_common::config::{self as common_config, LoggingConfig};
use wayfind_common::Result;

pub const APP_NAME: &str = "wayfind";

/// Per-provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// API key (Amadeus: client id)
    pub api_key: Option<String>,
    /// Amadeus client secret
    pub client_secret: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Cache TTL for this provider's search results
    pub ttl_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            client_secret: None,
            base_url: None,
            timeout_ms: None,
            ttl_secs: None,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(5_000))
    }

    pub fn ttl(&self, source: SourceName) -> Duration {
        Duration::from_secs(self.ttl_secs.unwrap_or_else(|| default_ttl_secs(source)))
    }

    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .filter(|u| common_config::is_valid_key(u))
            .unwrap_or(default)
    }
}

/// Place data changes slowly; inventory and weather less so
fn default_ttl_secs(source: SourceName) -> u64 {
    match source {
        SourceName::Google | SourceName::Yelp => 6 * 3600,
        SourceName::Amadeus => 3600,
        SourceName::Weather => 30 * 60,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google: ProviderConfig,
    pub yelp: ProviderConfig,
    pub amadeus: ProviderConfig,
    pub weather: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, source: SourceName) -> &ProviderConfig {
        match source {
            SourceName::Google => &self.google,
            SourceName::Yelp => &self.yelp,
            SourceName::Amadeus => &self.amadeus,
            SourceName::Weather => &self.weather,
        }
    }

    fn get_mut(&mut self, source: SourceName) -> &mut ProviderConfig {
        match source {
            SourceName::Google => &mut self.google,
            SourceName::Yelp => &mut self.yelp,
            SourceName::Amadeus => &mut self.amadeus,
            SourceName::Weather => &mut self.weather,
        }
    }
}

/// Complete configuration for the consolidation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    pub providers: ProvidersConfig,
    pub rate_limits: BTreeMap<SourceName, RateLimitConfig>,
    pub cache: CacheConfig,
    pub matching: MatcherConfig,
    pub consolidation: ConsolidationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            rate_limits: SourceName::ALL
                .into_iter()
                .map(|s| (s, RateLimitConfig::defaults_for(s)))
                .collect(),
            cache: CacheConfig::default(),
            matching: MatcherConfig::default(),
            consolidation: ConsolidationConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Environment variable holding each provider's primary credential
pub fn api_key_env_var(source: SourceName) -> &'static str {
    match source {
        SourceName::Google => "GOOGLE_PLACES_API_KEY",
        SourceName::Yelp => "YELP_API_KEY",
        SourceName::Amadeus => "AMADEUS_CLIENT_ID",
        SourceName::Weather => "OPENWEATHER_API_KEY",
    }
}

pub const AMADEUS_SECRET_ENV_VAR: &str = "AMADEUS_CLIENT_SECRET";
pub const REMOTE_CACHE_URL_ENV_VAR: &str = "WAYFIND_REDIS_REST_URL";
pub const REMOTE_CACHE_TOKEN_ENV_VAR: &str = "WAYFIND_REDIS_REST_TOKEN";
pub const CACHE_DB_ENV_VAR: &str = "WAYFIND_CACHE_DB";

fn rate_limit_env_var(source: SourceName) -> String {
    format!("WAYFIND_RATE_LIMIT_{}", source.as_str().to_ascii_uppercase())
}

impl PlacesConfig {
    /// Load TOML (if any) and apply environment overrides
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let path = common_config::resolve_config_path(cli_config_path, APP_NAME)?;
        let mut config: PlacesConfig = common_config::load_toml(path.as_deref())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment beats TOML for every overridable setting
    pub fn apply_env_overrides(&mut self) {
        for source in SourceName::ALL {
            let env_name = api_key_env_var(source);
            let provider = self.providers.get_mut(source);
            provider.api_key = resolve_key(
                source.as_str(),
                env_name,
                common_config::env_value(env_name),
                provider.api_key.take(),
            );

            if let Some(per_minute) = common_config::env_parse::<u32>(&rate_limit_env_var(source)) {
                let limit = self
                    .rate_limits
                    .entry(source)
                    .or_insert_with(|| RateLimitConfig::defaults_for(source));
                limit.per_minute = per_minute;
            }
        }

        let amadeus = &mut self.providers.amadeus;
        amadeus.client_secret = common_config::first_valid([
            common_config::env_value(AMADEUS_SECRET_ENV_VAR).as_deref(),
            amadeus.client_secret.as_deref(),
        ]);

        if let Some(url) = common_config::env_value(REMOTE_CACHE_URL_ENV_VAR) {
            self.cache.remote_url = Some(url);
        }
        if let Some(token) = common_config::env_value(REMOTE_CACHE_TOKEN_ENV_VAR) {
            self.cache.remote_token = Some(token);
        }
        if let Some(path) = common_config::env_value(CACHE_DB_ENV_VAR) {
            self.cache.database_path = Some(PathBuf::from(path));
        }
    }

    pub fn rate_limit(&self, source: SourceName) -> RateLimitConfig {
        self.rate_limits
            .get(&source)
            .cloned()
            .unwrap_or_else(|| RateLimitConfig::defaults_for(source))
    }

    /// Provider is enabled and has the credentials it needs
    pub fn is_usable(&self, source: SourceName) -> bool {
        let provider = self.providers.get(source);
        let has_key = provider
            .api_key
            .as_deref()
            .is_some_and(common_config::is_valid_key);
        let has_secret = source != SourceName::Amadeus
            || provider
                .client_secret
                .as_deref()
                .is_some_and(common_config::is_valid_key);
        provider.enabled && has_key && has_secret
    }

    /// Durable cache location: configured path or the platform data folder
    pub fn cache_database_path(&self) -> PathBuf {
        self.cache
            .database_path
            .clone()
            .unwrap_or_else(|| common_config::default_data_folder(APP_NAME).join("cache.db"))
    }
}

/// Pick ENV over TOML, warning when both are set
fn resolve_key(
    label: &str,
    env_name: &str,
    env_key: Option<String>,
    toml_key: Option<String>,
) -> Option<String> {
    let toml_key = toml_key.filter(|k| common_config::is_valid_key(k));

    match (env_key, toml_key) {
        (Some(env), Some(_)) => {
            warn!(
                "{} credential found in both {} and TOML. Using environment (higher priority).",
                label, env_name
            );
            Some(env)
        }
        (Some(env), None) => {
            info!("{} credential loaded from environment variable", label);
            Some(env)
        }
        (None, Some(toml)) => {
            info!("{} credential loaded from TOML config", label);
            Some(toml)
        }
        (None, None) => None,
    }
}
