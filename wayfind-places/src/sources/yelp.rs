//! Yelp Fusion business search client

use super::categories::{self, yelp_category_filter};
use super::http::{build_client, send_json};
use super::{PlaceSource, DEFAULT_RADIUS_M};
use crate::cache::keys;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{
    ConceptLocation, Coordinates, PlaceCategory, PlaceConcept, SourceName, SourceRecord, YelpBusinessData,
    YelpCategory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wayfind_common::Clock;

const YELP_BASE_URL: &str = "https://api.yelp.com/v3";
const SOURCE: SourceName = SourceName::Yelp;

/// Yelp rejects larger values
const MAX_RADIUS_M: u32 = 40_000;
const MAX_LIMIT: u32 = 50;
const DEFAULT_LIMIT: u32 = 20;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Deserialize)]
struct Business {
    id: String,
    #[serde(default)]
    alias: String,
    name: String,
    image_url: Option<String>,
    #[serde(default)]
    is_closed: bool,
    url: Option<String>,
    #[serde(default)]
    review_count: u32,
    #[serde(default)]
    categories: Vec<BusinessCategory>,
    rating: Option<f64>,
    coordinates: Option<BusinessCoordinates>,
    price: Option<String>,
    location: Option<BusinessLocation>,
    phone: Option<String>,
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BusinessCategory {
    alias: String,
    title: String,
}

/// Yelp sends `null` members for unmapped businesses
#[derive(Debug, Deserialize)]
struct BusinessCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BusinessLocation {
    #[serde(default)]
    display_address: Vec<String>,
}

pub struct YelpClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl YelpClient {
    pub fn new(config: &ProviderConfig, clock: Arc<dyn Clock>) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::not_configured(SOURCE))?;

        Ok(Self {
            http_client: build_client(SOURCE, config.timeout())?,
            api_key,
            base_url: config.base_url_or(YELP_BASE_URL).trim_end_matches('/').to_string(),
            ttl: config.ttl(SOURCE),
            clock,
        })
    }
}

fn search_radius(concept: &PlaceConcept) -> u32 {
    concept.radius_or(DEFAULT_RADIUS_M).min(MAX_RADIUS_M)
}

/// `limit` constraint, clamped to what the API accepts
fn search_limit(concept: &PlaceConcept) -> u32 {
    concept
        .constraints
        .get("limit")
        .and_then(|l| l.parse::<u32>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT)
}

fn search_params(concept: &PlaceConcept) -> Vec<(&'static str, String)> {
    let mut params = vec![("term", concept.query.clone())];

    match &concept.location {
        ConceptLocation::Coordinates(c) => {
            params.push(("latitude", c.lat.to_string()));
            params.push(("longitude", c.lng.to_string()));
        }
        ConceptLocation::Text(text) => params.push(("location", text.clone())),
    }

    params.push(("radius", search_radius(concept).to_string()));
    params.push(("limit", search_limit(concept).to_string()));
    params.push(("sort_by", "best_match".to_string()));

    if let Some(filter) = yelp_category_filter(concept.category) {
        params.push(("categories", filter.to_string()));
    }

    params
}

fn parse_search(
    body: SearchResponse,
    fallback: PlaceCategory,
    fetched_at: DateTime<Utc>,
) -> Vec<SourceRecord> {
    body.businesses
        .into_iter()
        .map(|b| {
            let categories = categories::map_all(
                b.categories.iter().map(|c| c.alias.as_str()),
                categories::from_yelp_alias,
                fallback,
            );
            let coordinates = b
                .coordinates
                .and_then(|c| Some(Coordinates::new(c.latitude?, c.longitude?)))
                .filter(Coordinates::is_valid);

            SourceRecord::Yelp(YelpBusinessData {
                business_id: b.id,
                alias: b.alias,
                name: b.name,
                coordinates,
                yelp_categories: b
                    .categories
                    .into_iter()
                    .map(|c| YelpCategory {
                        alias: c.alias,
                        title: c.title,
                    })
                    .collect(),
                categories,
                rating: b.rating,
                review_count: b.review_count,
                price: b.price.filter(|p| !p.is_empty()),
                phone: b.phone.filter(|p| !p.is_empty()),
                display_address: b.location.map(|l| l.display_address).unwrap_or_default(),
                url: b.url,
                image_url: b.image_url.filter(|u| !u.is_empty()),
                is_closed: b.is_closed,
                distance_meters: b.distance,
                fetched_at,
            })
        })
        .collect()
}

#[async_trait]
impl PlaceSource for YelpClient {
    fn name(&self) -> SourceName {
        SOURCE
    }

    fn cache_key(&self, concept: &PlaceConcept) -> String {
        keys::yelp_search_key(
            &concept.query,
            &concept.location,
            search_radius(concept),
            search_limit(concept),
            yelp_category_filter(concept.category),
        )
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
        debug!(source = %SOURCE, term = %concept.query, "Yelp business search");

        let request = self
            .http_client
            .get(format!("{}/businesses/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&search_params(concept));
        let body: SearchResponse = send_json(SOURCE, request).await?;

        Ok(parse_search(body, concept.category.place_category(), self.clock.now()))
    }
}
