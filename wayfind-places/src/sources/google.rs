//! Google Places text search client

use super::categories::{self, google_type_filter};
use super::http::{build_client, send_json};
use super::{PlaceSource, DEFAULT_RADIUS_M};
use crate::cache::keys;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{
    ConceptLocation, Coordinates, GooglePlaceData, PlaceCategory, PlaceConcept, SourceName, SourceRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wayfind_common::Clock;

const GOOGLE_PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const SOURCE: SourceName = SourceName::Google;

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    place_id: String,
    name: String,
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    types: Vec<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    price_level: Option<u8>,
    opening_hours: Option<OpeningHours>,
    #[serde(default)]
    photos: Vec<Photo>,
    business_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: String,
}

pub struct GooglePlacesClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl GooglePlacesClient {
    pub fn new(config: &ProviderConfig, clock: Arc<dyn Clock>) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::not_configured(SOURCE))?;

        Ok(Self {
            http_client: build_client(SOURCE, config.timeout())?,
            api_key,
            base_url: config.base_url_or(GOOGLE_PLACES_BASE_URL).trim_end_matches('/').to_string(),
            ttl: config.ttl(SOURCE),
            clock,
        })
    }
}

/// Free-text locations are folded into the query string
fn search_query(concept: &PlaceConcept) -> String {
    match &concept.location {
        ConceptLocation::Coordinates(_) => concept.query.clone(),
        ConceptLocation::Text(text) => format!("{} in {}", concept.query, text),
    }
}

/// Check the body-level status, then normalize each result
fn parse_text_search(
    body: TextSearchResponse,
    fallback: PlaceCategory,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<SourceRecord>, ProviderError> {
    let message = || body.error_message.clone().unwrap_or_else(|| body.status.clone());
    match body.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        "OVER_QUERY_LIMIT" => return Err(ProviderError::retryable(SOURCE, "rate_limited", message())),
        "UNKNOWN_ERROR" => return Err(ProviderError::retryable(SOURCE, "unknown_error", message())),
        "REQUEST_DENIED" => return Err(ProviderError::terminal(SOURCE, "invalid_credentials", message())),
        "INVALID_REQUEST" => return Err(ProviderError::terminal(SOURCE, "invalid_request", message())),
        other => return Err(ProviderError::terminal(SOURCE, other.to_ascii_lowercase(), message())),
    }

    let records = body
        .results
        .into_iter()
        .map(|r| {
            let categories = categories::map_all(
                r.types.iter().map(String::as_str),
                categories::from_google_type,
                fallback,
            );
            SourceRecord::Google(GooglePlaceData {
                place_id: r.place_id,
                name: r.name,
                formatted_address: r.formatted_address,
                location: r
                    .geometry
                    .map(|g| Coordinates::new(g.location.lat, g.location.lng))
                    .filter(Coordinates::is_valid),
                types: r.types,
                categories,
                rating: r.rating,
                user_ratings_total: r.user_ratings_total,
                price_level: r.price_level,
                open_now: r.opening_hours.and_then(|h| h.open_now),
                photo_refs: r.photos.into_iter().map(|p| p.photo_reference).collect(),
                business_status: r.business_status,
                fetched_at,
            })
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl PlaceSource for GooglePlacesClient {
    fn name(&self) -> SourceName {
        SOURCE
    }

    fn cache_key(&self, concept: &PlaceConcept) -> String {
        keys::google_search_key(
            &concept.query,
            &concept.location,
            concept.radius_or(DEFAULT_RADIUS_M),
            google_type_filter(concept.category),
        )
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
        let mut params: Vec<(&str, String)> = vec![
            ("query", search_query(concept)),
            ("key", self.api_key.clone()),
        ];
        if let Some(c) = concept.coordinates() {
            params.push(("location", format!("{},{}", c.lat, c.lng)));
            params.push(("radius", concept.radius_or(DEFAULT_RADIUS_M).to_string()));
        }
        if let Some(place_type) = google_type_filter(concept.category) {
            params.push(("type", place_type.to_string()));
        }

        debug!(source = %SOURCE, query = %concept.query, "Google text search");

        let request = self
            .http_client
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&params);
        let body: TextSearchResponse = send_json(SOURCE, request).await?;

        parse_text_search(body, concept.category.place_category(), self.clock.now())
    }
}
