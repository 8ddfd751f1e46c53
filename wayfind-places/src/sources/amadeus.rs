//! Amadeus travel inventory client
//!
//! Uses the OAuth2 client-credentials flow. The access token is cached in
//! process and refreshed shortly before it expires, or immediately after the
//! API rejects it.
//!
//! Concept routing:
//! - Stay → hotels by geocode
//! - Eat / Do → tours & activities
//! - Transport → nearby airports

use super::http::{build_client, lenient_f64, send_json};
use super::{PlaceSource, DEFAULT_RADIUS_M};
use crate::cache::keys;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{AmadeusData, AmadeusKind, ConceptCategory, Coordinates, PlaceConcept, Price, SourceName, SourceRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use wayfind_common::time::to_chrono;
use wayfind_common::Clock;

const AMADEUS_BASE_URL: &str = "https://test.api.amadeus.com";
const SOURCE: SourceName = SourceName::Amadeus;

/// Refresh this long before the advertised expiry
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GeoCode {
    latitude: f64,
    longitude: f64,
}

impl GeoCode {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude, self.longitude)).filter(Coordinates::is_valid)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotelEntry {
    hotel_id: String,
    name: String,
    geo_code: Option<GeoCode>,
    address: Option<HotelAddress>,
    iata_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotelAddress {
    #[serde(default)]
    lines: Vec<String>,
    city_name: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityEntry {
    id: String,
    name: String,
    short_description: Option<String>,
    geo_code: Option<GeoCode>,
    #[serde(default)]
    rating: serde_json::Value,
    #[serde(default)]
    pictures: Vec<String>,
    booking_link: Option<String>,
    price: Option<ActivityPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPrice {
    #[serde(default)]
    amount: serde_json::Value,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirportEntry {
    #[serde(default)]
    id: Option<String>,
    name: String,
    detailed_name: Option<String>,
    iata_code: Option<String>,
    geo_code: Option<GeoCode>,
    address: Option<AirportAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirportAddress {
    city_name: Option<String>,
    country_name: Option<String>,
}

pub struct AmadeusClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    pub fn new(config: &ProviderConfig, clock: Arc<dyn Clock>) -> Result<Self, ProviderError> {
        let (Some(client_id), Some(client_secret)) = (config.api_key.clone(), config.client_secret.clone()) else {
            return Err(ProviderError::not_configured(SOURCE));
        };

        Ok(Self {
            http_client: build_client(SOURCE, config.timeout())?,
            client_id,
            client_secret,
            base_url: config.base_url_or(AMADEUS_BASE_URL).trim_end_matches('/').to_string(),
            ttl: config.ttl(SOURCE),
            clock,
            token: Mutex::new(None),
        })
    }

    /// Cached token, or a fresh one from the token endpoint
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut token = self.token.lock().await;
        let now = self.clock.now();

        if let Some(cached) = token.as_ref() {
            if now + to_chrono(TOKEN_REFRESH_MARGIN) < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        debug!(source = %SOURCE, "Requesting access token");
        let request = self
            .http_client
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ]);
        let response: TokenResponse = send_json(SOURCE, request).await?;

        let fresh = AccessToken {
            value: response.access_token,
            expires_at: now + to_chrono(Duration::from_secs(response.expires_in)),
        };
        let value = fresh.value.clone();
        *token = Some(fresh);
        Ok(value)
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let token = self.access_token().await?;
        let request = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(params);

        match send_json::<DataResponse<T>>(SOURCE, request).await {
            Ok(body) => Ok(body.data),
            Err(e) => {
                if e.code == "invalid_credentials" {
                    // Revoked or expired early; next call re-authenticates
                    *self.token.lock().await = None;
                }
                Err(e)
            }
        }
    }
}

fn kind_for(category: ConceptCategory) -> AmadeusKind {
    match category {
        ConceptCategory::Stay => AmadeusKind::Hotel,
        ConceptCategory::Eat | ConceptCategory::Do => AmadeusKind::Activity,
        ConceptCategory::Transport => AmadeusKind::Airport,
    }
}

/// Search radius in whole kilometres, within each endpoint's accepted range
fn radius_km(kind: AmadeusKind, radius_meters: u32) -> u32 {
    let km = radius_meters.div_ceil(1000).max(1);
    match kind {
        AmadeusKind::Hotel => km.min(300),
        AmadeusKind::Activity => km.min(20),
        AmadeusKind::Airport => km.min(500),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn hotel_record(entry: HotelEntry, fetched_at: DateTime<Utc>) -> SourceRecord {
    let address = entry.address.and_then(|a| {
        let mut parts = a.lines;
        parts.extend(a.city_name);
        parts.extend(a.country_code);
        non_empty(Some(parts.join(", ")))
    });

    SourceRecord::Amadeus(AmadeusData {
        kind: AmadeusKind::Hotel,
        amadeus_id: entry.hotel_id,
        name: entry.name,
        location: entry.geo_code.as_ref().and_then(GeoCode::coordinates),
        address,
        rating: None,
        price: None,
        booking_url: None,
        description: None,
        iata_code: entry.iata_code,
        available: None,
        pictures: Vec::new(),
        fetched_at,
    })
}

fn activity_record(entry: ActivityEntry, fetched_at: DateTime<Utc>) -> SourceRecord {
    let price = entry.price.and_then(|p| {
        Some(Price {
            amount: lenient_f64(&p.amount)?,
            currency: p.currency_code?,
        })
    });
    let available = price.as_ref().map(|_| true);

    SourceRecord::Amadeus(AmadeusData {
        kind: AmadeusKind::Activity,
        amadeus_id: entry.id,
        name: entry.name,
        location: entry.geo_code.as_ref().and_then(GeoCode::coordinates),
        address: None,
        rating: lenient_f64(&entry.rating).filter(|r| (0.0..=5.0).contains(r)),
        price,
        booking_url: non_empty(entry.booking_link),
        description: non_empty(entry.short_description),
        iata_code: None,
        available,
        pictures: entry.pictures,
        fetched_at,
    })
}

fn airport_record(entry: AirportEntry, fetched_at: DateTime<Utc>) -> SourceRecord {
    let address = entry.address.and_then(|a| {
        let parts: Vec<String> = a.city_name.into_iter().chain(a.country_name).collect();
        non_empty(Some(parts.join(", ")))
    });
    let amadeus_id = entry
        .id
        .or_else(|| entry.iata_code.clone())
        .unwrap_or_else(|| entry.name.clone());

    SourceRecord::Amadeus(AmadeusData {
        kind: AmadeusKind::Airport,
        amadeus_id,
        name: entry.detailed_name.unwrap_or(entry.name),
        location: entry.geo_code.as_ref().and_then(GeoCode::coordinates),
        address,
        rating: None,
        price: None,
        booking_url: None,
        description: None,
        iata_code: entry.iata_code,
        available: None,
        pictures: Vec::new(),
        fetched_at,
    })
}

#[async_trait]
impl PlaceSource for AmadeusClient {
    fn name(&self) -> SourceName {
        SOURCE
    }

    fn cache_key(&self, concept: &PlaceConcept) -> String {
        let kind = kind_for(concept.category);
        keys::amadeus_search_key(kind, &concept.location, radius_km(kind, concept.radius_or(DEFAULT_RADIUS_M)))
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
        let coordinates = concept
            .coordinates()
            .ok_or_else(|| ProviderError::missing_coordinates(SOURCE))?;
        let kind = kind_for(concept.category);
        let radius = radius_km(kind, concept.radius_or(DEFAULT_RADIUS_M));

        let params = vec![
            ("latitude", coordinates.lat.to_string()),
            ("longitude", coordinates.lng.to_string()),
            ("radius", radius.to_string()),
        ];

        debug!(source = %SOURCE, kind = ?kind, radius_km = radius, "Amadeus inventory search");

        let fetched_at = self.clock.now();
        let records = match kind {
            AmadeusKind::Hotel => {
                let mut params = params;
                params.push(("radiusUnit", "KM".to_string()));
                self.get_data::<HotelEntry>("/v1/reference-data/locations/hotels/by-geocode", &params)
                    .await?
                    .into_iter()
                    .map(|e| hotel_record(e, fetched_at))
                    .collect()
            }
            AmadeusKind::Activity => self
                .get_data::<ActivityEntry>("/v1/shopping/activities", &params)
                .await?
                .into_iter()
                .map(|e| activity_record(e, fetched_at))
                .collect(),
            AmadeusKind::Airport => self
                .get_data::<AirportEntry>("/v1/reference-data/locations/airports", &params)
                .await?
                .into_iter()
                .map(|e| airport_record(e, fetched_at))
                .collect(),
        };

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConceptLocation, PlaceCategory, PlaceRecord};
    use wayfind_common::ManualClock;

    fn fetched() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn configured() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("client".into()),
            client_secret: Some("secret".into()),
            base_url: Some("http://127.0.0.1:9".into()),
            timeout_ms: Some(500),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_activity_with_string_numbers() {
        let body: DataResponse<ActivityEntry> = serde_json::from_str(
            r#"{"data": [{
                "id": "23642",
                "type": "activity",
                "name": "Tsukiji Food Tour",
                "shortDescription": "Taste your way through the outer market",
                "geoCode": {"latitude": 35.6655, "longitude": 139.7707},
                "rating": "4.7",
                "pictures": ["https://img.example/tsukiji.jpg"],
                "bookingLink": "https://book.example/23642",
                "price": {"currencyCode": "JPY", "amount": "12000.00"}
            }]}"#,
        )
        .unwrap();

        let record = activity_record(body.data.into_iter().next().unwrap(), fetched());

        let SourceRecord::Amadeus(data) = &record else {
            panic!("expected amadeus record");
        };
        assert_eq!(data.rating, Some(4.7));
        assert_eq!(
            data.price,
            Some(Price {
                amount: 12000.0,
                currency: "JPY".into()
            })
        );
        assert_eq!(data.available, Some(true));
        assert_eq!(record.as_place().unwrap().categories(), vec![PlaceCategory::Activity]);
        assert_eq!(record.as_place().unwrap().url(), Some("https://book.example/23642"));
    }

    #[test]
    fn test_hotel_and_airport_records() {
        let hotels: DataResponse<HotelEntry> = serde_json::from_str(
            r#"{"data": [{
                "hotelId": "HLTYOCER",
                "name": "CERULEAN TOWER TOKYU HOTEL",
                "geoCode": {"latitude": 35.65621, "longitude": 139.69966},
                "address": {"countryCode": "JP"},
                "iataCode": "TYO"
            }]}"#,
        )
        .unwrap();
        let hotel = hotel_record(hotels.data.into_iter().next().unwrap(), fetched());
        assert_eq!(hotel.identity(), "amadeus:HLTYOCER");
        assert_eq!(hotel.as_place().unwrap().address().as_deref(), Some("JP"));

        let airports: DataResponse<AirportEntry> = serde_json::from_str(
            r#"{"data": [{
                "id": "AHND",
                "name": "HANEDA AIRPORT",
                "detailedName": "TOKYO/JP:HANEDA AIRPORT",
                "iataCode": "HND",
                "geoCode": {"latitude": 35.55222, "longitude": 139.77944},
                "address": {"cityName": "TOKYO", "countryName": "JAPAN"}
            }]}"#,
        )
        .unwrap();
        let airport = airport_record(airports.data.into_iter().next().unwrap(), fetched());
        let SourceRecord::Amadeus(data) = &airport else {
            panic!("expected amadeus record");
        };
        assert_eq!(data.iata_code.as_deref(), Some("HND"));
        assert_eq!(data.address.as_deref(), Some("TOKYO, JAPAN"));
    }

    #[test]
    fn test_missing_data_is_empty() {
        let body: DataResponse<HotelEntry> = serde_json::from_str(r#"{"meta": {"count": 0}}"#).unwrap();
        assert!(body.data.is_empty());
    }

    #[test]
    fn test_radius_clamped_per_endpoint() {
        assert_eq!(radius_km(AmadeusKind::Activity, 1_500), 2);
        assert_eq!(radius_km(AmadeusKind::Activity, 90_000), 20);
        assert_eq!(radius_km(AmadeusKind::Hotel, 100), 1);
        assert_eq!(radius_km(AmadeusKind::Airport, 100_000), 100);
    }

    #[test]
    fn test_requires_secret() {
        let mut config = configured();
        config.client_secret = None;
        let err = AmadeusClient::new(&config, Arc::new(ManualClock::at_unix(0))).err().unwrap();
        assert_eq!(err.code, "not_configured");
    }

    #[tokio::test]
    async fn test_text_location_fails_before_any_request() {
        let client = AmadeusClient::new(&configured(), Arc::new(ManualClock::at_unix(0))).unwrap();
        let concept = PlaceConcept::new("hotel", ConceptCategory::Stay, ConceptLocation::Text("Shibuya".into()));

        let err = client.fetch(&concept).await.unwrap_err();

        assert_eq!(err.code, "missing_coordinates");
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_cached_token_reused_until_margin() {
        let clock = Arc::new(ManualClock::at_unix(1_000));
        let client = AmadeusClient::new(&configured(), clock.clone()).unwrap();
        *client.token.lock().await = Some(AccessToken {
            value: "cached".into(),
            expires_at: clock.now() + chrono::Duration::seconds(1_799),
        });

        assert_eq!(client.access_token().await.unwrap(), "cached");

        // Inside the refresh margin the endpoint (unreachable here) is hit
        clock.advance(Duration::from_secs(1_750));
        let err = client.access_token().await.unwrap_err();
        assert!(err.retryable);
    }
}
