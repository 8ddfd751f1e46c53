//! Core types for the place consolidation pipeline
//!
//! - **Input:** `PlaceConcept` (search intent)
//! - **Per-provider records:** one struct per upstream provider, wrapped in `SourceRecord`
//! - **Matching:** `MatchGroup` (records believed to be the same real place)
//! - **Output:** `ConsolidatedPlace` (merged canonical record with provenance)

use crate::error::SourceFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use wayfind_common::hash;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ============================================================================
// Geography
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_meters(&self, other: &Coordinates) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// `lat:lng` rounded to `decimals` places, for cache keys
    pub fn key_fragment(&self, decimals: usize) -> String {
        format!("{:.*}:{:.*}", decimals, self.lat, decimals, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Category of the search intent, as produced by the concept extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConceptCategory {
    #[serde(alias = "stay")]
    Stay,
    #[serde(alias = "eat")]
    Eat,
    #[serde(alias = "do")]
    Do,
    #[serde(alias = "transport")]
    Transport,
}

impl ConceptCategory {
    /// Default unified category for results of this intent
    pub fn place_category(&self) -> PlaceCategory {
        match self {
            ConceptCategory::Stay => PlaceCategory::Hotel,
            ConceptCategory::Eat => PlaceCategory::Restaurant,
            ConceptCategory::Do => PlaceCategory::Activity,
            ConceptCategory::Transport => PlaceCategory::Transport,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptCategory::Stay => "Stay",
            ConceptCategory::Eat => "Eat",
            ConceptCategory::Do => "Do",
            ConceptCategory::Transport => "Transport",
        }
    }
}

impl FromStr for ConceptCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stay" => Ok(ConceptCategory::Stay),
            "eat" => Ok(ConceptCategory::Eat),
            "do" => Ok(ConceptCategory::Do),
            "transport" => Ok(ConceptCategory::Transport),
            other => Err(format!(
                "unknown category '{}' (expected Stay, Eat, Do or Transport)",
                other
            )),
        }
    }
}

/// Unified place taxonomy shared by every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceCategory {
    Restaurant,
    Hotel,
    Attraction,
    Activity,
    Transport,
    Shopping,
    Nightlife,
    Cafe,
    Bar,
}

/// Coarse grouping used for category compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFamily {
    FoodAndDrink,
    Lodging,
    Sights,
    Transport,
    Shopping,
}

impl PlaceCategory {
    pub fn family(&self) -> CategoryFamily {
        match self {
            PlaceCategory::Restaurant
            | PlaceCategory::Cafe
            | PlaceCategory::Bar
            | PlaceCategory::Nightlife => CategoryFamily::FoodAndDrink,
            PlaceCategory::Hotel => CategoryFamily::Lodging,
            PlaceCategory::Attraction | PlaceCategory::Activity => CategoryFamily::Sights,
            PlaceCategory::Transport => CategoryFamily::Transport,
            PlaceCategory::Shopping => CategoryFamily::Shopping,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Hotel => "hotel",
            PlaceCategory::Attraction => "attraction",
            PlaceCategory::Activity => "activity",
            PlaceCategory::Transport => "transport",
            PlaceCategory::Shopping => "shopping",
            PlaceCategory::Nightlife => "nightlife",
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Bar => "bar",
        }
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Place Concept
// ============================================================================

/// Where the concept is anchored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptLocation {
    Coordinates(Coordinates),
    Text(String),
}

impl ConceptLocation {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            ConceptLocation::Coordinates(c) => Some(*c),
            ConceptLocation::Text(_) => None,
        }
    }

    /// Normalized location for cache keys
    pub fn key_fragment(&self, decimals: usize) -> String {
        match self {
            ConceptLocation::Coordinates(c) => c.key_fragment(decimals),
            ConceptLocation::Text(text) => text.trim().to_lowercase(),
        }
    }
}

/// Normalized search intent driving one pipeline call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceConcept {
    pub query: String,
    pub category: ConceptCategory,
    pub location: ConceptLocation,
    #[serde(default)]
    pub radius_meters: Option<u32>,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
}

impl PlaceConcept {
    pub fn new(query: impl Into<String>, category: ConceptCategory, location: ConceptLocation) -> Self {
        Self {
            query: query.into(),
            category,
            location,
            radius_meters: None,
            constraints: BTreeMap::new(),
        }
    }

    pub fn with_radius(mut self, meters: u32) -> Self {
        self.radius_meters = Some(meters);
        self
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.coordinates()
    }

    pub fn radius_or(&self, default_meters: u32) -> u32 {
        self.radius_meters.unwrap_or(default_meters)
    }

    /// Stable hash of the concept (query case-folded, coordinates at 4 decimals)
    pub fn signature(&self) -> String {
        let mut parts = vec![
            self.query.trim().to_lowercase(),
            self.category.as_str().to_string(),
            self.location.key_fragment(4),
            self.radius_meters.map(|r| r.to_string()).unwrap_or_default(),
        ];
        parts.extend(self.constraints.iter().map(|(k, v)| format!("{}={}", k, v)));
        hash::signature(parts)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Upstream provider. Declaration order is the stable map order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    Google,
    Yelp,
    Amadeus,
    Weather,
}

impl SourceName {
    pub const ALL: [SourceName; 4] = [
        SourceName::Google,
        SourceName::Yelp,
        SourceName::Amadeus,
        SourceName::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Google => "google",
            SourceName::Yelp => "yelp",
            SourceName::Amadeus => "amadeus",
            SourceName::Weather => "weather",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown source '{}'", s))
    }
}

/// Price as quoted by an inventory provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GooglePlaceData {
    pub place_id: String,
    pub name: String,
    pub formatted_address: Option<String>,
    pub location: Option<Coordinates>,
    /// Raw Google place types
    pub types: Vec<String>,
    pub categories: Vec<PlaceCategory>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    /// Google scale 0-4
    pub price_level: Option<u8>,
    pub open_now: Option<bool>,
    pub photo_refs: Vec<String>,
    pub business_status: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YelpCategory {
    pub alias: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YelpBusinessData {
    pub business_id: String,
    pub alias: String,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub yelp_categories: Vec<YelpCategory>,
    pub categories: Vec<PlaceCategory>,
    pub rating: Option<f64>,
    pub review_count: u32,
    /// "$" to "$$$$"
    pub price: Option<String>,
    pub phone: Option<String>,
    pub display_address: Vec<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub is_closed: bool,
    pub distance_meters: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmadeusKind {
    Hotel,
    Activity,
    Airport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmadeusData {
    pub kind: AmadeusKind,
    pub amadeus_id: String,
    pub name: String,
    pub location: Option<Coordinates>,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub price: Option<Price>,
    pub booking_url: Option<String>,
    pub description: Option<String>,
    pub iata_code: Option<String>,
    /// Bookable right now, when the provider says so
    pub available: Option<bool>,
    pub pictures: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// `YYYY-MM-DD`
    pub date: String,
    pub temp_high_c: f64,
    pub temp_low_c: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location_label: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity: u8,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    pub forecast: Vec<DailyForecast>,
    pub fetched_at: DateTime<Utc>,
}

/// Capability interface shared by every place-bearing record
pub trait PlaceRecord {
    fn source(&self) -> SourceName;
    fn source_id(&self) -> &str;
    fn name(&self) -> &str;
    fn coordinates(&self) -> Option<Coordinates>;
    fn categories(&self) -> Vec<PlaceCategory>;
    fn fetched_at(&self) -> DateTime<Utc>;

    fn rating(&self) -> Option<f64> {
        None
    }
    fn review_count(&self) -> Option<u32> {
        None
    }
    /// Normalized price tier 1-4
    fn price_level(&self) -> Option<u8> {
        None
    }
    fn phone(&self) -> Option<&str> {
        None
    }
    fn address(&self) -> Option<String> {
        None
    }
    fn photos(&self) -> Vec<String> {
        Vec::new()
    }
    fn url(&self) -> Option<&str> {
        None
    }
    fn open_now(&self) -> Option<bool> {
        None
    }
}

impl PlaceRecord for GooglePlaceData {
    fn source(&self) -> SourceName {
        SourceName::Google
    }
    fn source_id(&self) -> &str {
        &self.place_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn coordinates(&self) -> Option<Coordinates> {
        self.location
    }
    fn categories(&self) -> Vec<PlaceCategory> {
        self.categories.clone()
    }
    fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
    fn review_count(&self) -> Option<u32> {
        self.user_ratings_total
    }
    fn price_level(&self) -> Option<u8> {
        // Google 0 ("free") still reads as the cheapest tier
        self.price_level.map(|p| p.clamp(1, 4))
    }
    fn address(&self) -> Option<String> {
        self.formatted_address.clone()
    }
    fn photos(&self) -> Vec<String> {
        self.photo_refs.clone()
    }
    fn open_now(&self) -> Option<bool> {
        self.open_now
    }
}

impl PlaceRecord for YelpBusinessData {
    fn source(&self) -> SourceName {
        SourceName::Yelp
    }
    fn source_id(&self) -> &str {
        &self.business_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
    fn categories(&self) -> Vec<PlaceCategory> {
        self.categories.clone()
    }
    fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
    fn review_count(&self) -> Option<u32> {
        Some(self.review_count)
    }
    fn price_level(&self) -> Option<u8> {
        self.price
            .as_deref()
            .map(|p| p.chars().filter(|c| *c == '$').count())
            .filter(|n| (1..=4).contains(n))
            .map(|n| n as u8)
    }
    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
    fn address(&self) -> Option<String> {
        if self.display_address.is_empty() {
            None
        } else {
            Some(self.display_address.join(", "))
        }
    }
    fn photos(&self) -> Vec<String> {
        self.image_url.iter().cloned().collect()
    }
    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    fn open_now(&self) -> Option<bool> {
        // Yelp search only reports permanent closure
        if self.is_closed {
            Some(false)
        } else {
            None
        }
    }
}

impl PlaceRecord for AmadeusData {
    fn source(&self) -> SourceName {
        SourceName::Amadeus
    }
    fn source_id(&self) -> &str {
        &self.amadeus_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn coordinates(&self) -> Option<Coordinates> {
        self.location
    }
    fn categories(&self) -> Vec<PlaceCategory> {
        vec![match self.kind {
            AmadeusKind::Hotel => PlaceCategory::Hotel,
            AmadeusKind::Activity => PlaceCategory::Activity,
            AmadeusKind::Airport => PlaceCategory::Transport,
        }]
    }
    fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
    fn address(&self) -> Option<String> {
        self.address.clone()
    }
    fn photos(&self) -> Vec<String> {
        self.pictures.clone()
    }
    fn url(&self) -> Option<&str> {
        self.booking_url.as_deref()
    }
}

/// One normalized provider result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "lowercase")]
pub enum SourceRecord {
    Google(GooglePlaceData),
    Yelp(YelpBusinessData),
    Amadeus(AmadeusData),
    Weather(WeatherData),
}

impl SourceRecord {
    pub fn source(&self) -> SourceName {
        match self {
            SourceRecord::Google(_) => SourceName::Google,
            SourceRecord::Yelp(_) => SourceName::Yelp,
            SourceRecord::Amadeus(_) => SourceName::Amadeus,
            SourceRecord::Weather(_) => SourceName::Weather,
        }
    }

    /// Place view of the record; `None` for enrichment-only records
    pub fn as_place(&self) -> Option<&dyn PlaceRecord> {
        match self {
            SourceRecord::Google(d) => Some(d),
            SourceRecord::Yelp(d) => Some(d),
            SourceRecord::Amadeus(d) => Some(d),
            SourceRecord::Weather(_) => None,
        }
    }

    pub fn as_weather(&self) -> Option<&WeatherData> {
        match self {
            SourceRecord::Weather(w) => Some(w),
            _ => None,
        }
    }

    /// `source:id` identity used in signatures
    pub fn identity(&self) -> String {
        match self.as_place() {
            Some(place) => format!("{}:{}", self.source(), place.source_id()),
            None => format!("{}:-", self.source()),
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            SourceRecord::Google(d) => d.fetched_at,
            SourceRecord::Yelp(d) => d.fetched_at,
            SourceRecord::Amadeus(d) => d.fetched_at,
            SourceRecord::Weather(w) => w.fetched_at,
        }
    }

    /// SHA-256 of the serialized record
    pub fn content_digest(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => hash::sha256_hex(&json),
            Err(_) => format!("{}@{}", self.identity(), self.fetched_at().timestamp_millis()),
        }
    }
}

// ============================================================================
// Resolution output
// ============================================================================

pub type SourceOutcome = Result<Vec<SourceRecord>, SourceFailure>;

/// Everything the resolution step gathered for one concept
#[derive(Debug, Clone)]
pub struct RawApiResults {
    pub concept: PlaceConcept,
    pub by_source: BTreeMap<SourceName, SourceOutcome>,
    /// Time left before each successful source's records go stale
    pub fresh_for: BTreeMap<SourceName, Duration>,
}

impl RawApiResults {
    pub fn new(concept: PlaceConcept) -> Self {
        Self {
            concept,
            by_source: BTreeMap::new(),
            fresh_for: BTreeMap::new(),
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (SourceName, &[SourceRecord])> {
        self.by_source
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().ok().map(|r| (*name, r.as_slice())))
    }

    pub fn failures(&self) -> impl Iterator<Item = (SourceName, &SourceFailure)> {
        self.by_source
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (*name, e)))
    }

    /// All successful records in stable source order
    pub fn records(&self) -> impl Iterator<Item = &SourceRecord> {
        self.succeeded().flat_map(|(_, records)| records.iter())
    }

    pub fn weather(&self) -> Option<&WeatherData> {
        self.records().find_map(SourceRecord::as_weather)
    }

    /// No source produced place records; weather alone does not count
    pub fn all_failed(&self) -> bool {
        self.by_source
            .iter()
            .filter(|(name, _)| **name != SourceName::Weather)
            .all(|(_, outcome)| outcome.is_err())
    }

    /// Shortest remaining freshness among the successful sources
    pub fn min_fresh_for(&self) -> Option<Duration> {
        self.succeeded()
            .filter_map(|(name, _)| self.fresh_for.get(&name).copied())
            .min()
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Records believed to denote one real-world place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGroup {
    /// Ordered by (source, source id)
    pub members: Vec<SourceRecord>,
    /// Match confidence in [0, 1]
    pub confidence: f64,
}

impl MatchGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn places(&self) -> impl Iterator<Item = &dyn PlaceRecord> {
        self.members.iter().filter_map(SourceRecord::as_place)
    }

    /// Distinct contributing sources, in stable order
    pub fn sources(&self) -> Vec<SourceName> {
        let mut sources: Vec<SourceName> = self.members.iter().map(SourceRecord::source).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    pub fn member(&self, source: SourceName) -> Option<&dyn PlaceRecord> {
        self.places().find(|p| p.source() == source)
    }

    /// Stable hash of the member identities
    pub fn signature(&self) -> String {
        let mut ids: Vec<String> = self.members.iter().map(SourceRecord::identity).collect();
        ids.sort();
        hash::signature(ids)
    }

    /// Hash of the member identities and their full contents; changes when a
    /// provider returns new data under the same ids
    pub fn content_signature(&self) -> String {
        let mut parts: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{}={}", m.identity(), m.content_digest()))
            .collect();
        parts.sort();
        hash::signature(parts)
    }
}

// ============================================================================
// Consolidated output
// ============================================================================

/// Consolidated field whose winning source is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Location,
    Address,
    Category,
    Rating,
    ReviewCount,
    PriceLevel,
    Phone,
    Photos,
    Website,
    OpenNow,
    BookingPrice,
    Availability,
    Description,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingInfo {
    /// Normalized 1-4
    pub price_level: Option<u8>,
    /// "$" to "$$$$"
    pub display: Option<String>,
    pub booking_price: Option<Price>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Populated tracked fields, 0-10
    pub completeness: u8,
    pub source_count: u8,
    /// 0-100
    pub overall: u8,
}

/// Merged canonical place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedPlace {
    /// Stable across runs for the same cluster
    pub id: String,
    pub name: String,
    pub location: Option<Coordinates>,
    pub category: PlaceCategory,
    pub address: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub provenance: BTreeMap<Field, SourceName>,
    pub confidence: f64,
    pub source_ids: BTreeMap<SourceName, String>,
    pub aggregated_rating: Option<f64>,
    pub total_review_count: u32,
    pub pricing: PricingInfo,
    pub data_quality: DataQuality,
    pub weather: Option<WeatherData>,
    pub last_updated: DateTime<Utc>,
}
