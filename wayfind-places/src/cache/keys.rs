//! Cache key generators
//!
//! Keys are deterministic functions of provider name plus normalized request
//! parameters (per-source results), or concept signature plus cluster signature
//! (consolidated results).

use crate::types::{AmadeusKind, ConceptLocation};
use unicode_normalization::UnicodeNormalization;

pub const GOOGLE_PLACE: &str = "place:google";
pub const YELP_BUSINESS: &str = "place:yelp";
pub const AMADEUS_DATA: &str = "place:amadeus";
pub const CONSOLIDATED: &str = "place:consolidated";
pub const WEATHER: &str = "weather";

/// NFKC, lowercase, and collapse every non-alphanumeric char to `_`
///
/// Letters and digits of any script are kept, so "寿司" and "蕎麦" stay apart.
pub fn normalize(s: &str) -> String {
    s.trim()
        .nfkc()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn location_part(location: &ConceptLocation, decimals: usize) -> String {
    match location {
        ConceptLocation::Coordinates(c) => c.key_fragment(decimals),
        ConceptLocation::Text(text) => normalize(text),
    }
}

fn filter_part(filter: Option<&str>) -> String {
    filter.map(|f| format!(":{}", normalize(f))).unwrap_or_default()
}

pub fn google_search_key(
    query: &str,
    location: &ConceptLocation,
    radius_meters: u32,
    place_type: Option<&str>,
) -> String {
    format!(
        "{}:search:{}:{}:{}{}",
        GOOGLE_PLACE,
        normalize(query),
        location_part(location, 3),
        radius_meters,
        filter_part(place_type)
    )
}

pub fn yelp_search_key(
    term: &str,
    location: &ConceptLocation,
    radius_meters: u32,
    limit: u32,
    category: Option<&str>,
) -> String {
    format!(
        "{}:search:{}:{}:{}:{}{}",
        YELP_BUSINESS,
        normalize(term),
        location_part(location, 3),
        radius_meters,
        limit,
        filter_part(category)
    )
}

/// Inventory searches are coordinate-based; two decimals (~1 km) share results
pub fn amadeus_search_key(kind: AmadeusKind, location: &ConceptLocation, radius_km: u32) -> String {
    let kind = match kind {
        AmadeusKind::Hotel => "hotels",
        AmadeusKind::Activity => "activities",
        AmadeusKind::Airport => "airports",
    };
    format!(
        "{}:{}:{}:{}",
        AMADEUS_DATA,
        kind,
        location_part(location, 2),
        radius_km
    )
}

pub fn weather_key(location: &ConceptLocation) -> String {
    format!("{}:{}", WEATHER, location_part(location, 2))
}

pub fn consolidated_key(concept_signature: &str, cluster_signature: &str) -> String {
    format!("{}:{}:{}", CONSOLIDATED, concept_signature, cluster_signature)
}
