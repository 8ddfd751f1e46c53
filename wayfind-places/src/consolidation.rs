//! Consolidation service
//!
//! Merges each `MatchGroup` into one `ConsolidatedPlace`.
//!
//! # Architecture
//!
//! Field-by-field merge driven by a source-priority table: the first source in
//! a field's priority list that has a value wins, and the winner is recorded
//! in `provenance`. Derived fields (aggregated rating, pricing, data quality)
//! are computed over every member.
//!
//! Pure transformation: no clock, no network. `last_updated` comes from the
//! members' fetch times, so identical input gives identical output.

use crate::types::{
    ConsolidatedPlace, DataQuality, Field, MatchGroup, PlaceCategory, PlaceRecord, Price, PricingInfo, SourceName,
    SourceRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use wayfind_common::hash;

/// Review counts above this stop adding weight to a rating
const MAX_RATING_WEIGHT: u32 = 1_000;

/// Fields counted toward `DataQuality::completeness`
const TRACKED_FIELDS: u8 = 10;

/// Preferred sources per field, best first
pub type FieldPriorities = BTreeMap<Field, Vec<SourceName>>;

pub fn default_priorities() -> FieldPriorities {
    use SourceName::{Amadeus, Google, Yelp};

    BTreeMap::from([
        (Field::Name, vec![Google, Yelp, Amadeus]),
        (Field::Location, vec![Google, Yelp, Amadeus]),
        (Field::Address, vec![Google, Yelp, Amadeus]),
        (Field::Category, vec![Google, Yelp, Amadeus]),
        (Field::Rating, vec![Yelp, Google, Amadeus]),
        (Field::ReviewCount, vec![Yelp, Google]),
        (Field::PriceLevel, vec![Yelp, Google]),
        (Field::Phone, vec![Yelp, Google]),
        (Field::Photos, vec![Google, Yelp, Amadeus]),
        (Field::Website, vec![Yelp, Google, Amadeus]),
        (Field::OpenNow, vec![Google, Yelp]),
        (Field::BookingPrice, vec![Amadeus]),
        (Field::Availability, vec![Amadeus]),
        (Field::Description, vec![Amadeus]),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Applied when fewer than two sources contributed
    pub single_source_penalty: f64,
    /// Upper bound on single-source confidence
    pub single_source_ceiling: f64,
    /// Upper bound on how long merged results are cached
    pub consolidated_ttl_secs: u64,
    pub priorities: FieldPriorities,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            single_source_penalty: 0.75,
            single_source_ceiling: 0.6,
            consolidated_ttl_secs: 6 * 3600,
            priorities: default_priorities(),
        }
    }
}

impl ConsolidationConfig {
    pub fn consolidated_ttl(&self) -> Duration {
        Duration::from_secs(self.consolidated_ttl_secs)
    }

    /// Priority list for a field; fields missing from a partial table use the default
    pub fn priority(&self, field: Field) -> Vec<SourceName> {
        self.priorities
            .get(&field)
            .cloned()
            .or_else(|| default_priorities().remove(&field))
            .unwrap_or_default()
    }
}

pub struct ConsolidationService {
    config: ConsolidationConfig,
}

/// Value picked for one field, with the source it came from
struct Pick<T> {
    value: T,
    source: SourceName,
}

impl ConsolidationService {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Merge every group, preserving group order
    pub fn consolidate(&self, groups: &[MatchGroup]) -> Vec<ConsolidatedPlace> {
        groups.iter().filter_map(|g| self.consolidate_group(g)).collect()
    }

    /// Merge one group; `None` when it holds no place records
    pub fn consolidate_group(&self, group: &MatchGroup) -> Option<ConsolidatedPlace> {
        let places: Vec<&dyn PlaceRecord> = group.places().collect();
        let last_updated = places.iter().map(|p| p.fetched_at()).max()?;

        let mut provenance = BTreeMap::new();
        let mut attributes: BTreeMap<String, Value> = BTreeMap::new();

        let name = self
            .pick(group, Field::Name, |p| Some(p.name().trim().to_string()).filter(|n| !n.is_empty()))
            .map(|pick| record(&mut provenance, Field::Name, pick))
            .unwrap_or_else(|| places[0].name().to_string());

        let location = self
            .pick(group, Field::Location, |p| p.coordinates())
            .map(|pick| record(&mut provenance, Field::Location, pick));

        let address = self
            .pick(group, Field::Address, |p| p.address().filter(|a| !a.trim().is_empty()))
            .map(|pick| record(&mut provenance, Field::Address, pick));

        let category = self
            .pick(group, Field::Category, |p| p.categories().first().copied())
            .map(|pick| record(&mut provenance, Field::Category, pick))
            .or_else(|| places.iter().find_map(|p| p.categories().first().copied()))
            .unwrap_or(PlaceCategory::Attraction);

        if let Some(rating) = self.pick(group, Field::Rating, |p| p.rating()) {
            attributes.insert("rating".into(), json!(record(&mut provenance, Field::Rating, rating)));
        }
        if let Some(reviews) = self.pick(group, Field::ReviewCount, |p| p.review_count()) {
            attributes.insert(
                "review_count".into(),
                json!(record(&mut provenance, Field::ReviewCount, reviews)),
            );
        }
        if let Some(phone) = self.pick(group, Field::Phone, |p| p.phone().map(str::to_string)) {
            attributes.insert("phone".into(), json!(record(&mut provenance, Field::Phone, phone)));
        }
        if let Some(photos) = self.pick(group, Field::Photos, |p| Some(p.photos()).filter(|v| !v.is_empty())) {
            attributes.insert("photos".into(), json!(record(&mut provenance, Field::Photos, photos)));
        }
        if let Some(website) = self.pick(group, Field::Website, |p| p.url().map(str::to_string)) {
            attributes.insert("website".into(), json!(record(&mut provenance, Field::Website, website)));
        }
        if let Some(open_now) = self.pick(group, Field::OpenNow, |p| p.open_now()) {
            attributes.insert("open_now".into(), json!(record(&mut provenance, Field::OpenNow, open_now)));
        }
        if let Some(available) = self.pick_record(group, Field::Availability, availability) {
            attributes.insert(
                "available".into(),
                json!(record(&mut provenance, Field::Availability, available)),
            );
        }
        if let Some(description) = self.pick_record(group, Field::Description, description) {
            attributes.insert(
                "description".into(),
                json!(record(&mut provenance, Field::Description, description)),
            );
        }
        for member in &group.members {
            if let SourceRecord::Amadeus(data) = member {
                if let Some(iata) = &data.iata_code {
                    attributes.insert("iata_code".into(), json!(iata));
                }
            }
        }

        let price_level = self
            .pick(group, Field::PriceLevel, |p| p.price_level())
            .map(|pick| record(&mut provenance, Field::PriceLevel, pick));
        let booking_price = self
            .pick_record(group, Field::BookingPrice, booking_price)
            .map(|pick| record(&mut provenance, Field::BookingPrice, pick));
        let pricing = PricingInfo {
            price_level,
            display: price_level.map(|level| "$".repeat(usize::from(level))),
            booking_price,
        };

        let source_ids: BTreeMap<SourceName, String> = places
            .iter()
            .map(|p| (p.source(), p.source_id().to_string()))
            .collect();
        let source_count = source_ids.len();

        let completeness = [
            !name.is_empty(),
            location.is_some(),
            address.is_some(),
            attributes.contains_key("rating"),
            attributes.contains_key("review_count"),
            price_level.is_some(),
            attributes.contains_key("phone"),
            attributes.contains_key("photos"),
            attributes.contains_key("website"),
            attributes.contains_key("open_now"),
        ]
        .into_iter()
        .filter(|present| *present)
        .count() as u8;

        let data_quality = DataQuality {
            completeness,
            source_count: source_count.min(usize::from(u8::MAX)) as u8,
            overall: quality_score(completeness, source_count),
        };

        let place = ConsolidatedPlace {
            id: hash::short_id("place", [group.signature()]),
            name,
            location,
            category,
            address,
            attributes,
            provenance,
            confidence: self.confidence(group.confidence, source_count),
            source_ids,
            aggregated_rating: aggregated_rating(&places),
            total_review_count: places.iter().filter_map(|p| p.review_count()).sum(),
            pricing,
            data_quality,
            weather: None,
            last_updated,
        };

        debug!(
            id = %place.id,
            name = %place.name,
            sources = source_count,
            confidence = place.confidence,
            "Consolidated place"
        );

        Some(place)
    }

    /// Group confidence, reduced and capped when only one source contributed
    pub fn confidence(&self, group_confidence: f64, source_count: usize) -> f64 {
        let confidence = if source_count < 2 {
            (group_confidence * self.config.single_source_penalty).min(self.config.single_source_ceiling)
        } else {
            group_confidence
        };
        confidence.clamp(0.0, 1.0)
    }

    fn pick<T>(
        &self,
        group: &MatchGroup,
        field: Field,
        get: impl Fn(&dyn PlaceRecord) -> Option<T>,
    ) -> Option<Pick<T>> {
        self.pick_record(group, field, |r| r.as_place().and_then(&get))
    }

    /// First source in the field's priority list that has a value
    fn pick_record<T>(
        &self,
        group: &MatchGroup,
        field: Field,
        get: impl Fn(&SourceRecord) -> Option<T>,
    ) -> Option<Pick<T>> {
        self.config.priority(field).into_iter().find_map(|source| {
            group
                .members
                .iter()
                .find(|m| m.source() == source)
                .and_then(&get)
                .map(|value| Pick { value, source })
        })
    }
}

impl Default for ConsolidationService {
    fn default() -> Self {
        Self::new(ConsolidationConfig::default())
    }
}

fn record<T>(provenance: &mut BTreeMap<Field, SourceName>, field: Field, pick: Pick<T>) -> T {
    provenance.insert(field, pick.source);
    pick.value
}

fn booking_price(record: &SourceRecord) -> Option<Price> {
    match record {
        SourceRecord::Amadeus(data) => data.price.clone(),
        _ => None,
    }
}

fn availability(record: &SourceRecord) -> Option<bool> {
    match record {
        SourceRecord::Amadeus(data) => data.available,
        _ => None,
    }
}

fn description(record: &SourceRecord) -> Option<String> {
    match record {
        SourceRecord::Amadeus(data) => data.description.clone(),
        _ => None,
    }
}

/// Review-count weighted mean rating, one decimal
fn aggregated_rating(places: &[&dyn PlaceRecord]) -> Option<f64> {
    let (weighted, total_weight) = places
        .iter()
        .filter_map(|p| {
            let rating = p.rating()?;
            let weight = p.review_count().unwrap_or(0).clamp(1, MAX_RATING_WEIGHT);
            Some((rating, f64::from(weight)))
        })
        .fold((0.0, 0.0), |(sum, weights), (rating, weight)| (sum + rating * weight, weights + weight));

    if total_weight == 0.0 {
        return None;
    }
    Some((weighted / total_weight * 10.0).round() / 10.0)
}

/// 0-100: field completeness carries 70 points, up to three sources 10 each
fn quality_score(completeness: u8, source_count: usize) -> u8 {
    let fields = f64::from(completeness) / f64::from(TRACKED_FIELDS) * 70.0;
    let sources = (source_count.min(3) * 10) as f64;
    (fields + sources).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AmadeusData, AmadeusKind, Coordinates, GooglePlaceData, YelpBusinessData};
    use chrono::DateTime;

    fn at(secs: i64) -> chrono::DateTime<chrono::Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn google() -> SourceRecord {
        SourceRecord::Google(GooglePlaceData {
            place_id: "ChIJ-ichiran".into(),
            name: "Ichiran Shibuya".into(),
            formatted_address: Some("1-22-7 Jinnan, Shibuya City, Tokyo".into()),
            location: Some(Coordinates::new(35.6614, 139.7006)),
            types: vec!["restaurant".into()],
            categories: vec![PlaceCategory::Restaurant],
            rating: Some(4.2),
            user_ratings_total: Some(3000),
            price_level: Some(2),
            open_now: Some(true),
            photo_refs: vec!["g-photo".into()],
            business_status: Some("OPERATIONAL".into()),
            fetched_at: at(1_000),
        })
    }

    fn yelp() -> SourceRecord {
        SourceRecord::Yelp(YelpBusinessData {
            business_id: "ichiran-shibuya".into(),
            alias: "ichiran-shibuya".into(),
            name: "ICHIRAN Shibuya".into(),
            coordinates: Some(Coordinates::new(35.66151, 139.70071)),
            yelp_categories: vec![],
            categories: vec![PlaceCategory::Restaurant],
            rating: Some(4.5),
            review_count: 500,
            price: Some("$".into()),
            phone: Some("+81334632667".into()),
            display_address: vec!["1-22-7 Jinnan".into()],
            url: Some("https://www.yelp.com/biz/ichiran-shibuya".into()),
            image_url: None,
            is_closed: false,
            distance_meters: None,
            fetched_at: at(2_000),
        })
    }

    fn group(members: Vec<SourceRecord>, confidence: f64) -> MatchGroup {
        MatchGroup { members, confidence }
    }

    #[test]
    fn test_field_priority_and_provenance() {
        // Arrange
        let service = ConsolidationService::default();
        let g = group(vec![google(), yelp()], 0.95);

        // Act
        let place = service.consolidate_group(&g).unwrap();

        // Assert
        assert_eq!(place.name, "Ichiran Shibuya");
        assert_eq!(place.location, Some(Coordinates::new(35.6614, 139.7006)));
        assert_eq!(place.provenance[&Field::Location], SourceName::Google);
        assert_eq!(place.provenance[&Field::Rating], SourceName::Yelp);
        assert_eq!(place.attributes["rating"], json!(4.5));
        assert_eq!(place.provenance[&Field::Phone], SourceName::Yelp);
        assert_eq!(place.provenance[&Field::OpenNow], SourceName::Google);
        assert_eq!(place.pricing.price_level, Some(1));
        assert_eq!(place.pricing.display.as_deref(), Some("$"));
        assert_eq!(place.provenance[&Field::PriceLevel], SourceName::Yelp);
        assert_eq!(place.confidence, 0.95);
        assert_eq!(place.source_ids.len(), 2);
        assert_eq!(place.total_review_count, 3500);
        assert_eq!(place.last_updated, at(2_000));
        assert!(place.weather.is_none());
    }

    #[test]
    fn test_every_populated_field_has_provenance() {
        let service = ConsolidationService::default();
        let place = service.consolidate_group(&group(vec![google(), yelp()], 0.9)).unwrap();

        for key in ["rating", "review_count", "phone", "photos", "website", "open_now"] {
            assert!(place.attributes.contains_key(key), "missing {}", key);
        }
        assert_eq!(place.provenance.len(), 11);
    }

    #[test]
    fn test_falls_back_to_next_source() {
        let service = ConsolidationService::default();
        let mut google = google();
        if let SourceRecord::Google(data) = &mut google {
            data.location = None;
        }

        let place = service.consolidate_group(&group(vec![google, yelp()], 0.9)).unwrap();

        assert_eq!(place.location, Some(Coordinates::new(35.66151, 139.70071)));
        assert_eq!(place.provenance[&Field::Location], SourceName::Yelp);
    }

    #[test]
    fn test_aggregated_rating_weights_by_reviews() {
        let service = ConsolidationService::default();
        let place = service.consolidate_group(&group(vec![google(), yelp()], 0.9)).unwrap();

        // Google capped at 1000 reviews: (4.2*1000 + 4.5*500) / 1500 = 4.3
        assert_eq!(place.aggregated_rating, Some(4.3));
    }

    #[test]
    fn test_single_source_confidence_is_capped() {
        let service = ConsolidationService::default();

        let place = service.consolidate_group(&group(vec![yelp()], 1.0)).unwrap();

        assert_eq!(place.confidence, 0.6);
        assert_eq!(service.confidence(0.5, 1), 0.375);
        assert_eq!(place.data_quality.source_count, 1);
    }

    #[test]
    fn test_amadeus_inventory_fields() {
        let service = ConsolidationService::default();
        let activity = SourceRecord::Amadeus(AmadeusData {
            kind: AmadeusKind::Activity,
            amadeus_id: "23642".into(),
            name: "Tsukiji Food Tour".into(),
            location: Some(Coordinates::new(35.6655, 139.7707)),
            address: None,
            rating: Some(4.7),
            price: Some(Price {
                amount: 12000.0,
                currency: "JPY".into(),
            }),
            booking_url: Some("https://book.example/23642".into()),
            description: Some("Taste your way through the outer market".into()),
            iata_code: None,
            available: Some(true),
            pictures: vec![],
            fetched_at: at(3_000),
        });

        let place = service.consolidate_group(&group(vec![activity], 1.0)).unwrap();

        assert_eq!(place.category, PlaceCategory::Activity);
        assert_eq!(place.pricing.booking_price.as_ref().map(|p| p.amount), Some(12000.0));
        assert_eq!(place.provenance[&Field::BookingPrice], SourceName::Amadeus);
        assert_eq!(place.attributes["available"], json!(true));
        assert_eq!(place.provenance[&Field::Website], SourceName::Amadeus);
        assert_eq!(place.aggregated_rating, Some(4.7));
    }

    #[test]
    fn test_id_is_stable_for_same_cluster() {
        let service = ConsolidationService::default();
        let a = service.consolidate_group(&group(vec![google(), yelp()], 0.9)).unwrap();
        let b = service.consolidate_group(&group(vec![yelp(), google()], 0.8)).unwrap();
        let single = service.consolidate_group(&group(vec![google()], 1.0)).unwrap();

        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("place_"));
        assert_eq!(a.id.len(), "place_".len() + 16);
        assert_ne!(a.id, single.id);
    }

    #[test]
    fn test_data_quality() {
        let service = ConsolidationService::default();
        let place = service.consolidate_group(&group(vec![google(), yelp()], 0.9)).unwrap();

        assert_eq!(place.data_quality.completeness, 10);
        assert_eq!(place.data_quality.overall, 90);
        assert_eq!(quality_score(5, 1), 45);
        assert_eq!(quality_score(0, 7), 30);
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: ConsolidationConfig = toml::from_str(
            r#"
            single_source_ceiling = 0.5

            [priorities]
            rating = ["google", "yelp"]
            "#,
        )
        .unwrap();

        assert_eq!(config.single_source_ceiling, 0.5);
        assert_eq!(config.single_source_penalty, 0.75);
        assert_eq!(config.priority(Field::Rating), vec![SourceName::Google, SourceName::Yelp]);
        assert_eq!(config.priority(Field::Phone), vec![SourceName::Yelp, SourceName::Google]);
    }
}
