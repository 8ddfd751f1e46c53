//! Record builders
//!
//! Minimal provider records; tests override the fields they care about.

use chrono::{DateTime, Utc};
use wayfind_places::types::{
    AmadeusData, AmadeusKind, Coordinates, DailyForecast, GooglePlaceData, PlaceCategory, Price,
    SourceRecord, WeatherData, YelpBusinessData, YelpCategory,
};
use wayfind_places::{ConceptCategory, ConceptLocation, PlaceConcept};

pub fn fetched_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// "ramen" near Shibuya station
pub fn ramen_concept() -> PlaceConcept {
    PlaceConcept::new(
        "ramen",
        ConceptCategory::Eat,
        ConceptLocation::Coordinates(Coordinates::new(35.6595, 139.7005)),
    )
    .with_radius(1_000)
}

pub fn google_place(id: &str, name: &str, lat: f64, lng: f64) -> SourceRecord {
    SourceRecord::Google(GooglePlaceData {
        place_id: id.to_string(),
        name: name.to_string(),
        formatted_address: Some("1-22-7 Jinnan, Shibuya City, Tokyo".to_string()),
        location: Some(Coordinates::new(lat, lng)),
        types: vec!["restaurant".to_string(), "food".to_string()],
        categories: vec![PlaceCategory::Restaurant],
        rating: Some(4.2),
        user_ratings_total: Some(3000),
        price_level: Some(2),
        open_now: Some(true),
        photo_refs: vec![format!("{}-photo", id)],
        business_status: Some("OPERATIONAL".to_string()),
        fetched_at: fetched_at(),
    })
}

pub fn yelp_business(id: &str, name: &str, lat: f64, lng: f64) -> SourceRecord {
    SourceRecord::Yelp(YelpBusinessData {
        business_id: id.to_string(),
        alias: id.to_string(),
        name: name.to_string(),
        coordinates: Some(Coordinates::new(lat, lng)),
        yelp_categories: vec![YelpCategory {
            alias: "ramen".to_string(),
            title: "Ramen".to_string(),
        }],
        categories: vec![PlaceCategory::Restaurant],
        rating: Some(4.5),
        review_count: 500,
        price: Some("$$".to_string()),
        phone: Some("+81334632667".to_string()),
        display_address: vec!["1-22-7 Jinnan".to_string(), "Shibuya, Tokyo".to_string()],
        url: Some(format!("https://www.yelp.com/biz/{}", id)),
        image_url: None,
        is_closed: false,
        distance_meters: Some(210.0),
        fetched_at: fetched_at(),
    })
}

pub fn amadeus_activity(id: &str, name: &str, lat: f64, lng: f64) -> SourceRecord {
    SourceRecord::Amadeus(AmadeusData {
        kind: AmadeusKind::Activity,
        amadeus_id: id.to_string(),
        name: name.to_string(),
        location: Some(Coordinates::new(lat, lng)),
        address: None,
        rating: Some(4.0),
        price: Some(Price {
            amount: 45.0,
            currency: "EUR".to_string(),
        }),
        booking_url: Some(format!("https://booking.example/{}", id)),
        description: Some("Guided tasting walk".to_string()),
        iata_code: None,
        available: Some(true),
        pictures: Vec::new(),
        fetched_at: fetched_at(),
    })
}

pub fn weather_report() -> SourceRecord {
    SourceRecord::Weather(WeatherData {
        location_label: "Shibuya".to_string(),
        temperature_c: 18.5,
        feels_like_c: 17.9,
        humidity: 62,
        description: "few clouds".to_string(),
        icon: "02d".to_string(),
        wind_speed: 3.1,
        forecast: vec![DailyForecast {
            date: "2023-11-15".to_string(),
            temp_high_c: 19.0,
            temp_low_c: 11.0,
            description: "clear sky".to_string(),
            icon: "01d".to_string(),
        }],
        fetched_at: fetched_at(),
    })
}
