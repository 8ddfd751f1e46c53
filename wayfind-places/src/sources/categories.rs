//! Provider-native categories mapped onto `PlaceCategory`

use crate::types::{ConceptCategory, PlaceCategory};

/// Google place type → unified category
pub fn from_google_type(place_type: &str) -> Option<PlaceCategory> {
    let category = match place_type {
        "restaurant" | "meal_takeaway" | "meal_delivery" | "food" | "bakery" => PlaceCategory::Restaurant,
        "lodging" => PlaceCategory::Hotel,
        "tourist_attraction" | "museum" | "art_gallery" | "park" | "zoo" | "aquarium"
        | "church" | "hindu_temple" | "place_of_worship" => PlaceCategory::Attraction,
        "amusement_park" | "bowling_alley" | "spa" | "gym" | "stadium" | "movie_theater" => {
            PlaceCategory::Activity
        }
        "bar" | "liquor_store" => PlaceCategory::Bar,
        "night_club" | "casino" => PlaceCategory::Nightlife,
        "cafe" => PlaceCategory::Cafe,
        "shopping_mall" | "store" | "clothing_store" | "department_store" | "book_store" => {
            PlaceCategory::Shopping
        }
        "airport" | "train_station" | "subway_station" | "bus_station" | "transit_station"
        | "taxi_stand" => PlaceCategory::Transport,
        _ => return None,
    };
    Some(category)
}

/// Yelp category alias → unified category
pub fn from_yelp_alias(alias: &str) -> Option<PlaceCategory> {
    let category = match alias {
        "restaurants" | "food" => PlaceCategory::Restaurant,
        "hotels" | "hotelstravel" | "bedbreakfast" | "hostels" | "guesthouses" => PlaceCategory::Hotel,
        "tours" | "active" | "arts" | "galleries" => PlaceCategory::Activity,
        "landmarks" | "museums" | "parks" | "temples" | "shrines" => PlaceCategory::Attraction,
        "nightlife" | "danceclubs" | "karaoke" => PlaceCategory::Nightlife,
        "cafes" | "coffee" | "coffeeroasteries" | "tea" => PlaceCategory::Cafe,
        "shopping" | "fashion" | "deptstores" => PlaceCategory::Shopping,
        "airports" | "trainstations" | "publictransport" | "taxis" => PlaceCategory::Transport,
        other if other.ends_with("bars") => PlaceCategory::Bar,
        _ => return None,
    };
    Some(category)
}

/// Map every tag, dropping unknowns and duplicates; fall back when nothing maps.
///
/// Searches are already filtered by the concept's category, so a result whose
/// tags are all cuisine-level (`ramen`, `sushi`) still belongs to it.
pub fn map_all<'a>(
    tags: impl IntoIterator<Item = &'a str>,
    mapper: fn(&str) -> Option<PlaceCategory>,
    fallback: PlaceCategory,
) -> Vec<PlaceCategory> {
    let mut categories: Vec<PlaceCategory> = Vec::new();
    for category in tags.into_iter().filter_map(mapper) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        categories.push(fallback);
    }
    categories
}

/// Google `type` filter for a concept
pub fn google_type_filter(category: ConceptCategory) -> Option<&'static str> {
    match category {
        ConceptCategory::Eat => Some("restaurant"),
        ConceptCategory::Stay => Some("lodging"),
        ConceptCategory::Do => Some("tourist_attraction"),
        ConceptCategory::Transport => None,
    }
}

/// Yelp `categories` filter for a concept
pub fn yelp_category_filter(category: ConceptCategory) -> Option<&'static str> {
    match category {
        ConceptCategory::Eat => Some("restaurants,food"),
        ConceptCategory::Stay => Some("hotels"),
        ConceptCategory::Do => Some("tours,arts,landmarks"),
        ConceptCategory::Transport => None,
    }
}
