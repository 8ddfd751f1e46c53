//! OpenWeather forecast client
//!
//! Weather is enrichment: its single record is attached to consolidated
//! places rather than matched against them.

use super::http::{build_client, send_json};
use super::PlaceSource;
use crate::cache::keys;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{ConceptLocation, DailyForecast, PlaceConcept, SourceName, SourceRecord, WeatherData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wayfind_common::Clock;

const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const SOURCE: SourceName = SourceName::Weather;
const MAX_FORECAST_DAYS: usize = 5;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastSlot>,
    city: Option<City>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    main: SlotMain,
    #[serde(default)]
    weather: Vec<SlotWeather>,
    wind: Option<SlotWind>,
    /// `YYYY-MM-DD HH:MM:SS` (UTC)
    dt_txt: String,
}

#[derive(Debug, Deserialize)]
struct SlotMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct SlotWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct SlotWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct City {
    name: String,
}

pub struct OpenWeatherClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl OpenWeatherClient {
    pub fn new(config: &ProviderConfig, clock: Arc<dyn Clock>) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::not_configured(SOURCE))?;

        Ok(Self {
            http_client: build_client(SOURCE, config.timeout())?,
            api_key,
            base_url: config.base_url_or(OPENWEATHER_BASE_URL).trim_end_matches('/').to_string(),
            ttl: config.ttl(SOURCE),
            clock,
        })
    }
}

fn describe(slot: &ForecastSlot) -> (String, String) {
    slot.weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_default()
}

/// Collapse 3-hourly slots into daily highs and lows.
///
/// The description of each day comes from the slot nearest midday.
fn daily_forecast(slots: &[ForecastSlot]) -> Vec<DailyForecast> {
    let mut days: Vec<(DailyForecast, u32)> = Vec::new();

    for slot in slots {
        let Some(date) = slot.dt_txt.get(..10) else {
            continue;
        };
        let hour: u32 = slot.dt_txt.get(11..13).and_then(|h| h.parse().ok()).unwrap_or(0);
        let distance_from_noon = hour.abs_diff(12);

        if let Some((day, best)) = days.last_mut().filter(|(day, _)| day.date == date) {
            day.temp_high_c = day.temp_high_c.max(slot.main.temp_max);
            day.temp_low_c = day.temp_low_c.min(slot.main.temp_min);
            if distance_from_noon < *best {
                (day.description, day.icon) = describe(slot);
                *best = distance_from_noon;
            }
            continue;
        }

        if days.len() == MAX_FORECAST_DAYS {
            break;
        }
        let (description, icon) = describe(slot);
        days.push((
            DailyForecast {
                date: date.to_string(),
                temp_high_c: slot.main.temp_max,
                temp_low_c: slot.main.temp_min,
                description,
                icon,
            },
            distance_from_noon,
        ));
    }

    days.into_iter().map(|(day, _)| day).collect()
}

fn parse_forecast(
    body: ForecastResponse,
    location: &ConceptLocation,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherData, ProviderError> {
    let current = body
        .list
        .first()
        .ok_or_else(|| ProviderError::malformed(SOURCE, "forecast has no entries"))?;
    let (description, icon) = describe(current);

    let location_label = body
        .city
        .as_ref()
        .map(|c| c.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| location.key_fragment(2));

    Ok(WeatherData {
        location_label,
        temperature_c: current.main.temp,
        feels_like_c: current.main.feels_like,
        humidity: current.main.humidity.clamp(0.0, 100.0).round() as u8,
        description,
        icon,
        wind_speed: current.wind.as_ref().map(|w| w.speed).unwrap_or(0.0),
        forecast: daily_forecast(&body.list),
        fetched_at,
    })
}

#[async_trait]
impl PlaceSource for OpenWeatherClient {
    fn name(&self) -> SourceName {
        SOURCE
    }

    fn cache_key(&self, concept: &PlaceConcept) -> String {
        keys::weather_key(&concept.location)
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
        let mut params: Vec<(&str, String)> = vec![
            ("units", "metric".to_string()),
            ("appid", self.api_key.clone()),
        ];
        match &concept.location {
            ConceptLocation::Coordinates(c) => {
                params.push(("lat", c.lat.to_string()));
                params.push(("lon", c.lng.to_string()));
            }
            ConceptLocation::Text(text) => params.push(("q", text.clone())),
        }

        debug!(source = %SOURCE, location = %concept.location.key_fragment(2), "Weather forecast");

        let request = self
            .http_client
            .get(format!("{}/forecast", self.base_url))
            .query(&params);
        let body: ForecastResponse = send_json(SOURCE, request).await?;

        let weather = parse_forecast(body, &concept.location, self.clock.now())?;
        Ok(vec![SourceRecord::Weather(weather)])
    }
}
