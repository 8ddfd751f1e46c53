//! wayfind-places - place consolidation CLI
//!
//! Resolves one place concept against every configured provider and prints
//! the ranked, consolidated places as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wayfind_common::SystemClock;
use wayfind_places::types::Coordinates;
use wayfind_places::{ConceptCategory, ConceptLocation, ConsolidationPipeline, PlaceConcept, PlacesConfig, SourceName};

/// Command-line arguments for wayfind-places
#[derive(Parser, Debug)]
#[command(name = "wayfind-places")]
#[command(about = "Find a place across several providers and merge the results")]
#[command(version)]
struct Args {
    /// What to look for ("ramen", "boutique hotel", ...)
    #[arg(short, long)]
    query: String,

    /// Stay, Eat, Do or Transport
    #[arg(short, long, default_value = "eat")]
    category: ConceptCategory,

    /// Latitude of the search center
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the search center
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    /// Free-text location when coordinates are unknown
    #[arg(long, conflicts_with_all = ["lat", "lng"])]
    near: Option<String>,

    /// Search radius in meters
    #[arg(short, long)]
    radius: Option<u32>,

    /// Extra constraint, repeatable (`budget=mid`, `limit=10`)
    #[arg(long = "constraint", value_name = "KEY=VALUE")]
    constraints: Vec<String>,

    /// Config file (overrides WAYFIND_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated sources to query instead of category routing
    #[arg(long, value_delimiter = ',')]
    sources: Vec<SourceName>,
}

impl Args {
    fn concept(&self) -> Result<PlaceConcept> {
        let location = match (self.lat, self.lng, &self.near) {
            (Some(lat), Some(lng), _) => {
                let coordinates = Coordinates::new(lat, lng);
                if !coordinates.is_valid() {
                    bail!("coordinates out of range: {}, {}", lat, lng);
                }
                ConceptLocation::Coordinates(coordinates)
            }
            (_, _, Some(text)) if !text.trim().is_empty() => ConceptLocation::Text(text.trim().to_string()),
            _ => bail!("a location is required: pass --lat and --lng, or --near"),
        };

        let mut concept = PlaceConcept::new(self.query.trim(), self.category, location);
        if let Some(radius) = self.radius {
            concept = concept.with_radius(radius);
        }
        for (key, value) in parse_constraints(&self.constraints)? {
            concept = concept.with_constraint(key, value);
        }
        Ok(concept)
    }
}

fn parse_constraints(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("constraint '{}' is not KEY=VALUE", pair))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlacesConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting wayfind-places v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let concept = args.concept()?;

    let pipeline = ConsolidationPipeline::from_config(&config, Arc::new(SystemClock))
        .await
        .context("Failed to initialize pipeline")?;
    info!(sources = ?pipeline.resolver().registered(), "Pipeline ready");

    let places = if args.sources.is_empty() {
        pipeline.run(&concept).await?
    } else {
        pipeline.run_with_sources(&concept, &args.sources).await?
    };

    println!("{}", serde_json::to_string_pretty(&places)?);

    let stats = pipeline.cache().stats();
    info!(hits = stats.total_hits(), misses = stats.misses, "Cache usage");

    Ok(())
}
