#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the opioid death metric layer.
//!
//! Loads a `GeoJSON` `FeatureCollection` of states with per-year death
//! counts, builds a [`MetricLayerEngine`], and prints query results as
//! JSON for a map renderer (or a person) to consume.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use opioid_map_layer::RegionFeature;
use opioid_map_metric::{LayerConfig, MetricLayerEngine};
use opioid_map_metric_models::{Category, RegionId};

#[derive(Parser)]
#[command(name = "opioid_map", about = "Opioid death proportional-symbol layer tool")]
struct Cli {
    /// `GeoJSON` `FeatureCollection` with one feature per region
    #[arg(long, short)]
    input: PathBuf,

    /// Layer config TOML (embedded defaults when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Symbol radius for every region and category in a year
    Magnitudes {
        /// Selected year (clamped into the data's range)
        #[arg(long, allow_negative_numbers = true)]
        year: i32,
        /// Only report this category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Largest observed value
    Max {
        /// Only scan this category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Reference circle sizes for the legend
    Legend {
        /// Only scan this category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Per-year values of one region (sparkline data)
    Series {
        /// Region identifier
        #[arg(long)]
        region: String,
        /// Only report this category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Write a rendered `FeatureCollection` for a year
    Render {
        /// Selected year (clamped into the data's range)
        #[arg(long, allow_negative_numbers = true)]
        year: i32,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Year range, categories, region count, and extent
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LayerConfig::load(path)?,
        None => LayerConfig::default(),
    };

    let features = opioid_map_layer::load_path(&cli.input, &config.region_id_property)?;
    let engine =
        MetricLayerEngine::from_config(&opioid_map_layer::records(&features), &config)?;

    match cli.command {
        Commands::Magnitudes { year, category } => {
            print_json(&magnitudes(&engine, year, category)?)?;
        }
        Commands::Max { category } => {
            ensure_declared(&engine, category)?;
            print_json(&serde_json::json!({
                "category": category,
                "maxValue": engine.max_observed_value(category),
            }))?;
        }
        Commands::Legend { category } => {
            ensure_declared(&engine, category)?;
            let legend = engine.legend_scale(category, config.legend_round_to);
            print_json(&serde_json::to_value(legend)?)?;
        }
        Commands::Series { region, category } => {
            print_json(&series(&engine, &RegionId::new(&region), category)?)?;
        }
        Commands::Render { year, output } => {
            render(&engine, &features, year, output.as_deref())?;
        }
        Commands::Info => {
            print_json(&serde_json::json!({
                "yearRange": engine.year_range(),
                "categories": engine.categories(),
                "regions": engine.region_ids().count(),
                "scaleFactor": engine.scale_factor(),
                "bounds": opioid_map_layer::bounds(&features),
            }))?;
        }
    }

    Ok(())
}

/// Rejects a category filter naming a category the layer does not carry.
fn ensure_declared(
    engine: &MetricLayerEngine,
    category: Option<Category>,
) -> Result<(), Box<dyn std::error::Error>> {
    match category {
        Some(category) if !engine.categories().contains(&category) => {
            Err(format!("category {category} is not part of this layer").into())
        }
        _ => Ok(()),
    }
}

/// Builds the per-region radius payload for a year.
fn magnitudes(
    engine: &MetricLayerEngine,
    year: i32,
    category: Option<Category>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    ensure_declared(engine, category)?;

    let mut regions = engine.compute_magnitudes(year);
    if let Some(wanted) = category {
        for cells in regions.values_mut() {
            cells.retain(|c, _| *c == wanted);
        }
    }

    Ok(serde_json::json!({
        "year": engine.year_range().clamp(year),
        "regions": regions,
    }))
}

/// Builds the sparkline payload for one region.
fn series(
    engine: &MetricLayerEngine,
    region: &RegionId,
    category: Option<Category>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    if engine.region(region).is_none() {
        return Err(format!("unknown region '{region}'").into());
    }

    ensure_declared(engine, category)?;
    let categories = category.map_or_else(|| engine.categories().to_vec(), |c| vec![c]);

    let mut by_category = serde_json::Map::new();
    for category in categories {
        let Some(points) = engine.series(region, category) else {
            return Err(format!("category {category} is not part of this layer").into());
        };
        by_category.insert(
            category.to_string(),
            serde_json::json!({
                "lineColor": category.color(),
                "fillColor": category.sparkline_fill(),
                "points": points,
            }),
        );
    }

    Ok(serde_json::json!({
        "region": region,
        "series": by_category,
    }))
}

/// Renders a year and writes it to `output`, or stdout.
fn render(
    engine: &MetricLayerEngine,
    features: &[RegionFeature],
    year: i32,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rendered = opioid_map_layer::render_year(engine, features, year)?;

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string(&rendered)?)?;
            log::info!(
                "Rendered {} features for {} to {}",
                rendered["features"].as_array().map_or(0, Vec::len),
                engine.year_range().clamp(year),
                path.display()
            );
        }
        None => print_json(&rendered)?,
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
