#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` glue between map data and the metric engine.
//!
//! Reads a `FeatureCollection` of regions (one feature per state, with
//! `"<CATEGORY><YEAR>"` properties) into [`RegionRecord`]s, keeping each
//! feature's geometry untouched for the renderer. Also computes the layer
//! extent and exports a per-year `FeatureCollection` carrying the radius
//! and color of every category's symbol.

use std::path::Path;

use geo::BoundingRect as _;
use geojson::GeoJson;
use opioid_map_metric::MetricLayerEngine;
use opioid_map_metric_models::{RegionId, RegionRecord};
use serde::{Deserialize, Serialize};

/// Errors that can occur while reading or writing layer `GeoJSON`.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The input is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The input is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("expected a GeoJSON FeatureCollection")]
    NotAFeatureCollection,

    /// Serializing output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A region record paired with its (opaque) feature geometry.
#[derive(Debug, Clone)]
pub struct RegionFeature {
    /// Identifier and raw properties.
    pub record: RegionRecord,
    /// Geometry as read, passed through unchanged to rendered output.
    pub geometry: Option<geojson::Geometry>,
}

/// Geographic extent of a layer in longitude/latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Western edge.
    pub min_lng: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lng: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl Bounds {
    /// Smallest extent covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min_lng: self.min_lng.min(other.min_lng),
            min_lat: self.min_lat.min(other.min_lat),
            max_lng: self.max_lng.max(other.max_lng),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }
}

/// Parses a `GeoJSON` `FeatureCollection` into region features.
///
/// Each feature's identifier is read from `properties[id_property]`
/// (string or number). Features without an identifier are skipped.
///
/// # Errors
///
/// Returns an error if the input is not valid `GeoJSON` or is not a
/// `FeatureCollection`.
pub fn read_feature_collection(
    geojson_str: &str,
    id_property: &str,
) -> Result<Vec<RegionFeature>, LayerError> {
    let geojson: GeoJson = geojson_str.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(LayerError::NotAFeatureCollection);
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();

        let Some(id) = properties.get(id_property).and_then(region_id_from_value) else {
            log::warn!("Skipping feature {index}: missing '{id_property}' property");
            continue;
        };

        features.push(RegionFeature {
            record: RegionRecord {
                id,
                properties: properties.into_iter().collect(),
            },
            geometry: feature.geometry,
        });
    }

    Ok(features)
}

/// Reads and parses a `GeoJSON` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_path(path: &Path, id_property: &str) -> Result<Vec<RegionFeature>, LayerError> {
    let geojson_str = std::fs::read_to_string(path)?;
    let features = read_feature_collection(&geojson_str, id_property)?;
    log::info!("Loaded {} regions from {}", features.len(), path.display());
    Ok(features)
}

/// Clones the raw records out of a feature list.
#[must_use]
pub fn records(features: &[RegionFeature]) -> Vec<RegionRecord> {
    features.iter().map(|f| f.record.clone()).collect()
}

/// Extent covering every feature geometry, or `None` if there is none.
#[must_use]
pub fn bounds(features: &[RegionFeature]) -> Option<Bounds> {
    features
        .iter()
        .filter_map(|feature| feature.geometry.clone())
        .filter_map(|geometry| {
            let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
            geometry.bounding_rect()
        })
        .map(|rect| Bounds {
            min_lng: rect.min().x,
            min_lat: rect.min().y,
            max_lng: rect.max().x,
            max_lat: rect.max().y,
        })
        .reduce(Bounds::union)
}

/// Renders every region's symbols for `year` as a `FeatureCollection`.
///
/// Each output feature keeps the input geometry and carries `id`, the
/// clamped `year`, and per category `<category>_value`,
/// `<category>_radius`, and `<category>_color` properties. Features whose
/// region is unknown to the engine are left out.
///
/// # Errors
///
/// Returns an error if a geometry fails to serialize.
pub fn render_year(
    engine: &MetricLayerEngine,
    features: &[RegionFeature],
    year: i32,
) -> Result<serde_json::Value, LayerError> {
    let year = engine.year_range().clamp(year);
    let magnitudes = engine.compute_magnitudes(year);

    let mut rendered = Vec::with_capacity(features.len());

    for feature in features {
        let Some(cells) = magnitudes.get(&feature.record.id) else {
            log::debug!("No magnitudes for region {}", feature.record.id);
            continue;
        };

        let mut properties = serde_json::Map::new();
        properties.insert("id".to_string(), feature.record.id.as_str().into());
        properties.insert("year".to_string(), year.into());

        for (category, cell) in cells {
            let prefix = category.as_ref().to_ascii_lowercase();
            properties.insert(format!("{prefix}_value"), cell.value.into());
            properties.insert(format!("{prefix}_radius"), cell.radius.into());
            properties.insert(format!("{prefix}_color"), category.color().into());
        }

        let geometry = match &feature.geometry {
            Some(geometry) => serde_json::to_value(geometry)?,
            None => serde_json::Value::Null,
        };

        rendered.push(serde_json::json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": properties,
        }));
    }

    Ok(serde_json::json!({
        "type": "FeatureCollection",
        "features": rendered,
    }))
}

fn region_id_from_value(value: &serde_json::Value) -> Option<RegionId> {
    let id = match value {
        serde_json::Value::String(s) => RegionId::new(s),
        serde_json::Value::Number(n) => RegionId::new(&n.to_string()),
        _ => return None,
    };
    (!id.as_str().is_empty()).then_some(id)
}
