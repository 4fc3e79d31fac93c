//! Layer configuration loaded from TOML.
//!
//! A default configuration is embedded at compile time from
//! `config/default.toml`. User files only need to name the fields they
//! change; everything else falls back to the embedded defaults.

use std::path::Path;
use std::str::FromStr as _;

use opioid_map_metric_models::{Category, YearRange};
use serde::Deserialize;

use crate::ConfigError;
use crate::magnitude::ScaleFactor;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Default step that legend reference values are rounded to.
pub const DEFAULT_LEGEND_ROUND_TO: f64 = 1000.0;

/// Resolved configuration for a metric layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    /// Feature property holding the region identifier.
    pub region_id_property: String,
    /// Radius multiplier.
    pub scale_factor: ScaleFactor,
    /// Step legend reference values are rounded to (`<= 0` disables).
    pub legend_round_to: f64,
    /// Declared categories, in display order.
    pub categories: Vec<Category>,
    /// Fixed year range, or `None` to infer it from the data.
    pub years: Option<YearRange>,
}

/// On-disk shape; every field optional so user files can be partial.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayerConfig {
    region_id_property: Option<String>,
    scale_factor: Option<f64>,
    legend_round_to: Option<f64>,
    categories: Option<Vec<String>>,
    years: Option<YearRange>,
    #[serde(default)]
    infer_years: bool,
}

impl LayerConfig {
    /// Parses a TOML document layered over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, names an unknown
    /// category, declares no categories, or carries an invalid year range
    /// or scale factor.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawLayerConfig = toml::de::from_str(toml_str)?;
        Self::default().apply(raw)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)?;
        log::info!("Loaded layer config from {}", path.display());
        Self::from_toml_str(&toml_str)
    }

    fn fallback() -> Self {
        Self {
            region_id_property: "STATE".to_string(),
            scale_factor: ScaleFactor::default(),
            legend_round_to: DEFAULT_LEGEND_ROUND_TO,
            categories: Category::all().to_vec(),
            years: None,
        }
    }

    fn apply(mut self, raw: RawLayerConfig) -> Result<Self, ConfigError> {
        if let Some(property) = raw.region_id_property {
            self.region_id_property = property;
        }
        if let Some(factor) = raw.scale_factor {
            self.scale_factor = ScaleFactor::new(factor)?;
        }
        if let Some(step) = raw.legend_round_to {
            self.legend_round_to = step;
        }
        if let Some(names) = raw.categories {
            let mut categories = Vec::with_capacity(names.len());
            for name in names {
                let category = Category::from_str(name.trim())
                    .map_err(|_| ConfigError::UnknownCategory(name.clone()))?;
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
            if categories.is_empty() {
                return Err(ConfigError::NoCategories);
            }
            self.categories = categories;
        }
        if raw.infer_years {
            self.years = None;
        } else if let Some(years) = raw.years {
            self.years = Some(years);
        }
        Ok(self)
    }
}

impl Default for LayerConfig {
    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by tests.
    fn default() -> Self {
        let raw: RawLayerConfig = toml::de::from_str(DEFAULT_CONFIG_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded layer config: {e}"));
        Self::fallback()
            .apply(raw)
            .unwrap_or_else(|e| panic!("Invalid embedded layer config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_parses() {
        let config = LayerConfig::default();
        assert_eq!(config.region_id_property, "STATE");
        assert!((config.scale_factor.value() - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.categories, Category::all());
        assert_eq!(config.years, Some(YearRange::new(2006, 2018).unwrap()));
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let config = LayerConfig::from_toml_str(
            r#"
            scale_factor = 1.25
            categories = ["heroin", "SYNTHETIC", "heroin"]
            "#,
        )
        .unwrap();
        assert!((config.scale_factor.value() - 1.25).abs() < f64::EPSILON);
        assert_eq!(
            config.categories,
            vec![Category::Heroin, Category::Synthetic]
        );
        assert_eq!(config.region_id_property, "STATE");
        assert!(config.years.is_some());
    }

    #[test]
    fn infer_years_clears_the_range() {
        let config = LayerConfig::from_toml_str("infer_years = true").unwrap();
        assert_eq!(config.years, None);
    }

    #[test]
    fn rejects_inverted_year_range() {
        let err = LayerConfig::from_toml_str("[years]\nmin = 2018\nmax = 2006\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "got {err:?}");
    }

    #[test]
    fn rejects_unknown_category() {
        let err = LayerConfig::from_toml_str(r#"categories = ["cocaine"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory(ref name) if name == "cocaine"));
    }

    #[test]
    fn rejects_empty_category_list() {
        let err = LayerConfig::from_toml_str("categories = []").unwrap_err();
        assert!(matches!(err, ConfigError::NoCategories));
    }

    #[test]
    fn rejects_negative_scale_factor() {
        let err = LayerConfig::from_toml_str("scale_factor = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScaleFactor(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(LayerConfig::from_toml_str("radius = 3").is_err());
    }
}
