#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-indexed metric layer engine.
//!
//! Indexes per-region opioid death counts by `(Category, year)` and turns
//! a selected year into area-proportional symbol radii for every region
//! and category. The engine is a pure, read-only query surface: it holds
//! no geometry, performs no I/O once built, and leaves drawing to
//! whichever rendering layer consumes its results.

pub mod config;
pub mod engine;
pub mod keys;
pub mod legend;
pub mod magnitude;

pub use config::LayerConfig;
pub use engine::{MetricLayerEngine, Region};
pub use magnitude::ScaleFactor;
pub use opioid_map_metric_models as models;

use opioid_map_metric_models::{Category, InvalidYearRangeError, RegionId};

/// Errors raised while configuring or constructing a [`MetricLayerEngine`].
///
/// Bad data points never produce one of these; they are read as zero.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No regions were supplied.
    #[error("no regions supplied")]
    EmptyRegions,

    /// No categories were declared.
    #[error("no categories declared")]
    NoCategories,

    /// The year range starts after it ends.
    #[error(transparent)]
    InvalidYearRange(#[from] InvalidYearRangeError),

    /// No year range was configured and none could be inferred from data.
    #[error("no metric columns found to infer a year range from")]
    NoYears,

    /// A region has no column at all for a declared category.
    #[error("region '{region}' has no data for category {category}")]
    MissingCategory {
        /// The region lacking data.
        region: RegionId,
        /// The declared category it lacks.
        category: Category,
    },

    /// Two regions share an identifier.
    #[error("duplicate region '{0}'")]
    DuplicateRegion(RegionId),

    /// The radius scale factor is negative or not finite.
    #[error("invalid scale factor {0}: must be finite and non-negative")]
    InvalidScaleFactor(f64),

    /// A configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configured category name is not recognized.
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
}
