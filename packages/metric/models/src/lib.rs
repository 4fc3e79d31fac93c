#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Opioid category, year range, and region metric types.
//!
//! These types describe the per-region, per-year death counts that drive
//! the proportional-symbol layers. They carry no geometry and know nothing
//! about rendering; the engine and the `GeoJSON` glue crates build on them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One tracked class of opioid death.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Category {
    /// Natural and semi-synthetic opioids (morphine, oxycodone)
    Natural,
    /// Synthetic opioids other than methadone (fentanyl)
    Synthetic,
    /// Methadone
    Methadone,
    /// Heroin
    Heroin,
}

impl Category {
    /// Returns the display color used for this category's symbols.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Natural => "#D96D02",
            Self::Synthetic => "#6E77B0",
            Self::Methadone => "#E34A33",
            Self::Heroin => "#FFFF00",
        }
    }

    /// Returns the lighter fill color used under this category's sparkline.
    #[must_use]
    pub const fn sparkline_fill(self) -> &'static str {
        match self {
            Self::Natural => "#D98939",
            Self::Synthetic | Self::Methadone | Self::Heroin => "#878DB0",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Natural, Self::Synthetic, Self::Methadone, Self::Heroin]
    }
}

/// Identifier of a region (a state name or code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    /// Creates a region identifier, trimming surrounding whitespace.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Inclusive span of years for which data exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawYearRange")]
pub struct YearRange {
    min: i32,
    max: i32,
}

impl YearRange {
    /// Creates a year range.
    ///
    /// # Errors
    ///
    /// Returns an error if `min` is greater than `max`.
    pub const fn new(min: i32, max: i32) -> Result<Self, InvalidYearRangeError> {
        if min > max {
            return Err(InvalidYearRangeError { min, max });
        }
        Ok(Self { min, max })
    }

    /// First year of the range.
    #[must_use]
    pub const fn min(self) -> i32 {
        self.min
    }

    /// Last year of the range.
    #[must_use]
    pub const fn max(self) -> i32 {
        self.max
    }

    /// Returns `year` moved to the nearest bound if it falls outside the
    /// range.
    #[must_use]
    pub const fn clamp(self, year: i32) -> i32 {
        if year < self.min {
            self.min
        } else if year > self.max {
            self.max
        } else {
            year
        }
    }

    /// Whether `year` lies within the range.
    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }

    /// Number of years covered (always at least 1).
    #[must_use]
    pub const fn len(self) -> usize {
        self.max.abs_diff(self.min) as usize + 1
    }

    /// Always `false`; a valid range covers at least one year.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }

    /// Iterates the years in ascending order.
    pub fn years(self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

#[derive(Deserialize)]
struct RawYearRange {
    min: i32,
    max: i32,
}

impl TryFrom<RawYearRange> for YearRange {
    type Error = InvalidYearRangeError;

    fn try_from(raw: RawYearRange) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max)
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Error returned when a [`YearRange`] would start after it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidYearRangeError {
    /// The requested first year.
    pub min: i32,
    /// The requested last year.
    pub max: i32,
}

impl std::fmt::Display for InvalidYearRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid year range {}-{}: first year is after last year",
            self.min, self.max
        )
    }
}

impl std::error::Error for InvalidYearRangeError {}

/// A raw region as supplied by a data loader.
///
/// Properties are keyed the way the source table names its columns
/// (e.g. `"NATURAL2006"`, `"STATE"`); values may be strings, numbers, or
/// null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRecord {
    /// Region identifier.
    pub id: RegionId,
    /// Raw column values.
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Rendered size of one region/category/year cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnitudeResult {
    /// Raw value after degradation (missing or non-numeric read as 0).
    pub value: f64,
    /// Symbol radius derived from `value`.
    pub radius: f64,
}

/// A single point of a region's per-category time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Year of the observation.
    pub year: i32,
    /// Observed value (0 when missing).
    pub value: f64,
}

/// Reference symbol sizes for a proportional-symbol legend.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendScale {
    /// Largest raw value observed.
    pub max_value: f64,
    /// `max_value` rounded to the legend step.
    pub rounded_max: f64,
    /// Diameter of the large reference circle.
    pub large_diameter: f64,
    /// Diameter of the small reference circle (half the large one).
    pub small_diameter: f64,
    /// Label value for the small reference circle (half the rounded max).
    pub small_value: f64,
}
