//! Area-proportional symbol sizing.
//!
//! A symbol's area is proportional to the value it represents, so the
//! radius grows with the square root: `sqrt(value / π) * scale`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default multiplier applied to every radius.
pub const DEFAULT_SCALE_FACTOR: f64 = 0.5;

/// Multiplier applied to every computed radius.
///
/// A tuning knob for how large symbols appear on screen, not a derived
/// constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Creates a scale factor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidScaleFactor`] if `factor` is negative,
    /// NaN, or infinite.
    pub fn new(factor: f64) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::InvalidScaleFactor(factor));
        }
        Ok(Self(factor))
    }

    /// Returns the raw multiplier.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self(DEFAULT_SCALE_FACTOR)
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScaleFactor> for f64 {
    fn from(value: ScaleFactor) -> Self {
        value.0
    }
}

/// Coerces a raw value into the transform's domain.
///
/// Negative, NaN, and infinite values read as zero.
#[must_use]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Computes the symbol radius for `value`.
///
/// `radius(0) == 0` and the result never decreases as `value` grows.
/// Products too large for `f64` saturate at `f64::MAX`.
#[must_use]
pub fn radius(value: f64, scale: ScaleFactor) -> f64 {
    ((sanitize(value) / PI).sqrt() * scale.value()).min(f64::MAX)
}
