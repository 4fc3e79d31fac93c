//! Reference symbol sizing for proportional-symbol legends.

use opioid_map_metric_models::LegendScale;

use crate::magnitude::{self, ScaleFactor};

/// Builds legend reference sizes from the largest observed value.
///
/// The maximum is rounded to the nearest multiple of `round_to` (no
/// rounding when `round_to <= 0`). If rounding would collapse a positive
/// maximum to zero, the unrounded maximum is used. The large reference
/// circle is sized for the rounded maximum; the small one is half its
/// diameter and is labelled with half the rounded maximum.
#[must_use]
pub fn scale(max_value: f64, round_to: f64, scale_factor: ScaleFactor) -> LegendScale {
    let max_value = magnitude::sanitize(max_value);
    if max_value == 0.0 {
        return LegendScale::default();
    }

    let rounded_max = match round_to {
        step if step > 0.0 && step.is_finite() => {
            let rounded = (max_value / step).round() * step;
            if rounded > 0.0 { rounded } else { max_value }
        }
        _ => max_value,
    };

    let large_diameter = magnitude::radius(rounded_max, scale_factor) * 2.0;

    LegendScale {
        max_value,
        rounded_max,
        large_diameter,
        small_diameter: large_diameter / 2.0,
        small_value: rounded_max / 2.0,
    }
}
