//! Magnitude range filtering.

use serde::{Deserialize, Serialize};

use crate::models::SeismicEvent;

/// Lower bound of the magnitude slider.
pub const MAGNITUDE_FLOOR: f64 = 0.0;

/// Upper bound of the magnitude slider.
pub const MAGNITUDE_CEILING: f64 = 10.0;

/// Inclusive magnitude bounds applied to both collections.
///
/// `min <= max` is not enforced: an inverted range simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

impl Default for MagnitudeRange {
    fn default() -> Self {
        Self {
            min: MAGNITUDE_FLOOR,
            max: MAGNITUDE_CEILING,
        }
    }
}

impl MagnitudeRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check if a magnitude lies within the range.
    #[must_use]
    pub fn contains(&self, magnitude: f64) -> bool {
        magnitude >= self.min && magnitude <= self.max
    }
}

impl std::str::FromStr for MagnitudeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "range requires 2 values (min,max), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in range: {e}"))?;

        for v in &vals {
            if !(MAGNITUDE_FLOOR..=MAGNITUDE_CEILING).contains(v) {
                return Err(format!(
                    "magnitude {v} out of range [{MAGNITUDE_FLOOR}, {MAGNITUDE_CEILING}]"
                ));
            }
        }

        Ok(Self::new(vals[0], vals[1]))
    }
}

/// Keep the events whose magnitude lies within `range`, preserving order.
#[must_use]
pub fn apply_filter(events: &[SeismicEvent], range: MagnitudeRange) -> Vec<SeismicEvent> {
    events
        .iter()
        .filter(|e| range.contains(e.magnitude))
        .cloned()
        .collect()
}
