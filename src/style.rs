//! Presentation derivations: marker styling and relative times.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Smallest marker radius in pixels.
const MIN_RADIUS: f64 = 8.0;

/// Pixels of radius per unit of magnitude.
const RADIUS_PER_MAGNITUDE: f64 = 5.0;

/// Severity tier used for marker fill and list magnitude color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerTier {
    Red,
    Orange,
    Amber,
    Green,
}

impl MarkerTier {
    /// Tier for a magnitude. Boundaries are inclusive on the upper tier.
    #[must_use]
    pub fn for_magnitude(magnitude: f64) -> Self {
        match magnitude {
            m if m >= 6.0 => Self::Red,
            m if m >= 4.0 => Self::Orange,
            m if m >= 2.0 => Self::Amber,
            _ => Self::Green,
        }
    }

    /// Fill color as a CSS hex string.
    #[must_use]
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Red => "#dc2626",
            Self::Orange => "#ea580c",
            Self::Amber => "#ca8a04",
            Self::Green => "#059669",
        }
    }
}

/// Which marker layer an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Current,
    Historical,
}

impl Layer {
    /// Border color; the historical layer is told apart only by this.
    #[must_use]
    pub const fn border_color(self) -> &'static str {
        match self {
            Self::Current => "white",
            Self::Historical => "red",
        }
    }
}

/// Circle marker styling handed to the map widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub radius: f64,
    pub tier: MarkerTier,
    pub fill_color: &'static str,
    pub color: &'static str,
    pub weight: u8,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl MarkerStyle {
    #[must_use]
    pub fn new(magnitude: f64, layer: Layer) -> Self {
        let tier = MarkerTier::for_magnitude(magnitude);
        Self {
            radius: marker_radius(magnitude),
            tier,
            fill_color: tier.hex(),
            color: layer.border_color(),
            weight: 2,
            opacity: 0.8,
            fill_opacity: 0.8,
        }
    }
}

/// Marker radius: five pixels per magnitude unit, never below eight.
#[must_use]
pub fn marker_radius(magnitude: f64) -> f64 {
    (magnitude * RADIUS_PER_MAGNITUDE).max(MIN_RADIUS)
}

/// Human relative time such as `"5m ago"`, `"3h ago"` or `"2d ago"`.
///
/// Uses floor division; timestamps in the future are not special-cased.
#[must_use]
pub fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let elapsed_ms = now.timestamp_millis() - then.timestamp_millis();
    let minutes = elapsed_ms.div_euclid(60_000);
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes.div_euclid(60);
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours.div_euclid(24))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(MarkerTier::for_magnitude(6.0), MarkerTier::Red);
        assert_eq!(MarkerTier::for_magnitude(9.1), MarkerTier::Red);
        assert_eq!(MarkerTier::for_magnitude(5.99), MarkerTier::Orange);
        assert_eq!(MarkerTier::for_magnitude(4.0), MarkerTier::Orange);
        assert_eq!(MarkerTier::for_magnitude(3.99), MarkerTier::Amber);
        assert_eq!(MarkerTier::for_magnitude(2.0), MarkerTier::Amber);
        assert_eq!(MarkerTier::for_magnitude(1.99), MarkerTier::Green);
        assert_eq!(MarkerTier::for_magnitude(-0.5), MarkerTier::Green);
        assert_eq!(MarkerTier::for_magnitude(f64::NAN), MarkerTier::Green);
    }

    #[test]
    fn test_radius() {
        assert!((marker_radius(0.0) - 8.0).abs() < f64::EPSILON);
        assert!((marker_radius(1.6) - 8.0).abs() < f64::EPSILON);
        assert!((marker_radius(2.0) - 10.0).abs() < f64::EPSILON);
        assert!((marker_radius(6.2) - 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_layer_border() {
        let current = MarkerStyle::new(4.5, Layer::Current);
        let historical = MarkerStyle::new(4.5, Layer::Historical);
        assert_eq!(current.color, "white");
        assert_eq!(historical.color, "red");
        assert_eq!(current.fill_color, historical.fill_color);
        assert_eq!(current.fill_color, "#ea580c");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.with_ymd_and_hms(2025, 10, 17, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now, now - Duration::seconds(90)), "1m ago");
        assert_eq!(time_ago(now, now - Duration::seconds(30)), "0m ago");
        assert_eq!(time_ago(now, now - Duration::minutes(59)), "59m ago");
        assert_eq!(time_ago(now, now - Duration::minutes(60)), "1h ago");
        assert_eq!(time_ago(now, now - Duration::hours(3)), "3h ago");
        assert_eq!(time_ago(now, now - Duration::hours(50)), "2d ago");
    }

    #[test]
    fn test_time_ago_future_is_not_guarded() {
        let now = Utc.with_ymd_and_hms(2025, 10, 17, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now, now + Duration::seconds(30)), "-1m ago");
    }
}
