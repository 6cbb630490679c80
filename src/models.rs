//! Data models for USGS earthquake feeds.
//!
//! The wire structures match the GeoJSON summary format; [`SeismicEvent`]
//! is the normalized shape every derivation works on.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::FeedError;

/// Top-level GeoJSON response from USGS feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    /// Feed metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,

    /// Earthquake events
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Validate the response structure.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.type_ != "FeatureCollection" {
            return Err(FeedError::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    /// Human-readable title
    pub title: Option<String>,

    /// Number of events in response
    pub count: Option<usize>,
}

/// A single earthquake event as published upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Unique event ID
    pub id: String,

    /// Geographic location
    pub geometry: Geometry,

    /// Event properties
    pub properties: Properties,
}

/// Geographic geometry for an event.
///
/// Coordinates are kept as raw JSON values so a malformed tuple degrades
/// to `NaN` instead of rejecting the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    #[serde(default)]
    pub coordinates: Vec<Value>,
}

impl Geometry {
    /// Numeric coordinate at `index`, or `NaN` when absent or non-numeric.
    fn axis(&self, index: usize) -> f64 {
        self.coordinates
            .get(index)
            .and_then(Value::as_f64)
            .unwrap_or(f64::NAN)
    }

    /// Whether all three axes are present as numbers.
    fn is_well_formed(&self) -> bool {
        self.coordinates.len() >= 3 && self.coordinates[..3].iter().all(Value::is_number)
    }
}

/// Event properties used by the dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct Properties {
    /// Magnitude value
    pub mag: Option<f64>,

    /// Magnitude type (mb, Ml, Mw, etc.)
    #[serde(rename = "magType")]
    pub mag_type: Option<String>,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event time (ms since epoch); treated as the epoch when absent
    #[serde(default)]
    pub time: Option<i64>,

    /// Event page URL
    pub url: Option<String>,
}

/// Normalized earthquake event.
///
/// Built once at ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SeismicEvent {
    pub id: String,
    pub magnitude: f64,
    pub magnitude_type: Option<String>,
    pub place: String,
    pub occurred_at_ms: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
    pub url: Option<String>,
}

impl SeismicEvent {
    /// Get the event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.occurred_at_ms).single()
    }
}

impl From<&Feature> for SeismicEvent {
    fn from(f: &Feature) -> Self {
        Self {
            id: f.id.clone(),
            magnitude: f.properties.mag.unwrap_or(f64::NAN),
            magnitude_type: f.properties.mag_type.clone(),
            place: f.properties.place.clone().unwrap_or_default(),
            occurred_at_ms: f.properties.time.unwrap_or(0),
            longitude: f.geometry.axis(0),
            latitude: f.geometry.axis(1),
            depth_km: f.geometry.axis(2),
            url: f.properties.url.clone(),
        }
    }
}

/// Result of normalizing one feed document.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    /// Events sorted most recent first
    pub events: Vec<SeismicEvent>,
    /// Records whose magnitude, time or coordinates were missing or non-numeric
    pub malformed: usize,
}

/// Normalize every feature and sort the result descending by time.
#[must_use]
pub fn ingest(collection: &FeatureCollection) -> Ingested {
    let mut malformed = 0;
    let mut events: Vec<SeismicEvent> = collection
        .features
        .iter()
        .map(|feature| {
            if feature.properties.mag.is_none()
                || feature.properties.time.is_none()
                || !feature.geometry.is_well_formed()
            {
                malformed += 1;
            }
            SeismicEvent::from(feature)
        })
        .collect();

    events.sort_by(|a, b| b.occurred_at_ms.cmp(&a.occurred_at_ms));

    Ingested { events, malformed }
}
