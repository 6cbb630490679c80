//! Dashboard state and view-model derivation.
//!
//! [`DashboardState`] owns everything a mounted dashboard knows: the two
//! event collections, the current-day stats, the load status, the active
//! magnitude filter, the selection and the map viewport. It is mutated only
//! through the methods below and every read goes through
//! [`DashboardState::view_model`], which rebuilds the display data from
//! scratch.
//!
//! Fetch results carry a [`RefreshTicket`]. A result is applied only when
//! its ticket is newer than the last one applied for the same feed and the
//! dashboard is still mounted, so a slow response can never overwrite
//! fresher data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::client::FeedKind;
use crate::errors::{DashboardError, FeedError};
use crate::filters::{MagnitudeRange, apply_filter};
use crate::models::{Ingested, SeismicEvent};
use crate::stats::{AggregateStats, HistogramBar, bucketize, compute_stats};
use crate::style::{Layer, MarkerStyle, MarkerTier, time_ago};

/// Message shown whenever the current-day feed cannot be loaded.
pub const LOAD_ERROR_MESSAGE: &str = "Failed to load earthquake data. Please try again later.";

/// Zoom used when recentring on the latest event after a refresh.
pub const REFRESH_ZOOM: u8 = 5;

/// Zoom used when the user selects an event.
pub const SELECT_ZOOM: u8 = 7;

/// Initial zoom before any data arrives.
pub const INITIAL_ZOOM: u8 = 2;

/// Fly-to animation parameters.
const FLY_DURATION_SECS: f64 = 1.5;
const FLY_EASE_LINEARITY: f64 = 0.5;

/// Permission to apply one fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub kind: FeedKind,
    pub generation: u64,
}

/// Outcome of offering a fetch result to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The result replaced the previous snapshot
    Applied,
    /// A newer result for the same feed was already applied
    Stale,
    /// The dashboard has been torn down
    Closed,
}

/// Issued and applied generations for one feed.
#[derive(Debug, Clone, Copy, Default)]
struct Generations {
    issued: u64,
    applied: u64,
}

/// Load status of the primary (current-day) feed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Animated viewport transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub duration_secs: f64,
    pub ease_linearity: f64,
}

/// Map viewport the page should display.
///
/// `revision` increases on every change so clients replay each fly-to once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    pub transition: Option<Transition>,
    pub revision: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            zoom: INITIAL_ZOOM,
            transition: None,
            revision: 0,
        }
    }
}

impl Viewport {
    fn fly_to(&mut self, event: &SeismicEvent, zoom: u8) {
        self.latitude = event.latitude;
        self.longitude = event.longitude;
        self.zoom = zoom;
        self.transition = Some(Transition {
            duration_secs: FLY_DURATION_SECS,
            ease_linearity: FLY_EASE_LINEARITY,
        });
        self.revision += 1;
    }
}

/// State of one mounted dashboard.
#[derive(Debug)]
pub struct DashboardState {
    current: Vec<SeismicEvent>,
    historical: Vec<SeismicEvent>,
    stats: AggregateStats,
    malformed: usize,
    load: LoadState,
    filter: MagnitudeRange,
    selected: Option<String>,
    viewport: Viewport,
    current_gen: Generations,
    historical_gen: Generations,
    closed: bool,
    revision: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Vec::new(),
            historical: Vec::new(),
            stats: compute_stats(&[]),
            malformed: 0,
            load: LoadState::Loading,
            filter: MagnitudeRange::default(),
            selected: None,
            viewport: Viewport::default(),
            current_gen: Generations::default(),
            historical_gen: Generations::default(),
            closed: false,
            revision: 0,
        }
    }

    /// Monotonic counter bumped on every observable change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Reserve the next generation for a fetch of `kind`.
    pub fn issue_ticket(&mut self, kind: FeedKind) -> RefreshTicket {
        let gens = self.generations_mut(kind);
        gens.issued += 1;
        RefreshTicket {
            kind,
            generation: gens.issued,
        }
    }

    fn generations_mut(&mut self, kind: FeedKind) -> &mut Generations {
        match kind {
            FeedKind::Current => &mut self.current_gen,
            FeedKind::Significant => &mut self.historical_gen,
        }
    }

    /// Admit a ticket if it is newer than anything applied for its feed.
    fn admit(&mut self, ticket: RefreshTicket) -> Applied {
        if self.closed {
            debug!(feed = ticket.kind.as_str(), "dropping result after teardown");
            return Applied::Closed;
        }
        let gens = self.generations_mut(ticket.kind);
        if ticket.generation <= gens.applied {
            debug!(
                feed = ticket.kind.as_str(),
                generation = ticket.generation,
                applied = gens.applied,
                "dropping stale result"
            );
            return Applied::Stale;
        }
        gens.applied = ticket.generation;
        Applied::Applied
    }

    /// Offer a current-day fetch result.
    ///
    /// Success replaces the collection, recomputes stats, clears any error
    /// and recentres the map on the most recent event. Failure switches the
    /// dashboard to the blocking error state; the last collection is kept
    /// for when a later tick recovers.
    pub fn apply_current(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Ingested, FeedError>,
    ) -> Applied {
        let admitted = self.admit(ticket);
        if admitted != Applied::Applied {
            return admitted;
        }

        match result {
            Ok(ingested) => {
                if ingested.malformed > 0 {
                    warn!(
                        malformed = ingested.malformed,
                        "current-day feed contains records with missing magnitude, time or coordinates"
                    );
                }
                self.stats = compute_stats(&ingested.events);
                self.malformed = ingested.malformed;
                self.current = ingested.events;
                if let Some(latest) = self.current.first() {
                    self.viewport.fly_to(latest, REFRESH_ZOOM);
                }
                self.load = LoadState::Ready;
            }
            Err(e) => {
                error!("current-day feed failed: {e}");
                self.load = LoadState::Failed(LOAD_ERROR_MESSAGE.to_string());
            }
        }
        self.revision += 1;
        Applied::Applied
    }

    /// Offer a recent-significant fetch result.
    ///
    /// Failure is logged only; the previous historical snapshot stays.
    pub fn apply_historical(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Ingested, FeedError>,
    ) -> Applied {
        let admitted = self.admit(ticket);
        if admitted != Applied::Applied {
            return admitted;
        }

        match result {
            Ok(ingested) => {
                if ingested.malformed > 0 {
                    warn!(
                        malformed = ingested.malformed,
                        "significant feed contains records with missing magnitude, time or coordinates"
                    );
                }
                self.historical = ingested.events;
                self.revision += 1;
            }
            Err(e) => {
                error!("failed to load historical earthquake data: {e}");
            }
        }
        Applied::Applied
    }

    /// Replace the magnitude filter.
    pub fn set_filter(&mut self, range: MagnitudeRange) {
        self.filter = range;
        self.revision += 1;
    }

    /// Select an event by id and fly the map to it.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::UnknownEvent`] if neither collection holds
    /// the id; the previous selection is kept.
    pub fn select(&mut self, id: &str) -> Result<(), DashboardError> {
        let event = self
            .current
            .iter()
            .chain(&self.historical)
            .find(|e| e.id == id)
            .ok_or_else(|| DashboardError::UnknownEvent(id.to_string()))?;

        self.viewport.fly_to(event, SELECT_ZOOM);
        self.selected = Some(event.id.clone());
        self.revision += 1;
        Ok(())
    }

    /// Mark the dashboard torn down; later results are rejected.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Derive the display data for `now`.
    #[must_use]
    pub fn view_model(&self, now: DateTime<Utc>) -> ViewModel {
        match &self.load {
            LoadState::Loading => ViewModel::Loading,
            LoadState::Failed(message) => ViewModel::Error {
                message: message.clone(),
            },
            LoadState::Ready => ViewModel::Ready(Box::new(Panels {
                stats: StatTiles::from(self.stats),
                filter: self.filter,
                viewport: self.viewport,
                selected_id: self.selected.clone(),
                malformed_records: self.malformed,
                current: self.layer_view(&self.current, Layer::Current, now),
                historical: self.layer_view(&self.historical, Layer::Historical, now),
            })),
        }
    }

    fn layer_view(&self, events: &[SeismicEvent], layer: Layer, now: DateTime<Utc>) -> LayerView {
        let filtered = apply_filter(events, self.filter);
        let histogram = bucketize(&filtered).bars();
        let selected = self.selected.as_deref();

        let markers = filtered
            .iter()
            .map(|e| MarkerView::new(e, layer))
            .collect();
        let list = filtered
            .iter()
            .map(|e| ListItem::new(e, now, selected == Some(e.id.as_str())))
            .collect();

        LayerView {
            layer,
            markers,
            list,
            histogram,
        }
    }
}

/// Everything the page renders, tagged by load status.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ViewModel {
    Loading,
    Error { message: String },
    Ready(Box<Panels>),
}

impl ViewModel {
    /// Panels when ready, `None` while loading or failed.
    #[must_use]
    pub fn panels(&self) -> Option<&Panels> {
        match self {
            Self::Ready(panels) => Some(panels),
            Self::Loading | Self::Error { .. } => None,
        }
    }
}

/// Ready-state content.
#[derive(Debug, Clone, Serialize)]
pub struct Panels {
    pub stats: StatTiles,
    pub filter: MagnitudeRange,
    pub viewport: Viewport,
    pub selected_id: Option<String>,
    pub malformed_records: usize,
    pub current: LayerView,
    pub historical: LayerView,
}

/// The two stat tiles, computed from the unfiltered current-day feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatTiles {
    pub count: usize,
    pub average_magnitude: Option<f64>,
    pub average_display: String,
}

impl From<AggregateStats> for StatTiles {
    fn from(stats: AggregateStats) -> Self {
        Self {
            count: stats.count,
            average_magnitude: stats.average_magnitude,
            average_display: stats.display_average(),
        }
    }
}

/// Markers, list rows and histogram for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct LayerView {
    pub layer: Layer,
    pub markers: Vec<MarkerView>,
    pub list: Vec<ListItem>,
    pub histogram: Vec<HistogramBar>,
}

/// One map marker with its popup text.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerView {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub style: MarkerStyle,
    pub place: String,
    pub magnitude: String,
    pub magnitude_type: Option<String>,
    pub depth: String,
    pub time: String,
    pub url: Option<String>,
}

impl MarkerView {
    fn new(event: &SeismicEvent, layer: Layer) -> Self {
        Self {
            id: event.id.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            style: MarkerStyle::new(event.magnitude, layer),
            place: event.place.clone(),
            magnitude: format!("{:.1}", event.magnitude),
            magnitude_type: event.magnitude_type.clone(),
            depth: format!("{:.1} km", event.depth_km),
            time: event
                .occurred_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".into()),
            url: event.url.clone(),
        }
    }
}

/// One row of the chronological list.
#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub id: String,
    pub magnitude: String,
    pub tier: MarkerTier,
    pub place: String,
    pub time_ago: String,
    pub selected: bool,
}

impl ListItem {
    fn new(event: &SeismicEvent, now: DateTime<Utc>, selected: bool) -> Self {
        Self {
            id: event.id.clone(),
            magnitude: format!("M{:.1}", event.magnitude),
            tier: MarkerTier::for_magnitude(event.magnitude),
            place: event.place.clone(),
            time_ago: event
                .occurred_at()
                .map(|t| time_ago(now, t))
                .unwrap_or_else(|| "unknown".into()),
            selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::filters::tests::event;

    fn ingested(events: Vec<SeismicEvent>) -> Result<Ingested, FeedError> {
        Ok(Ingested {
            events,
            malformed: 0,
        })
    }

    fn failure() -> Result<Ingested, FeedError> {
        Err(FeedError::InvalidResponse("boom".into()))
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(10_000_000).unwrap()
    }

    fn ready(state: &DashboardState) -> Panels {
        match state.view_model(now()) {
            ViewModel::Ready(panels) => *panels,
            other => panic!("expected ready view, got {other:?}"),
        }
    }

    #[test]
    fn test_starts_loading() {
        let state = DashboardState::new();
        assert!(matches!(state.view_model(now()), ViewModel::Loading));
        assert_eq!(state.viewport.zoom, INITIAL_ZOOM);
    }

    #[test]
    fn test_end_to_end_two_events() {
        let mut state = DashboardState::new();
        let ticket = state.issue_ticket(FeedKind::Current);
        let applied = state.apply_current(
            ticket,
            ingested(vec![event("big", 6.2, 9_000_000), event("small", 3.0, 8_000_000)]),
        );
        assert_eq!(applied, Applied::Applied);

        let panels = ready(&state);
        assert_eq!(panels.stats.count, 2);
        assert_eq!(panels.stats.average_display, "4.60");

        let bars = &panels.current.histogram;
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.count == 1));
        let buckets: Vec<i64> = bars.iter().map(|b| b.bucket).collect();
        assert_eq!(buckets, [3, 6]);

        assert_eq!(panels.current.list[0].magnitude, "M6.2");
        assert_eq!(panels.current.list[0].time_ago, "16m ago");
        assert_eq!(panels.current.markers[0].style.tier, MarkerTier::Red);
    }

    #[test]
    fn test_refresh_recentres_on_latest() {
        let mut state = DashboardState::new();
        let mut latest = event("latest", 2.0, 500);
        latest.latitude = -33.0;
        latest.longitude = 151.0;
        let ticket = state.issue_ticket(FeedKind::Current);
        state.apply_current(ticket, ingested(vec![latest, event("older", 1.0, 100)]));

        let viewport = state.viewport;
        assert!((viewport.latitude - (-33.0)).abs() < f64::EPSILON);
        assert!((viewport.longitude - 151.0).abs() < f64::EPSILON);
        assert_eq!(viewport.zoom, REFRESH_ZOOM);
        assert_eq!(viewport.revision, 1);
        assert!(viewport.transition.is_some());
    }

    #[test]
    fn test_empty_refresh_keeps_viewport() {
        let mut state = DashboardState::new();
        let ticket = state.issue_ticket(FeedKind::Current);
        state.apply_current(ticket, ingested(Vec::new()));

        assert_eq!(state.viewport, Viewport::default());
        let panels = ready(&state);
        assert_eq!(panels.stats.count, 0);
        assert_eq!(panels.stats.average_magnitude, None);
    }

    #[test]
    fn test_current_failure_blocks_view() {
        let mut state = DashboardState::new();
        let ticket = state.issue_ticket(FeedKind::Current);
        state.apply_current(ticket, failure());

        match state.view_model(now()) {
            ViewModel::Error { message } => assert_eq!(message, LOAD_ERROR_MESSAGE),
            other => panic!("expected error view, got {other:?}"),
        }

        // The next tick recovers.
        let ticket = state.issue_ticket(FeedKind::Current);
        state.apply_current(ticket, ingested(vec![event("a", 1.0, 1)]));
        assert!(state.view_model(now()).panels().is_some());
    }

    #[test]
    fn test_historical_failure_keeps_current_data() {
        let mut state = DashboardState::new();
        let current = state.issue_ticket(FeedKind::Current);
        state.apply_current(current, ingested(vec![event("a", 5.0, 1)]));

        let first = state.issue_ticket(FeedKind::Significant);
        state.apply_historical(first, ingested(vec![event("h", 7.1, 1)]));

        let second = state.issue_ticket(FeedKind::Significant);
        state.apply_historical(second, failure());

        let panels = ready(&state);
        assert_eq!(panels.current.markers.len(), 1);
        assert_eq!(panels.historical.markers.len(), 1);
        assert_eq!(panels.historical.markers[0].style.color, "red");
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let mut state = DashboardState::new();
        let slow = state.issue_ticket(FeedKind::Current);
        let fast = state.issue_ticket(FeedKind::Current);

        assert_eq!(
            state.apply_current(fast, ingested(vec![event("fresh", 4.0, 2)])),
            Applied::Applied
        );
        assert_eq!(
            state.apply_current(slow, ingested(vec![event("stale", 1.0, 1)])),
            Applied::Stale
        );

        assert_eq!(state.current[0].id, "fresh");
    }

    #[test]
    fn test_generations_are_per_feed() {
        let mut state = DashboardState::new();
        let current = state.issue_ticket(FeedKind::Current);
        let historical = state.issue_ticket(FeedKind::Significant);
        assert_eq!(current.generation, 1);
        assert_eq!(historical.generation, 1);

        state.apply_current(current, ingested(Vec::new()));
        assert_eq!(
            state.apply_historical(historical, ingested(Vec::new())),
            Applied::Applied
        );
    }

    #[test]
    fn test_closed_rejects_results() {
        let mut state = DashboardState::new();
        let ticket = state.issue_ticket(FeedKind::Current);
        state.close();

        assert_eq!(
            state.apply_current(ticket, ingested(vec![event("late", 3.0, 1)])),
            Applied::Closed
        );
        assert!(state.current.is_empty());
    }

    #[test]
    fn test_filter_applies_to_both_layers_not_stats() {
        let mut state = DashboardState::new();
        let current = state.issue_ticket(FeedKind::Current);
        state.apply_current(
            current,
            ingested(vec![event("a", 1.0, 3), event("b", 4.5, 2), event("c", 6.5, 1)]),
        );
        let historical = state.issue_ticket(FeedKind::Significant);
        state.apply_historical(historical, ingested(vec![event("h", 7.0, 1)]));

        state.set_filter(MagnitudeRange::new(4.0, 6.9));
        let panels = ready(&state);

        let ids: Vec<_> = panels.current.list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert!(panels.historical.markers.is_empty());
        assert!(panels.historical.histogram.is_empty());
        assert_eq!(panels.stats.count, 3);
    }

    #[test]
    fn test_select_flies_and_highlights() {
        let mut state = DashboardState::new();
        let current = state.issue_ticket(FeedKind::Current);
        state.apply_current(current, ingested(vec![event("a", 2.0, 2), event("b", 3.0, 1)]));
        let historical = state.issue_ticket(FeedKind::Significant);
        let mut far = event("h", 7.0, 1);
        far.latitude = 61.0;
        state.apply_historical(historical, ingested(vec![far]));

        state.select("b").expect("select b");
        state.select("h").expect("select h");

        assert_eq!(state.selected.as_deref(), Some("h"));
        let viewport = state.viewport;
        assert_eq!(viewport.zoom, SELECT_ZOOM);
        assert!((viewport.latitude - 61.0).abs() < f64::EPSILON);

        let panels = ready(&state);
        assert!(panels.current.list.iter().all(|i| !i.selected));
        assert!(panels.historical.list[0].selected);
    }

    #[test]
    fn test_select_unknown_is_rejected() {
        let mut state = DashboardState::new();
        let current = state.issue_ticket(FeedKind::Current);
        state.apply_current(current, ingested(vec![event("a", 2.0, 2)]));
        state.select("a").expect("select a");
        let revision = state.revision();

        assert_eq!(
            state.select("nope"),
            Err(DashboardError::UnknownEvent("nope".into()))
        );
        assert_eq!(state.selected.as_deref(), Some("a"));
        assert_eq!(state.revision(), revision);
    }
}
