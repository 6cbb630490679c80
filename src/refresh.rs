//! Mount-scoped dashboard context and feed refresh scheduling.
//!
//! [`mount`] creates a [`Dashboard`], fetches the significant feed once and
//! starts a timer that refreshes the current-day feed every interval. The
//! returned [`Mount`] owns the timer; dropping it or calling
//! [`Mount::teardown`] stops the timer and closes the dashboard so that
//! fetches still in flight cannot write into it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::{FeedKind, FeedSource};
use crate::dashboard::{Applied, DashboardState, ViewModel};
use crate::errors::DashboardError;
use crate::filters::MagnitudeRange;

/// Current-day refresh period.
pub const DEFAULT_REFRESH_SECS: u64 = 300;

/// Capacity of the revision broadcast channel.
const UPDATE_CAPACITY: usize = 64;

/// Refresh scheduling options.
#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
        }
    }
}

/// Shared handle to one dashboard's state.
///
/// Cheap to clone; every clone sees the same state and update channel.
///
/// `closed` mirrors the state's own flag so a synchronous drop can close
/// the dashboard without waiting on the lock.
#[derive(Clone)]
pub struct Dashboard {
    state: Arc<RwLock<DashboardState>>,
    updates: broadcast::Sender<u64>,
    closed: Arc<AtomicBool>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(DashboardState::new())),
            updates,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to state revisions.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Announce a new revision. Having no subscribers is not an error.
    fn publish(&self, revision: u64) {
        let _ = self.updates.send(revision);
    }

    /// Derive the view-model as of `now`.
    pub async fn view_model(&self, now: DateTime<Utc>) -> ViewModel {
        self.state.read().await.view_model(now)
    }

    /// Replace the magnitude filter.
    pub async fn set_filter(&self, range: MagnitudeRange) {
        let revision = {
            let mut state = self.state.write().await;
            state.set_filter(range);
            state.revision()
        };
        debug!(min = range.min, max = range.max, "filter changed");
        self.publish(revision);
    }

    /// Select an event from either collection.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::UnknownEvent`] if the id is not loaded.
    pub async fn select(&self, id: &str) -> Result<(), DashboardError> {
        let revision = {
            let mut state = self.state.write().await;
            state.select(id)?;
            state.revision()
        };
        debug!(id, "event selected");
        self.publish(revision);
        Ok(())
    }

    /// Fetch the current-day feed and apply it if still fresh.
    pub async fn refresh_current<S: FeedSource>(&self, source: &S) -> Applied {
        let ticket = self.state.write().await.issue_ticket(FeedKind::Current);
        let result = source.fetch_current().await;

        let (applied, revision) = {
            let mut state = self.state.write().await;
            if self.closed.load(Ordering::Acquire) {
                state.close();
            }
            let applied = state.apply_current(ticket, result);
            (applied, state.revision())
        };
        if applied == Applied::Applied {
            self.publish(revision);
        }
        applied
    }

    /// Fetch the significant feed and apply it if still fresh.
    pub async fn refresh_historical<S: FeedSource>(&self, source: &S) -> Applied {
        let ticket = self.state.write().await.issue_ticket(FeedKind::Significant);
        let result = source.fetch_historical().await;

        let (applied, revision) = {
            let mut state = self.state.write().await;
            if self.closed.load(Ordering::Acquire) {
                state.close();
            }
            let applied = state.apply_historical(ticket, result);
            (applied, state.revision())
        };
        if applied == Applied::Applied {
            self.publish(revision);
        }
        applied
    }

    /// Reject every result that arrives from now on.
    pub async fn close(&self) {
        self.mark_closed();
        self.state.write().await.close();
    }

    /// Close without taking the lock; results are rejected when offered.
    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// A mounted dashboard and its refresh timer.
pub struct Mount {
    dashboard: Dashboard,
    timer: JoinHandle<()>,
}

impl Mount {
    #[must_use]
    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Stop refreshing and close the dashboard.
    pub async fn teardown(self) {
        self.timer.abort();
        self.dashboard.close().await;
        info!("dashboard torn down");
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.timer.abort();
        self.dashboard.mark_closed();
    }
}

/// Mount a dashboard fed by `source`.
///
/// Must be called from within a tokio runtime.
pub fn mount<S: FeedSource>(source: Arc<S>, config: RefreshConfig) -> Mount {
    let dashboard = Dashboard::new();

    {
        let dashboard = dashboard.clone();
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            dashboard.refresh_historical(source.as_ref()).await;
        });
    }

    info!(
        "refreshing current-day feed every {}s",
        config.interval.as_secs()
    );
    let timer = tokio::spawn(run_timer(dashboard.clone(), source, config.interval));

    Mount { dashboard, timer }
}

/// Spawn a current-day fetch on every tick, the first one immediately.
///
/// Fetches are detached so a slow response may overlap the next tick; the
/// ticket check in [`DashboardState`] keeps the newest result.
async fn run_timer<S: FeedSource>(dashboard: Dashboard, source: Arc<S>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let mut tick_count = 0u64;

    loop {
        ticker.tick().await;
        tick_count += 1;
        debug!(tick = tick_count, "refresh tick");

        let dashboard = dashboard.clone();
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            dashboard.refresh_current(source.as_ref()).await;
        });
    }
}
