//! USGS Earthquake API client.
//!
//! Provides async HTTP access to the two summary feeds the dashboard
//! consumes. Uses reqwest with rustls for TLS.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::errors::FeedError;
use crate::models::{FeatureCollection, Ingested, ingest};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakeboard/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
pub const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// The two feeds the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Every event from the past day, refreshed periodically
    Current,
    /// Significant events from the past month, fetched once
    Significant,
}

impl FeedKind {
    /// Get the URL path segment for this feed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => "all_day",
            Self::Significant => "significant_month",
        }
    }

    /// Build the summary feed URL under `base_url`.
    #[must_use]
    pub fn url(self, base_url: &str) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            base_url.trim_end_matches('/'),
            self.as_str()
        )
    }
}

/// Anything that can produce a feed document.
///
/// Implemented by [`UsgsClient`] for production and by canned sources in
/// tests.
pub trait FeedSource: Send + Sync + 'static {
    /// Fetch and validate one feed document.
    fn fetch(
        &self,
        kind: FeedKind,
    ) -> impl Future<Output = Result<FeatureCollection, FeedError>> + Send;

    /// Fetch the current-day feed, normalized and sorted.
    fn fetch_current(&self) -> impl Future<Output = Result<Ingested, FeedError>> + Send {
        async move {
            let feed = self.fetch(FeedKind::Current).await?;
            Ok::<_, FeedError>(ingest(&feed))
        }
    }

    /// Fetch the recent-significant feed, normalized and sorted.
    fn fetch_historical(&self) -> impl Future<Output = Result<Ingested, FeedError>> + Send {
        async move {
            let feed = self.fetch(FeedKind::Significant).await?;
            Ok::<_, FeedError>(ingest(&feed))
        }
    }
}

/// Client for USGS earthquake API.
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a client against `base_url`, normally [`USGS_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl FeedSource for UsgsClient {
    #[instrument(skip(self), fields(feed = kind.as_str()))]
    async fn fetch(&self, kind: FeedKind) -> Result<FeatureCollection, FeedError> {
        let url = kind.url(&self.base_url);

        debug!("fetching feed from {}", url);

        let response = self.client.get(&url).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        let feed: FeatureCollection = serde_json::from_slice(&bytes)?;

        // Validate response structure
        feed.validate()?;

        let title = feed
            .metadata
            .as_ref()
            .and_then(|m| m.title.as_deref())
            .unwrap_or(kind.as_str());
        let advertised = feed.metadata.as_ref().and_then(|m| m.count);
        debug!(
            advertised,
            "fetched {} events from {}",
            feed.features.len(),
            title
        );
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_urls() {
        assert_eq!(
            FeedKind::Current.url(USGS_BASE_URL),
            "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_day.geojson"
        );
        assert_eq!(
            FeedKind::Significant.url("http://localhost:9000/"),
            "http://localhost:9000/earthquakes/feed/v1.0/summary/significant_month.geojson"
        );
    }

    #[test]
    fn test_client_builds() {
        assert!(UsgsClient::with_base_url("http://127.0.0.1:1").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let client = UsgsClient::with_base_url("http://127.0.0.1:1").expect("client");
        let result = client.fetch_current().await;
        assert!(matches!(result, Err(FeedError::Http(_))));
    }
}
