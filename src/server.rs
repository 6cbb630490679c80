//! Web server for the quakeboard dashboard.
//!
//! Serves the derived view-model to a single embedded page:
//! - Axum for HTTP
//! - JSON view-model at `/api/view`, recomputed per request
//! - SSE revision notifications so the page refetches on change
//! - Leaflet in the browser for tiles and markers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::client::UsgsClient;
use crate::dashboard::ViewModel;
use crate::errors::DashboardError;
use crate::filters::MagnitudeRange;
use crate::refresh::{Dashboard, RefreshConfig, mount};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub base_url: String,
    pub refresh: RefreshConfig,
    pub initial_filter: MagnitudeRange,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            base_url: crate::client::USGS_BASE_URL.to_string(),
            refresh: RefreshConfig::default(),
            initial_filter: MagnitudeRange::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    dashboard: Dashboard,
}

impl AppState {
    #[must_use]
    pub fn new(dashboard: Dashboard) -> Self {
        Self { dashboard }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/view", get(view_handler))
        .route("/api/filter", post(filter_handler))
        .route("/api/select/{id}", post(select_handler))
        .route("/stream", get(sse_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server and run until Ctrl+C.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let client = Arc::new(UsgsClient::with_base_url(config.base_url.clone())?);
    let mounted = mount(client, config.refresh);
    mounted.dashboard().set_filter(config.initial_filter).await;

    let app = create_router(AppState::new(mounted.dashboard().clone()));

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakeboard starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    mounted.teardown().await;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML UI.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Current view-model.
async fn view_handler(State(state): State<AppState>) -> Json<ViewModel> {
    Json(state.dashboard.view_model(Utc::now()).await)
}

/// Replace the magnitude filter and return the new view-model.
async fn filter_handler(
    State(state): State<AppState>,
    Json(range): Json<MagnitudeRange>,
) -> Json<ViewModel> {
    state.dashboard.set_filter(range).await;
    Json(state.dashboard.view_model(Utc::now()).await)
}

/// Select an event and return the new view-model.
async fn select_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewModel>, DashboardError> {
    state.dashboard.select(&id).await?;
    Ok(Json(state.dashboard.view_model(Utc::now()).await))
}

/// SSE stream announcing each state revision.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.dashboard.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(revision) => Some(Ok(Event::default()
            .event("revision")
            .data(revision.to_string()))),
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>quakeboard — Global Earthquake Activity</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        main { max-width: 1200px; margin: 0 auto; padding: 16px; }
        .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; margin-bottom: 16px; }
        .card { background: #fff; border: 1px solid #e2e8f0; border-radius: 10px; padding: 16px; }
        .tile-value { font-size: 1.6rem; font-weight: 700; }
        .tile-label { font-size: 0.85rem; color: #64748b; }
        #map { height: 384px; border: 2px solid #3b82f6; border-radius: 10px; }
        .list { height: 384px; overflow-y: auto; border: 2px solid #3b82f6; border-radius: 10px; padding: 8px; background: #fff; }
        .item { padding: 10px; border-radius: 8px; cursor: pointer; }
        .item:hover { background: #dbeafe; }
        .item.selected { background: #bfdbfe; }
        .row { display: flex; justify-content: space-between; }
        .mag { font-weight: 700; }
        .tier-red { color: #dc2626; } .tier-orange { color: #ea580c; }
        .tier-amber { color: #ca8a04; } .tier-green { color: #059669; }
        .ago, .place { font-size: 0.85rem; color: #475569; }
        .bars { display: flex; align-items: flex-end; gap: 6px; height: 200px; }
        .bar { flex: 1; display: flex; flex-direction: column; justify-content: flex-end; align-items: center; height: 100%; font-size: 0.75rem; }
        .bar div { width: 100%; border-radius: 4px 4px 0 0; }
        .range { display: flex; gap: 12px; align-items: center; }
        .error { margin: 16px; padding: 16px; border-radius: 8px; background: #fee2e2; color: #991b1b; }
        .loading { display: flex; height: 100vh; align-items: center; justify-content: center; color: #64748b; }
        #app[hidden], #status[hidden] { display: none; }
    </style>
</head>
<body>
<div id="status" class="loading">Loading…</div>
<main id="app" hidden>
    <h1>Global Earthquake Activity Dashboard</h1>
    <div class="grid">
        <div class="card"><div class="tile-value" id="total">0</div><div class="tile-label">Total Earthquakes (24h)</div></div>
        <div class="card"><div class="tile-value" id="average">NaN</div><div class="tile-label">Average Magnitude</div></div>
    </div>
    <div class="card" style="margin-bottom:16px">
        <div>Magnitude Filter</div>
        <div class="range">
            <input type="range" id="min" min="0" max="10" step="0.1" value="0">
            <input type="range" id="max" min="0" max="10" step="0.1" value="10">
            <span id="range-label">0.0 – 10.0</span>
        </div>
    </div>
    <div class="grid">
        <div id="map"></div>
        <div class="list"><h3>Recent Earthquakes</h3><div id="list"></div></div>
    </div>
    <div class="grid">
        <div class="card"><h3>Magnitude Distribution (24h)</h3><div class="bars" id="hist-current"></div></div>
        <div class="card"><h3>Significant Events (30d)</h3><div class="bars" id="hist-historical"></div></div>
    </div>
    <div class="list"><h3>Significant Earthquakes (30d)</h3><div id="list-historical"></div></div>
</main>
<script>
(function () {
    var map = null, layers = {}, lastViewport = -1;

    function post(url, body) {
        return fetch(url, {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: body ? JSON.stringify(body) : null
        }).then(function (r) { return r.json(); }).then(render);
    }

    function select(id) { post('/api/select/' + encodeURIComponent(id)); }

    function ensureMap() {
        if (map) return;
        map = L.map('map').setView([0, 0], 2);
        L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
            attribution: '&copy; OpenStreetMap contributors'
        }).addTo(map);
        layers.current = L.layerGroup().addTo(map);
        layers.historical = L.layerGroup().addTo(map);
    }

    // Feed text only ever reaches the page through textContent.
    function node(tag, className, text) {
        var el = document.createElement(tag);
        if (className) el.className = className;
        if (text !== undefined && text !== null) el.textContent = text;
        return el;
    }

    function popup(m) {
        var root = node('div');
        root.appendChild(node('b', null, m.place));
        root.appendChild(node('div', null, 'Magnitude: ' + m.magnitude +
            (m.magnitude_type ? ' ' + m.magnitude_type : '')));
        root.appendChild(node('div', null, 'Depth: ' + m.depth));
        root.appendChild(node('div', null, 'Time: ' + m.time));
        if (m.url && /^https?:\/\//.test(m.url)) {
            var link = node('a', null, 'Details');
            link.href = m.url;
            link.target = '_blank';
            link.rel = 'noopener';
            root.appendChild(link);
        }
        return root;
    }

    function drawMarkers(layer) {
        var group = layers[layer.layer];
        group.clearLayers();
        layer.markers.forEach(function (m) {
            if (m.latitude === null || m.longitude === null) return;
            L.circleMarker([m.latitude, m.longitude], {
                radius: m.style.radius, fillColor: m.style.fill_color, color: m.style.color,
                weight: m.style.weight, opacity: m.style.opacity, fillOpacity: m.style.fill_opacity
            }).bindPopup(popup(m))
              .on('click', function () { select(m.id); })
              .addTo(group);
        });
    }

    function drawList(id, layer) {
        var el = document.getElementById(id);
        el.replaceChildren();
        layer.list.forEach(function (item) {
            var div = node('div', 'item' + (item.selected ? ' selected' : ''));
            var row = node('div', 'row');
            row.appendChild(node('span', 'mag tier-' + item.tier, item.magnitude));
            row.appendChild(node('span', 'ago', item.time_ago));
            div.appendChild(row);
            div.appendChild(node('div', 'place', item.place));
            div.onclick = function () { select(item.id); };
            el.appendChild(div);
        });
    }

    function drawHistogram(id, bars, color) {
        var el = document.getElementById(id);
        var tallest = bars.reduce(function (m, b) { return Math.max(m, b.count); }, 0);
        el.replaceChildren();
        bars.forEach(function (b) {
            var bar = node('div', 'bar');
            var fill = node('div');
            fill.style.height = (tallest ? (b.count / tallest) * 100 : 0) + '%';
            fill.style.background = color;
            bar.appendChild(node('span', null, b.count));
            bar.appendChild(fill);
            bar.appendChild(node('span', null, b.label));
            el.appendChild(bar);
        });
    }

    function render(view) {
        var status = document.getElementById('status');
        var app = document.getElementById('app');
        if (view.status !== 'ready') {
            status.hidden = false;
            app.hidden = true;
            status.className = view.status === 'error' ? 'error' : 'loading';
            status.textContent = view.status === 'error' ? view.message : 'Loading…';
            return;
        }
        status.hidden = true;
        app.hidden = false;
        ensureMap();

        document.getElementById('total').textContent = view.stats.count;
        document.getElementById('average').textContent = view.stats.average_display;
        document.getElementById('min').value = view.filter.min;
        document.getElementById('max').value = view.filter.max;
        document.getElementById('range-label').textContent =
            Number(view.filter.min).toFixed(1) + ' – ' + Number(view.filter.max).toFixed(1);

        drawMarkers(view.current);
        drawMarkers(view.historical);
        drawList('list', view.current);
        drawList('list-historical', view.historical);
        drawHistogram('hist-current', view.current.histogram, '#3b82f6');
        drawHistogram('hist-historical', view.historical.histogram, '#6b7280');

        var vp = view.viewport;
        if (vp.revision !== lastViewport && vp.latitude !== null && vp.longitude !== null) {
            lastViewport = vp.revision;
            if (vp.transition) {
                map.flyTo([vp.latitude, vp.longitude], vp.zoom, {
                    duration: vp.transition.duration_secs,
                    easeLinearity: vp.transition.ease_linearity
                });
            } else {
                map.setView([vp.latitude, vp.longitude], vp.zoom);
            }
        }
    }

    function load() { fetch('/api/view').then(function (r) { return r.json(); }).then(render); }

    function onRange() {
        post('/api/filter', {
            min: parseFloat(document.getElementById('min').value),
            max: parseFloat(document.getElementById('max').value)
        });
    }
    document.getElementById('min').addEventListener('change', onRange);
    document.getElementById('max').addEventListener('change', onRange);

    new EventSource('/stream').addEventListener('revision', load);
    setInterval(load, 60000);
    load();
})();
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::refresh::tests::CannedSource;

    async fn loaded_state() -> AppState {
        let dashboard = Dashboard::new();
        let source = CannedSource::new(vec![("us1", 6.2, 2_000), ("us2", 3.0, 1_000)]);
        dashboard.refresh_current(&source).await;
        AppState::new(dashboard)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(AppState::new(Dashboard::new()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_serves_page() {
        let app = create_router(AppState::new(Dashboard::new()));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Magnitude Filter"));
    }

    #[test]
    fn test_page_renders_feed_text_as_text() {
        assert!(!INDEX_HTML.contains("innerHTML"));
        assert!(!INDEX_HTML.contains("insertAdjacentHTML"));
        assert!(INDEX_HTML.contains("bindPopup(popup(m))"));
        assert!(INDEX_HTML.contains("drawList('list-historical', view.historical)"));
    }

    #[tokio::test]
    async fn test_view_passes_markup_through_as_data() {
        let dashboard = Dashboard::new();
        let mut source = CannedSource::new(vec![("us1", 6.2, 2_000)]);
        source.significant = Some(vec![("<img src=x onerror=alert(1)>", 7.0, 10)]);
        dashboard.refresh_historical(&source).await;
        dashboard.refresh_current(&source).await;

        let app = create_router(AppState::new(dashboard));
        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let view = body_json(response).await;
        assert_eq!(
            view["historical"]["list"][0]["place"],
            "near <img src=x onerror=alert(1)>"
        );
    }

    #[tokio::test]
    async fn test_view_loading_before_first_fetch() {
        let app = create_router(AppState::new(Dashboard::new()));
        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "loading");
    }

    #[tokio::test]
    async fn test_view_ready() {
        let app = create_router(loaded_state().await);
        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let view = body_json(response).await;
        assert_eq!(view["status"], "ready");
        assert_eq!(view["stats"]["count"], 2);
        assert_eq!(view["stats"]["average_display"], "4.60");
        assert_eq!(view["current"]["histogram"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_filter_endpoint() {
        let app = create_router(loaded_state().await);
        let request = Request::post("/api/filter")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"min":5.0,"max":10.0}"#))
            .unwrap();
        let view = body_json(app.oneshot(request).await.unwrap()).await;

        assert_eq!(view["current"]["list"].as_array().unwrap().len(), 1);
        assert_eq!(view["current"]["list"][0]["id"], "us1");
        assert_eq!(view["stats"]["count"], 2);
    }

    #[tokio::test]
    async fn test_select_endpoint() {
        let app = create_router(loaded_state().await);

        let request = Request::post("/api/select/us2").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["selected_id"], "us2");
        assert_eq!(view["viewport"]["zoom"], 7);
        assert_eq!(view["current"]["list"][1]["selected"], true);

        let request = Request::post("/api/select/nope").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "unknown event: nope");
    }
}
