//! Web server module for the exporter.
//!
//! Serves the scrape endpoint, a landing page and a liveness probe.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::collector::Orchestrator;
use crate::config::DEFAULT_METRICS_PATH;
use crate::exposition;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics_path: String,
}

impl AppState {
    /// State serving `orchestrator` under the default metrics path.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }

    /// Set the metrics path.
    pub fn with_metrics_path(mut self, metrics_path: impl Into<String>) -> Self {
        self.metrics_path = metrics_path.into();
        self
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    sources: Vec<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.clone();
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route("/healthz", get(healthz_handler))
        .route(&metrics_path, get(metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Landing page linking to the metrics path.
async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        r#"<html>
<head><title>cumulus-exporter (Version {version})</title></head>
<body>
<h1>cumulus-exporter</h1>
<p><a href="{path}">Metrics</a></p>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        path = state.metrics_path,
    ))
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sources: state
            .orchestrator
            .source_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Scrape endpoint: polls every source and renders the text format.
///
/// Source errors never fail the scrape; they are counted in
/// [`exposition::SCRAPE_ERRORS_METRIC`].
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let result = state.orchestrator.poll_all().await;
    let sources = state.orchestrator.source_names();

    match exposition::encode(&result, &sources) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Exposition encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}
