use axum::{
    extract::{OriginalUri, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use reactivities_storage::Database;

use crate::problem::ProblemResponse;
use crate::{activities, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self { metrics, storage }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest("/api", api_router())
        .with_state(state)
}

/// Configuration shared by every API resource: mounted under `/api` and
/// answering unknown paths with a problem document.
fn api_router() -> Router<AppState> {
    Router::new()
        .merge(activities::routes())
        .fallback(api_not_found)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

async fn api_not_found(OriginalUri(uri): OriginalUri) -> ProblemResponse {
    ProblemResponse::not_found("route_not_found", format!("no route for {}", uri.path()))
}
