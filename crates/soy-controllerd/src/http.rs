use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use soy_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
use soy_settings::SettingsStore;
use tracing::warn;

#[derive(Clone)]
pub struct HttpState {
    pub metrics: Arc<PrometheusMetrics>,
    pub settings: SettingsStore,
}

/// Routes:
/// - GET /metrics - Prometheus text exposition
/// - GET /healthz - 200 once settings are loaded, 503 before
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn metrics(State(state): State<HttpState>) -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.gather(), &mut buf) {
        warn!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
        .into_response()
}

async fn healthz(State(state): State<HttpState>) -> Response {
    if state.settings.is_ready() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "settings not loaded").into_response()
    }
}
