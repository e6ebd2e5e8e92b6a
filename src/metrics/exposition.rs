use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::registry::Snapshot;
use crate::AppState;

/// Content type of the text exposition document.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Body served with `503` when the registry is the no-op variant.
pub const DISABLED_BODY: &str = "metrics disabled";

// ─── GET /metrics ────────────────────────────────────────────────

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.snapshot() {
        Ok(Snapshot::Document(body)) => {
            ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
        }
        Ok(Snapshot::Disabled) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            DISABLED_BODY,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}
