use axum::{
    http::{header, HeaderName, HeaderValue},
    middleware as axum_mw,
    routing::{any, get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::assets;
use crate::error::panic_response;
use crate::handlers;
use crate::metrics::exposition;
use crate::middleware::instrument;
use crate::AppState;

/// Builds the full Axum `Router`: own endpoints, asset directory, page
/// rendering fallback, and the global layers.
pub fn create_router(state: Arc<AppState>) -> Router {
    let pages: MethodRouter = any(handlers::pages::render_page).with_state(state.clone());

    Router::new()
        // ── Edge endpoints ──────────────────────────────────────
        .route("/_health", get(handlers::health::health))
        .route("/metrics", get(exposition::get_metrics))
        // ── Built assets, then rendered pages ───────────────────
        .fallback_service(assets::serve(&state.static_dir, pages))
        .with_state(state.clone())
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum_mw::from_fn(assets::cache_headers))
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
        // Outermost, so the recorded status is the one the client sees.
        .layer(axum_mw::from_fn_with_state(state, instrument))
}
