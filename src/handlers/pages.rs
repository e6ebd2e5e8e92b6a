use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, Uri},
    response::Html,
};

use crate::error::AppError;
use crate::AppState;

/// Base path the rendered document resolves its assets against.
const BASE_PATH: &str = "/";

// ─── Fallback: every route the asset directory cannot answer ─────

pub async fn render_page(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let url = full_url(&headers, &uri);
    let html = state
        .renderer
        .render(&url, &state.document, BASE_PATH)
        .await?;
    Ok(Html(html))
}

/// `<x-forwarded-proto or http>://<host><path and query>`.
pub fn full_url(headers: &HeaderMap, uri: &Uri) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("{proto}://{host}{path}")
}
