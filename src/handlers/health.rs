use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::client_ip::client_ip;
use crate::AppState;

// ─── GET /_health ────────────────────────────────────────────────
/// Liveness probe for the container runtime and internal monitors.
/// Callers outside loopback / private ranges get a plain 404.
pub async fn health(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let network = state.filter.network();

    if network.is_loopback(&ip) || network.is_private(&ip) {
        Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "ok").into_response())
    } else {
        Err(AppError::NotFound)
    }
}
