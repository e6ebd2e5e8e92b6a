use std::any::Any;
use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

// ─── HTTP-facing errors ──────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("not found")]
    NotFound,
}

/// Carried on a failed response so the instrumentation layer can report
/// the error after the request has been counted.
#[derive(Debug, Clone)]
pub struct ReportedFailure(pub String);

fn internal_error(detail: String) -> Response {
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    response.extensions_mut().insert(ReportedFailure(detail));
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Render(err) => internal_error(err.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        }
    }
}

/// Panic handler for `CatchPanicLayer`: a panicking handler answers like
/// any other unhandled error.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else {
        "non-string panic payload".to_owned()
    };
    internal_error(format!("handler panicked: {detail}"))
}

/// Failure reported by the page renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot read document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Engine(String),
}

// ─── Start-up errors ─────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read filter config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid filter config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid private range {0:?}")]
    Range(String),

    #[error("invalid listen address {0:?}")]
    ListenAddr(String),
}

// ─── Analytics client errors ─────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("fetching metrics failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics endpoint answered {0}")]
    Status(u16),

    #[error("metrics disabled on the server")]
    Disabled,
}
