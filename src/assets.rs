use std::path::Path;

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tower_http::services::ServeDir;

/// Cache policy for assets whose names can carry a content hash.
pub const LONG_CACHE: &str = "public, max-age=31536000";

static FINGERPRINTABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(js|css|png|jpg|gif|svg|ico|woff|woff2|ttf|eot)$").expect("static pattern")
});

/// Directory service for the built browser bundle. Anything it cannot
/// answer (missing file, directory, non-GET) goes to `fallback`.
pub fn serve<F>(static_dir: &Path, fallback: F) -> ServeDir<F> {
    ServeDir::new(static_dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(fallback)
}

pub fn cache_policy(path: &str) -> Option<HeaderValue> {
    FINGERPRINTABLE
        .is_match(path)
        .then(|| HeaderValue::from_static(LONG_CACHE))
}

/// Adds the long-lived cache policy to successful asset responses.
/// Rendered pages that happen to match an asset path are left alone.
pub async fn cache_headers(req: Request, next: Next) -> Response {
    let policy = cache_policy(req.uri().path());
    let mut response = next.run(req).await;

    if let Some(value) = policy {
        let status = response.status();
        let rendered = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));
        if (status.is_success() || status == StatusCode::NOT_MODIFIED) && !rendered {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fingerprintable_extensions_are_long_cached() {
        assert!(cache_policy("/main-ABC123.js").is_some());
        assert!(cache_policy("/assets/fonts/inter.woff2").is_some());
        assert!(cache_policy("/index.html").is_none());
        assert!(cache_policy("/cv.pdf").is_none());
        assert!(cache_policy("/").is_none());
    }
}
