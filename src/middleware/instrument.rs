use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};

use super::client_ip;
use crate::error::ReportedFailure;
use crate::metrics::{HttpInstruments, MetricsError};
use crate::visitor::VisitorFilter;
use crate::AppState;

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request bookkeeping created by [`on_request`], consumed by
/// [`on_response`].
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: String,
    pub start: Option<Instant>,
}

/// What the response hook needs to know about a request that has already
/// been handed to the router.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: Method,
    pub path: String,
    pub authority: Option<String>,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
}

impl RequestView {
    pub fn of(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            authority: req.uri().authority().map(|a| a.as_str().to_owned()),
            headers: req.headers().clone(),
            peer: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }
}

// ─── Hooks ───────────────────────────────────────────────────────

/// Reuses an inbound `x-request-id` or mints a UUID, and starts the clock.
pub fn on_request(req: &Request) -> RequestRecord {
    let id = req
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    RequestRecord {
        id,
        start: Some(Instant::now()),
    }
}

/// Counts the request, observes its duration when the start is known, and
/// counts a visit when the classifier accepts it.
pub fn on_response(
    instruments: &HttpInstruments,
    filter: &VisitorFilter,
    view: &RequestView,
    record: &RequestRecord,
    status: u16,
) -> Result<(), MetricsError> {
    let client_ip = client_ip::client_ip(&view.headers, view.peer);
    let domain = client_ip::domain(&view.headers, view.authority.as_deref());
    let status = status.to_string();
    let labels = [
        view.method.as_str(),
        view.path.as_str(),
        status.as_str(),
        client_ip.as_str(),
        domain.as_str(),
    ];

    instruments.requests.inc(&labels)?;
    if let Some(start) = record.start {
        instruments
            .duration
            .observe(&labels, start.elapsed().as_secs_f64())?;
    }

    let user_agent = view
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if filter.should_count(&view.path, &client_ip, user_agent) {
        let country = filter.country_of(&client_ip, &view.headers);
        instruments.visitors.inc(&[
            client_ip.as_str(),
            domain.as_str(),
            view.path.as_str(),
            user_agent,
            country.as_str(),
        ])?;
    }
    Ok(())
}

/// [`on_response`] with failures logged and dropped.
pub fn record_best_effort(
    instruments: &HttpInstruments,
    filter: &VisitorFilter,
    view: &RequestView,
    record: &RequestRecord,
    status: u16,
) {
    if let Err(err) = on_response(instruments, filter, view, record, status) {
        tracing::warn!(request_id = %record.id, error = %err, "instrumentation skipped");
    }
}

// ─── Middleware ──────────────────────────────────────────────────

/// Wraps every request: id propagation, metrics, one log line.
pub async fn instrument(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let record = on_request(&req);
    let view = RequestView::of(&req);

    let mut response = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&record.id) {
        response.headers_mut().insert(REQUEST_ID.clone(), val);
    }

    let status = response.status().as_u16();
    record_best_effort(&state.instruments, &state.filter, &view, &record, status);

    // Metrics first, then error reporting.
    if let Some(failure) = response.extensions_mut().remove::<ReportedFailure>() {
        tracing::error!(
            request_id = %record.id,
            path = %view.path,
            error = %failure.0,
            "unhandled error while rendering"
        );
    }

    let elapsed_ms = record
        .start
        .map(|s| s.elapsed().as_secs_f64() * 1000.0)
        .unwrap_or_default();
    if state.filter.is_asset(&view.path) || view.path == "/metrics" {
        tracing::debug!(
            request_id = %record.id,
            "{status} {} {} {elapsed_ms:.2}ms",
            view.method,
            view.path
        );
    } else {
        tracing::info!(
            request_id = %record.id,
            "{status} {} {} {elapsed_ms:.2}ms",
            view.method,
            view.path
        );
    }

    response
}

#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::metrics::{ActiveRegistry, MetricsRegistry};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn view(path: &str, pairs: &[(&'static str, &'static str)]) -> RequestView {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, HeaderValue::from_static(v));
        }
        RequestView {
            method: Method::GET,
            path: path.into(),
            authority: None,
            headers,
            peer: None,
        }
    }

    fn setup() -> (HttpInstruments, VisitorFilter) {
        let registry = ActiveRegistry::new();
        let instruments = HttpInstruments::register(&registry as &dyn MetricsRegistry);
        let filter = VisitorFilter::from_config(&FilterConfig::default()).unwrap();
        (instruments, filter)
    }

    #[test]
    fn inbound_request_id_is_reused() {
        let req = HttpRequest::builder()
            .uri("/")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let record = on_request(&req);
        assert_eq!(record.id, "abc-123");
        assert!(record.start.is_some());
    }

    #[test]
    fn missing_request_id_is_generated() {
        let req = HttpRequest::builder().uri("/").body(Body::empty()).unwrap();
        let record = on_request(&req);
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn unknown_start_still_counts_the_request() {
        let (instruments, filter) = setup();
        let v = view("/about", &[("host", "example.com"), ("x-real-ip", "8.8.8.8")]);
        let record = RequestRecord {
            id: "r".into(),
            start: None,
        };
        on_response(&instruments, &filter, &v, &record, 200).unwrap();

        let labels = ["GET", "/about", "200", "8.8.8.8", "example.com"];
        assert_eq!(instruments.requests.get(&labels), Some(1));
        assert!(instruments.duration.get(&labels).is_none());
    }

    #[test]
    fn private_caller_counted_but_not_a_visitor() {
        let (instruments, filter) = setup();
        let v = view("/", &[("host", "example.com"), ("x-forwarded-for", "10.0.0.5")]);
        let record = RequestRecord {
            id: "r".into(),
            start: Some(Instant::now()),
        };
        on_response(&instruments, &filter, &v, &record, 200).unwrap();

        let labels = ["GET", "/", "200", "10.0.0.5", "example.com"];
        assert_eq!(instruments.requests.get(&labels), Some(1));
        assert_eq!(instruments.duration.get(&labels).unwrap().count, 1);
        assert_eq!(
            instruments
                .visitors
                .get(&["10.0.0.5", "example.com", "/", "", "LOCAL"]),
            None
        );
    }

    #[test]
    fn public_browser_becomes_a_visitor() {
        let (instruments, filter) = setup();
        let v = view(
            "/",
            &[
                ("host", "example.com:443"),
                ("x-forwarded-for", "8.8.8.8"),
                ("user-agent", "Mozilla/5.0 Firefox/128.0"),
                ("cf-ipcountry", "pt"),
            ],
        );
        let record = RequestRecord {
            id: "r".into(),
            start: Some(Instant::now()),
        };
        on_response(&instruments, &filter, &v, &record, 200).unwrap();
        on_response(&instruments, &filter, &v, &record, 200).unwrap();

        assert_eq!(
            instruments.visitors.get(&[
                "8.8.8.8",
                "example.com",
                "/",
                "Mozilla/5.0 Firefox/128.0",
                "PT"
            ]),
            Some(2)
        );
    }

    #[test]
    fn authority_supplies_domain_without_host() {
        let (instruments, filter) = setup();
        let mut v = view("/", &[("x-forwarded-for", "8.8.8.8")]);
        v.authority = Some("example.com".into());
        let record = RequestRecord {
            id: "r".into(),
            start: None,
        };
        on_response(&instruments, &filter, &v, &record, 200).unwrap();

        let labels = ["GET", "/", "200", "8.8.8.8", "example.com"];
        assert_eq!(instruments.requests.get(&labels), Some(1));
    }

    #[test]
    fn best_effort_swallows_failures() {
        let registry = ActiveRegistry::new();
        // Same name, fewer labels: every increment fails on arity.
        let _ = registry.counter("http_requests_total", "", &["method"]);
        let instruments = HttpInstruments::register(&registry as &dyn MetricsRegistry);
        let filter = VisitorFilter::from_config(&FilterConfig::default()).unwrap();
        let v = view("/", &[]);
        let record = RequestRecord {
            id: "r".into(),
            start: None,
        };
        assert!(on_response(&instruments, &filter, &v, &record, 200).is_err());
        record_best_effort(&instruments, &filter, &v, &record, 200);
    }
}
