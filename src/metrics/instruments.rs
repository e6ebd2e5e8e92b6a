use super::registry::MetricsRegistry;
use super::series::{Counter, Histogram};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const VISITOR_REQUESTS_TOTAL: &str = "visitor_requests_total";

/// Upper bounds (seconds) of the request duration histogram.
pub const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0];

pub const REQUEST_LABELS: &[&str] = &["method", "route", "status", "client_ip", "domain"];
pub const VISITOR_LABELS: &[&str] = &["client_ip", "domain", "route", "user_agent", "country"];

/// The edge server's instruments, registered once and cloned into state.
#[derive(Clone)]
pub struct HttpInstruments {
    pub requests: Counter,
    pub duration: Histogram,
    pub visitors: Counter,
}

impl HttpInstruments {
    pub fn register(registry: &dyn MetricsRegistry) -> Self {
        Self {
            requests: registry.counter(
                HTTP_REQUESTS_TOTAL,
                "Total number of HTTP requests",
                REQUEST_LABELS,
            ),
            duration: registry.histogram(
                HTTP_REQUEST_DURATION_SECONDS,
                "HTTP request duration in seconds",
                REQUEST_LABELS,
                DURATION_BUCKETS,
            ),
            visitors: registry.counter(
                VISITOR_REQUESTS_TOTAL,
                "Requests counted as human visits",
                VISITOR_LABELS,
            ),
        }
    }
}
