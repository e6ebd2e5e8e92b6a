use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";
pub const UNKNOWN: &str = "unknown";

/// First non-empty of: leftmost `x-forwarded-for` entry, `x-real-ip`,
/// the socket peer, `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }

    let real = headers
        .get(REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real {
        return ip.to_owned();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN.to_owned(),
    }
}

/// `Host` header without its port, else the request-target authority
/// (HTTP/2 carries the host there); `"unknown"` when neither is present.
pub fn domain(headers: &HeaderMap, authority: Option<&str>) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(authority)
        .unwrap_or_default();
    let domain = strip_port(host);
    if domain.is_empty() {
        UNKNOWN.to_owned()
    } else {
        domain.to_ascii_lowercase()
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [v6]:port
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
