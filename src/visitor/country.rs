use axum::http::HeaderMap;

use super::classifier::VisitorFilter;

/// Country code for loopback / private / unidentified callers.
pub const LOCAL: &str = "LOCAL";
/// Country code when no geo header says anything useful.
pub const UNDETERMINED: &str = "UN";

impl VisitorFilter {
    /// Coarse country of a caller, taken at face value from proxy headers.
    ///
    /// Local callers are `LOCAL`. Otherwise the CDN header is used unless it
    /// carries the unknown sentinel, then the fallback headers in order,
    /// then `UN`.
    pub fn country_of(&self, client_ip: &str, headers: &HeaderMap) -> String {
        if self.network.is_local(client_ip) {
            return LOCAL.to_owned();
        }

        if let Some(code) = header_value(headers, &self.cdn_country_header) {
            if !code.eq_ignore_ascii_case(&self.unknown_country) {
                return code.to_uppercase();
            }
        }

        self.fallback_country_headers
            .iter()
            .filter_map(|name| header_value(headers, name))
            .find(|code| !code.eq_ignore_ascii_case(&self.unknown_country))
            .map(|code| code.to_uppercase())
            .unwrap_or_else(|| UNDETERMINED.to_owned())
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use axum::http::HeaderValue;

    fn filter() -> VisitorFilter {
        VisitorFilter::from_config(&FilterConfig::default()).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn local_callers() {
        let f = filter();
        let cdn = headers(&[("cf-ipcountry", "pt")]);
        assert_eq!(f.country_of("127.0.0.1", &cdn), "LOCAL");
        assert_eq!(f.country_of("192.168.1.50", &cdn), "LOCAL");
        assert_eq!(f.country_of("unknown", &cdn), "LOCAL");
        assert_eq!(f.country_of("", &cdn), "LOCAL");
    }

    #[test]
    fn cdn_header_is_upper_cased() {
        let f = filter();
        assert_eq!(f.country_of("8.8.8.8", &headers(&[("cf-ipcountry", "pt")])), "PT");
    }

    #[test]
    fn sentinel_falls_through_to_alternates() {
        let f = filter();
        let h = headers(&[("cf-ipcountry", "XX"), ("x-vercel-ip-country", "de")]);
        assert_eq!(f.country_of("8.8.8.8", &h), "DE");

        let h = headers(&[("cf-ipcountry", "XX")]);
        assert_eq!(f.country_of("8.8.8.8", &h), "UN");
    }

    #[test]
    fn alternate_headers_in_configured_order() {
        let f = filter();
        let h = headers(&[("x-geo-country", "fr"), ("cloudfront-viewer-country", "es")]);
        assert_eq!(f.country_of("8.8.8.8", &h), "ES");
    }

    #[test]
    fn public_ip_without_headers_is_undetermined() {
        assert_eq!(filter().country_of("8.8.8.8", &HeaderMap::new()), "UN");
    }
}
