use std::collections::HashSet;

use regex::Regex;

use super::network::NetworkPolicy;
use crate::config::FilterConfig;
use crate::error::ConfigError;

/// Decides which completed requests count as human page visits, and
/// (see `country.rs`) which country they came from.
#[derive(Debug, Clone)]
pub struct VisitorFilter {
    asset_pattern: Option<Regex>,
    excluded_routes: HashSet<String>,
    bot_tokens: Vec<String>,
    pub(super) network: NetworkPolicy,
    pub(super) cdn_country_header: String,
    pub(super) unknown_country: String,
    pub(super) fallback_country_headers: Vec<String>,
}

impl VisitorFilter {
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            asset_pattern: asset_pattern(&config.asset_extensions),
            excluded_routes: config.excluded_routes.iter().cloned().collect(),
            bot_tokens: config
                .bot_tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect(),
            network: NetworkPolicy::from_config(config)?,
            cdn_country_header: config.cdn_country_header.to_ascii_lowercase(),
            unknown_country: config.unknown_country.clone(),
            fallback_country_headers: config
                .fallback_country_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn network(&self) -> &NetworkPolicy {
        &self.network
    }

    pub fn should_count(&self, route: &str, client_ip: &str, user_agent: &str) -> bool {
        let path = route.split(['?', '#']).next().unwrap_or(route);

        !(self.is_asset(path)
            || self.excluded_routes.contains(path)
            || self.network.is_loopback(client_ip)
            || self.network.is_private(client_ip)
            || self.is_bot(user_agent))
    }

    pub fn is_asset(&self, path: &str) -> bool {
        self.asset_pattern
            .as_ref()
            .map(|re| re.is_match(path))
            .unwrap_or(false)
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        let ua = user_agent.to_lowercase();
        self.bot_tokens.iter().any(|token| ua.contains(token.as_str()))
    }
}

/// `(?i)\.(ext|ext|...)$` over the configured extensions.
fn asset_pattern(extensions: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\.({})$", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(error = %err, "asset extension pattern rejected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

    fn filter() -> VisitorFilter {
        VisitorFilter::from_config(&FilterConfig::default()).unwrap()
    }

    #[test]
    fn counts_a_public_browser_page_view() {
        assert!(filter().should_count("/", "8.8.8.8", BROWSER));
        assert!(filter().should_count("/projects/apartment", "8.8.8.8", BROWSER));
    }

    #[test]
    fn static_assets_are_excluded() {
        let f = filter();
        for route in [
            "/assets/logo.svg",
            "/main-4F2A.js",
            "/styles.CSS",
            "/fonts/inter.woff2",
            "/cv.pdf",
            "/gallery/photo.jpg?w=200",
        ] {
            assert!(!f.should_count(route, "8.8.8.8", BROWSER), "{route}");
        }
    }

    #[test]
    fn own_endpoints_are_excluded_regardless_of_caller() {
        let f = filter();
        assert!(!f.should_count("/metrics", "8.8.8.8", BROWSER));
        assert!(!f.should_count("/_health", "1.2.3.4", BROWSER));
    }

    #[test]
    fn local_and_private_callers_are_excluded() {
        let f = filter();
        for ip in ["127.0.0.1", "::1", "localhost", "10.0.0.5", "172.20.1.1", "192.168.1.50"] {
            assert!(!f.should_count("/", ip, BROWSER), "{ip}");
        }
        assert!(f.should_count("/", "172.32.1.1", BROWSER));
    }

    #[test]
    fn bots_and_cli_clients_are_excluded() {
        let f = filter();
        for ua in [
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "facebookexternalhit/1.1",
            "curl/8.4.0",
            "python-requests/2.31",
            "UptimeRobot/2.0",
            "SomeCRAWLER",
        ] {
            assert!(!f.should_count("/", "8.8.8.8", ua), "{ua}");
        }
    }

    #[test]
    fn lists_come_from_configuration() {
        let cfg = FilterConfig {
            bot_tokens: vec!["internal-probe".into()],
            asset_extensions: vec![".bin".into()],
            ..FilterConfig::default()
        };
        let f = VisitorFilter::from_config(&cfg).unwrap();
        assert!(f.should_count("/", "8.8.8.8", "curl/8.4.0"));
        assert!(!f.should_count("/", "8.8.8.8", "Internal-Probe/1"));
        assert!(!f.should_count("/blob.bin", "8.8.8.8", BROWSER));
        assert!(f.should_count("/logo.svg", "8.8.8.8", BROWSER));
    }
}
