//! Command-line / environment configuration and the visitor-filter data file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Parser, Debug, Clone)]
#[command(name = "folio-edge", version, about = "HTTP edge for the portfolio site")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Deployment environment; "production" lowers the default log level
    #[arg(long = "env", env = "APP_ENV", default_value = "development", global = true)]
    pub app_env: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch /metrics from a running server and print visitor analytics
    Report(ReportArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Directory holding the built browser assets
    #[arg(long, env = "STATIC_DIR", default_value = "dist/browser")]
    pub static_dir: PathBuf,

    /// Document rendered for every non-asset route (default: <static-dir>/index.html)
    #[arg(long, env = "INDEX_FILE")]
    pub index_file: Option<PathBuf>,

    /// Serve the in-process metrics registry; false selects the no-op registry
    #[arg(long, env = "METRICS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub metrics_enabled: bool,

    /// JSON file overriding the visitor classifier's data lists
    #[arg(long, env = "VISITOR_FILTER_CONFIG")]
    pub filter_config: Option<PathBuf>,
}

impl ServeArgs {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::ListenAddr(raw))
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_file
            .clone()
            .unwrap_or_else(|| self.static_dir.join("index.html"))
    }

    pub fn load_filter(&self) -> Result<FilterConfig, ConfigError> {
        match &self.filter_config {
            Some(path) => FilterConfig::from_file(path),
            None => Ok(FilterConfig::default()),
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReportArgs {
    /// Base URL of the running edge server
    #[arg(long, default_value = "http://127.0.0.1:4000")]
    pub url: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Effective log filter when RUST_LOG is absent.
    pub fn default_log_level(&self) -> String {
        match &self.log_level {
            Some(level) => level.clone(),
            None if self.app_env == "production" => "info".into(),
            None => "debug".into(),
        }
    }
}

// ─── Visitor filter data ─────────────────────────────────────────

/// Hand-maintained lists the visitor classifier and country lookup run on.
/// Every field has a default, so an override file only names what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Extensions (without dot, lower case) that mark a static asset.
    pub asset_extensions: Vec<String>,
    /// Routes that never count as visits.
    pub excluded_routes: Vec<String>,
    /// Literal addresses / host names treated as loopback.
    pub loopback: Vec<String>,
    /// CIDR blocks treated as private network.
    pub private_ranges: Vec<String>,
    /// Case-insensitive user-agent substrings identifying automated clients.
    pub bot_tokens: Vec<String>,
    /// Header carrying the CDN's country code.
    pub cdn_country_header: String,
    /// Value of the CDN header meaning "not known".
    pub unknown_country: String,
    /// Headers consulted, in order, when the CDN header is absent.
    pub fallback_country_headers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            asset_extensions: strings(&[
                "js", "css", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif",
                "bmp", "woff", "woff2", "ttf", "eot", "otf", "zip", "gz", "tar", "rar", "7z",
                "mp4", "webm", "mp3", "wav", "ogg", "pdf", "doc", "docx", "txt", "xml", "json",
            ]),
            excluded_routes: strings(&["/metrics", "/_health"]),
            loopback: strings(&["127.0.0.1", "::1", "localhost"]),
            private_ranges: strings(&["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]),
            bot_tokens: strings(&[
                "bot", "crawler", "spider", "scraper", "monitor", "googlebot", "bingbot",
                "slurp", "duckduckbot", "baiduspider", "yandex", "facebookexternalhit",
                "twitterbot", "linkedinbot", "whatsapp", "telegrambot", "discordbot",
                "slackbot", "applebot", "semrush", "ahrefs", "mj12bot", "uptimerobot",
                "pingdom", "statuscake", "headlesschrome", "lighthouse", "curl", "wget",
                "python-requests", "python-urllib", "go-http-client", "okhttp", "axios",
                "node-fetch", "libwww-perl", "httpie", "postman",
            ]),
            cdn_country_header: "cf-ipcountry".into(),
            unknown_country: "XX".into(),
            fallback_country_headers: strings(&[
                "cloudfront-viewer-country",
                "x-vercel-ip-country",
                "x-country-code",
                "x-geo-country",
            ]),
        }
    }
}

impl FilterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = FilterConfig::from_json(r#"{ "bot_tokens": ["robot"] }"#).unwrap();
        assert_eq!(cfg.bot_tokens, vec!["robot".to_string()]);
        assert_eq!(cfg.cdn_country_header, "cf-ipcountry");
        assert!(cfg.private_ranges.contains(&"10.0.0.0/8".to_string()));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FilterConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn serve_is_the_default_command() {
        let args = Args::parse_from([
            "folio-edge",
            "--port",
            "8080",
            "--static-dir",
            "public",
        ]);
        assert!(args.command.is_none());
        assert_eq!(args.serve.port, 8080);
        assert_eq!(args.serve.index_path(), PathBuf::from("public/index.html"));
        assert_eq!(args.serve.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn metrics_can_be_switched_off() {
        let args = Args::parse_from(["folio-edge", "--metrics-enabled", "false"]);
        assert!(!args.serve.metrics_enabled);
    }

    #[test]
    fn report_subcommand() {
        let args = Args::parse_from(["folio-edge", "report", "--url", "http://edge:4000", "--json"]);
        let Some(Command::Report(report)) = args.command else {
            panic!("expected report");
        };
        assert_eq!(report.url, "http://edge:4000");
        assert!(report.json);
    }

    fn args_for(app_env: &str, log_level: Option<&str>) -> Args {
        let mut args = Args::parse_from(["folio-edge"]);
        args.app_env = app_env.into();
        args.log_level = log_level.map(str::to_owned);
        args
    }

    #[test]
    fn production_defaults_to_info() {
        assert_eq!(args_for("production", None).default_log_level(), "info");
        assert_eq!(args_for("development", None).default_log_level(), "debug");
        assert_eq!(args_for("production", Some("warn")).default_log_level(), "warn");
    }
}
