use chrono::Utc;
use reqwest::StatusCode;

use super::aggregate::VisitorReport;
use super::parser;
use crate::error::AnalyticsError;

/// Pulls `/metrics` from a running edge and turns it into a report.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    metrics_url: String,
}

impl AnalyticsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            metrics_url: format!("{}/metrics", base_url.trim_end_matches('/')),
        }
    }

    pub fn metrics_url(&self) -> &str {
        &self.metrics_url
    }

    pub async fn fetch(&self) -> Result<String, AnalyticsError> {
        let response = self.http.get(&self.metrics_url).send().await?;
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(AnalyticsError::Disabled);
        }
        if !status.is_success() {
            return Err(AnalyticsError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    /// Fetch, parse and aggregate; rebuilt from scratch on every call.
    pub async fn report(&self) -> Result<VisitorReport, AnalyticsError> {
        let text = self.fetch().await?;
        let parsed = parser::parse(&text);
        Ok(VisitorReport::build(&parsed, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_url_is_normalised() {
        assert_eq!(
            AnalyticsClient::new("http://localhost:4000/").metrics_url(),
            "http://localhost:4000/metrics"
        );
    }
}
