use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::metrics::instruments::{HTTP_REQUESTS_TOTAL, VISITOR_REQUESTS_TOTAL};

/// Series the analytics views are built from.
pub const METRICS_OF_INTEREST: &[&str] = &[VISITOR_REQUESTS_TOTAL, HTTP_REQUESTS_TOTAL];

static SAMPLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)(?:\{(.*)\})?\s+(\S+)(?:\s+(\S+))?\s*$")
        .expect("static pattern")
});

/// One sample line of the exposition document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    pub timestamp: Option<i64>,
}

impl MetricRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Records grouped by metric name, in document order within each name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetrics {
    by_name: BTreeMap<String, Vec<MetricRecord>>,
}

impl ParsedMetrics {
    pub fn get(&self, name: &str) -> &[MetricRecord] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn visitor_requests(&self) -> &[MetricRecord] {
        self.get(VISITOR_REQUESTS_TOTAL)
    }

    pub fn http_requests(&self) -> &[MetricRecord] {
        self.get(HTTP_REQUESTS_TOTAL)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Parses the metrics the analytics views use; everything else is ignored.
pub fn parse(text: &str) -> ParsedMetrics {
    parse_matching(text, |name| METRICS_OF_INTEREST.contains(&name))
}

/// Parses every sample line whose metric name passes `keep`. Comments,
/// blank lines and malformed lines are skipped.
pub fn parse_matching(text: &str, keep: impl Fn(&str) -> bool) -> ParsedMetrics {
    let mut parsed = ParsedMetrics::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(record) if keep(&record.name) => parsed
                .by_name
                .entry(record.name.clone())
                .or_default()
                .push(record),
            Some(_) => {}
            None => tracing::debug!(line, "skipping malformed metrics line"),
        }
    }
    parsed
}

/// `name{k="v",...} value [timestamp]`
pub fn parse_line(line: &str) -> Option<MetricRecord> {
    let caps = SAMPLE_LINE.captures(line)?;
    let name = caps.get(1)?.as_str().to_owned();
    let labels = match caps.get(2) {
        Some(block) => parse_labels(block.as_str())?,
        None => BTreeMap::new(),
    };
    let value = caps.get(3)?.as_str().parse::<f64>().ok()?;
    let timestamp = match caps.get(4) {
        Some(ts) => Some(ts.as_str().parse::<i64>().ok()?),
        None => None,
    };
    Some(MetricRecord {
        name,
        labels,
        value,
        timestamp,
    })
}

fn parse_labels(block: &str) -> Option<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    let mut chars = block.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            return Some(labels);
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                key.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if chars.next()? != '=' || chars.next()? != '"' {
            return None;
        }

        let mut value = String::new();
        loop {
            match chars.next()? {
                '"' => break,
                '\\' => match chars.next()? {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                c => value.push(c),
            }
        }
        labels.insert(key, value);
    }
}
