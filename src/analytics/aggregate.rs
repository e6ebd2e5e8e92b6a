use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::flags::flag_for;
use super::parser::{MetricRecord, ParsedMetrics};

/// Top-N sizes for the ranked views.
pub const TOP_IPS: usize = 20;
pub const TOP_ROUTES: usize = 10;
pub const TOP_BREAKDOWN_IPS: usize = 10;
pub const TOP_VISITORS: usize = 10;

/// Visits of one (client IP, domain, route) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitorAggregate {
    pub ip: String,
    pub domain: String,
    pub route: String,
    pub visits: u64,
    pub user_agent: String,
    pub country: String,
    pub flag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub key: String,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryTally {
    pub country: String,
    pub flag: String,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopVisitor {
    pub ip: String,
    pub visits: u64,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainBreakdown {
    pub name: String,
    pub visits: u64,
    pub routes: Vec<Tally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpBreakdown {
    pub ip: String,
    pub visits: u64,
    pub domains: Vec<DomainBreakdown>,
}

fn visits_of(record: &MetricRecord) -> u64 {
    if record.value.is_finite() && record.value > 0.0 {
        record.value as u64
    } else {
        0
    }
}

/// Folds visitor series into one aggregate per (IP, domain, route), summing
/// counts. User agent and country are the last ones seen in document order.
/// Result is ordered by visits, descending; ties keep first-seen order.
pub fn aggregate(records: &[MetricRecord]) -> Vec<VisitorAggregate> {
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut out: Vec<VisitorAggregate> = Vec::new();

    for record in records {
        let ip = record.label("client_ip").unwrap_or_default().to_owned();
        let domain = record.label("domain").unwrap_or_default().to_owned();
        let route = record.label("route").unwrap_or_default().to_owned();
        let user_agent = record.label("user_agent").unwrap_or_default().to_owned();
        let country = record
            .label("country")
            .filter(|c| !c.is_empty())
            .unwrap_or("Unknown")
            .to_owned();

        let key = (ip, domain, route);
        match index.get(&key) {
            Some(&i) => {
                let entry = &mut out[i];
                entry.visits += visits_of(record);
                entry.user_agent = user_agent;
                entry.flag = flag_for(&country);
                entry.country = country;
            }
            None => {
                index.insert(key.clone(), out.len());
                let (ip, domain, route) = key;
                out.push(VisitorAggregate {
                    ip,
                    domain,
                    route,
                    visits: visits_of(record),
                    user_agent,
                    flag: flag_for(&country),
                    country,
                });
            }
        }
    }

    out.sort_by(|a, b| b.visits.cmp(&a.visits));
    out
}

/// Sums visits per key, keeping first-seen order for ties, sorted descending.
fn tally<'a>(items: impl Iterator<Item = (&'a str, u64)>) -> Vec<Tally> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<Tally> = Vec::new();
    for (key, visits) in items {
        match index.get(key) {
            Some(&i) => out[i].visits += visits,
            None => {
                index.insert(key, out.len());
                out.push(Tally {
                    key: key.to_owned(),
                    visits,
                });
            }
        }
    }
    out.sort_by(|a, b| b.visits.cmp(&a.visits));
    out
}

pub fn by_ip(visitors: &[VisitorAggregate], limit: usize) -> Vec<Tally> {
    let mut ranked = tally(visitors.iter().map(|v| (v.ip.as_str(), v.visits)));
    ranked.truncate(limit);
    ranked
}

pub fn by_domain(visitors: &[VisitorAggregate]) -> Vec<Tally> {
    tally(visitors.iter().map(|v| (v.domain.as_str(), v.visits)))
}

pub fn by_route(visitors: &[VisitorAggregate], limit: usize) -> Vec<Tally> {
    let mut ranked = tally(visitors.iter().map(|v| (v.route.as_str(), v.visits)));
    ranked.truncate(limit);
    ranked
}

pub fn by_country(visitors: &[VisitorAggregate]) -> Vec<CountryTally> {
    tally(visitors.iter().map(|v| (v.country.as_str(), v.visits)))
        .into_iter()
        .map(|t| CountryTally {
            flag: flag_for(&t.key),
            country: t.key,
            visits: t.visits,
        })
        .collect()
}

/// Busiest IPs with every domain they touched.
pub fn top_visitors(visitors: &[VisitorAggregate], limit: usize) -> Vec<TopVisitor> {
    by_ip(visitors, limit)
        .into_iter()
        .map(|t| {
            let mut domains: Vec<String> = Vec::new();
            for v in visitors.iter().filter(|v| v.ip == t.key) {
                if !domains.contains(&v.domain) {
                    domains.push(v.domain.clone());
                }
            }
            TopVisitor {
                ip: t.key,
                visits: t.visits,
                domains,
            }
        })
        .collect()
}

/// IP → domain → route totals for the busiest IPs, each level by visits.
pub fn ip_breakdown(visitors: &[VisitorAggregate], limit: usize) -> Vec<IpBreakdown> {
    by_ip(visitors, limit)
        .into_iter()
        .map(|ip| {
            let mine: Vec<&VisitorAggregate> =
                visitors.iter().filter(|v| v.ip == ip.key).collect();
            let domains = tally(mine.iter().map(|v| (v.domain.as_str(), v.visits)))
                .into_iter()
                .map(|d| DomainBreakdown {
                    routes: tally(
                        mine.iter()
                            .filter(|v| v.domain == d.key)
                            .map(|v| (v.route.as_str(), v.visits)),
                    ),
                    name: d.key,
                    visits: d.visits,
                })
                .collect();
            IpBreakdown {
                ip: ip.key,
                visits: ip.visits,
                domains,
            }
        })
        .collect()
}

// ─── Report ──────────────────────────────────────────────────────

/// Everything the analytics page shows, derived from one fetch.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorReport {
    pub generated_at: DateTime<Utc>,
    pub total_requests: u64,
    pub total_visits: u64,
    pub visitors: Vec<VisitorAggregate>,
    pub by_ip: Vec<Tally>,
    pub by_domain: Vec<Tally>,
    pub by_route: Vec<Tally>,
    pub by_country: Vec<CountryTally>,
    pub top_visitors: Vec<TopVisitor>,
    pub ip_breakdown: Vec<IpBreakdown>,
}

impl VisitorReport {
    pub fn build(parsed: &ParsedMetrics, generated_at: DateTime<Utc>) -> Self {
        let visitors = aggregate(parsed.visitor_requests());
        Self {
            generated_at,
            total_requests: parsed.http_requests().iter().map(visits_of).sum(),
            total_visits: visitors.iter().map(|v| v.visits).sum(),
            by_ip: by_ip(&visitors, TOP_IPS),
            by_domain: by_domain(&visitors),
            by_route: by_route(&visitors, TOP_ROUTES),
            by_country: by_country(&visitors),
            top_visitors: top_visitors(&visitors, TOP_VISITORS),
            ip_breakdown: ip_breakdown(&visitors, TOP_BREAKDOWN_IPS),
            visitors,
        }
    }

    /// Plain-text rendering for the terminal.
    pub fn to_text(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "Visitor analytics @ {}", self.generated_at.to_rfc3339());
        let _ = writeln!(
            out,
            "  {} requests, {} counted visits, {} visitor rows",
            self.total_requests,
            self.total_visits,
            self.visitors.len()
        );

        let _ = writeln!(out, "\nTop IPs");
        for t in &self.by_ip {
            let _ = writeln!(out, "  {:<40} {:>8}", t.key, t.visits);
        }
        let _ = writeln!(out, "\nTop visitors");
        for v in &self.top_visitors {
            let _ = writeln!(out, "  {:<40} {:>8}  {}", v.ip, v.visits, v.domains.join(", "));
        }
        let _ = writeln!(out, "\nDomains");
        for t in &self.by_domain {
            let _ = writeln!(out, "  {:<40} {:>8}", t.key, t.visits);
        }
        let _ = writeln!(out, "\nTop routes");
        for t in &self.by_route {
            let _ = writeln!(out, "  {:<40} {:>8}", t.key, t.visits);
        }
        let _ = writeln!(out, "\nCountries");
        for c in &self.by_country {
            let _ = writeln!(out, "  {} {:<37} {:>8}", c.flag, c.country, c.visits);
        }
        out
    }
}
