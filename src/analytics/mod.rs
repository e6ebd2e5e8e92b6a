pub mod aggregate;
pub mod client;
pub mod flags;
pub mod parser;

pub use aggregate::{aggregate, VisitorAggregate, VisitorReport};
pub use client::AnalyticsClient;
pub use flags::flag_for;
pub use parser::{parse, MetricRecord, ParsedMetrics};
