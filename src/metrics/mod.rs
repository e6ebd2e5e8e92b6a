#[cfg(feature = "prometheus")]
mod active;
pub mod exposition;
pub mod instruments;
pub mod registry;
pub mod series;

#[cfg(feature = "prometheus")]
pub use active::ActiveRegistry;
pub use instruments::HttpInstruments;
pub use registry::{select, MetricsRegistry, NoopRegistry, SharedRegistry, Snapshot};
pub use series::{Counter, Histogram, HistogramState};

/// Rejected metric operation. Never reaches a response; the
/// instrumentation hook logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("{metric}: expected {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("{metric}: refusing to observe non-finite value {value}")]
    NonFinite { metric: String, value: f64 },

    #[error("{metric}: {message}")]
    Backend { metric: String, message: String },

    #[error("encoding the exposition document failed: {0}")]
    Encode(String),
}
