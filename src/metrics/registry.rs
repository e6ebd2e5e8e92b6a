use std::sync::Arc;

use super::series::{Counter, Histogram};
use super::MetricsError;

/// What `/metrics` should serve for the current registry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// The registry has no backing implementation.
    Disabled,
    /// Text exposition of every registered series.
    Document(String),
}

/// Process-wide metric store. Chosen once at start-up; request handlers
/// only ever see `Arc<dyn MetricsRegistry>` and never branch on which
/// implementation is active.
pub trait MetricsRegistry: Send + Sync + 'static {
    /// Registers (or looks up) a counter. Idempotent per name.
    fn counter(&self, name: &str, help: &str, label_names: &[&str]) -> Counter;

    /// Registers (or looks up) a histogram. Idempotent per name; the
    /// buckets of the first registration win.
    fn histogram(&self, name: &str, help: &str, label_names: &[&str], buckets: &[f64])
        -> Histogram;

    fn snapshot(&self) -> Result<Snapshot, MetricsError>;

    fn is_enabled(&self) -> bool;
}

pub type SharedRegistry = Arc<dyn MetricsRegistry>;

/// Picks the active or no-op registry. Without the `prometheus` feature
/// there is nothing to back an active registry, so metrics stay off.
pub fn select(enabled: bool) -> SharedRegistry {
    if !enabled {
        tracing::warn!("metrics registry disabled, /metrics will answer 503");
        return Arc::new(NoopRegistry);
    }

    #[cfg(feature = "prometheus")]
    {
        Arc::new(super::ActiveRegistry::new())
    }
    #[cfg(not(feature = "prometheus"))]
    {
        tracing::warn!("built without the prometheus feature, /metrics will answer 503");
        Arc::new(NoopRegistry)
    }
}

// ─── No-op registry ──────────────────────────────────────────────

/// Stand-in used when metrics are switched off. Hands out detached
/// handles and reports itself as disabled.
pub struct NoopRegistry;

impl MetricsRegistry for NoopRegistry {
    fn counter(&self, _name: &str, _help: &str, _label_names: &[&str]) -> Counter {
        Counter::detached()
    }

    fn histogram(
        &self,
        _name: &str,
        _help: &str,
        _label_names: &[&str],
        _buckets: &[f64],
    ) -> Histogram {
        Histogram::detached()
    }

    fn snapshot(&self) -> Result<Snapshot, MetricsError> {
        Ok(Snapshot::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
