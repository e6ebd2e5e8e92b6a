use std::sync::Arc;

use super::MetricsError;

// ─── Backing families ────────────────────────────────────────────

/// All series of one counter, addressed by label values in label-name
/// order. Implemented by the active registry's backend.
pub(crate) trait CounterFamily: Send + Sync {
    fn inc_by(&self, label_values: &[&str], delta: u64) -> Result<(), MetricsError>;

    fn get(&self, label_values: &[&str]) -> Option<u64>;
}

/// All series of one histogram. Bucket bounds are shared by every series.
pub(crate) trait HistogramFamily: Send + Sync {
    fn observe(&self, label_values: &[&str], value: f64) -> Result<(), MetricsError>;

    fn get(&self, label_values: &[&str]) -> Option<HistogramState>;
}

/// Cumulative bucket counts, running sum and observation count of one
/// histogram series. `buckets[i]` counts observations `<= bounds[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramState {
    pub buckets: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

#[cfg_attr(not(feature = "prometheus"), allow(dead_code))]
pub(crate) fn check_arity(
    metric: &str,
    expected: usize,
    label_values: &[&str],
) -> Result<(), MetricsError> {
    if label_values.len() != expected {
        return Err(MetricsError::LabelArity {
            metric: metric.to_owned(),
            expected,
            got: label_values.len(),
        });
    }
    Ok(())
}

// ─── Handles ─────────────────────────────────────────────────────

/// Cheaply cloneable counter handle. A detached handle (no-op registry,
/// or a name already taken by another kind) accepts every call and
/// records nothing.
#[derive(Clone, Default)]
pub struct Counter {
    family: Option<Arc<dyn CounterFamily>>,
}

impl Counter {
    #[cfg_attr(not(feature = "prometheus"), allow(dead_code))]
    pub(crate) fn attached(family: Arc<dyn CounterFamily>) -> Self {
        Self {
            family: Some(family),
        }
    }

    pub fn detached() -> Self {
        Self { family: None }
    }

    pub fn is_detached(&self) -> bool {
        self.family.is_none()
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<(), MetricsError> {
        self.inc_by(label_values, 1)
    }

    pub fn inc_by(&self, label_values: &[&str], delta: u64) -> Result<(), MetricsError> {
        match &self.family {
            Some(family) => family.inc_by(label_values, delta),
            None => Ok(()),
        }
    }

    /// Current value of one series, `None` if it was never touched.
    pub fn get(&self, label_values: &[&str]) -> Option<u64> {
        self.family.as_ref()?.get(label_values)
    }
}

/// Cheaply cloneable histogram handle; see [`Counter`] for detached semantics.
#[derive(Clone, Default)]
pub struct Histogram {
    family: Option<Arc<dyn HistogramFamily>>,
}

impl Histogram {
    #[cfg_attr(not(feature = "prometheus"), allow(dead_code))]
    pub(crate) fn attached(family: Arc<dyn HistogramFamily>) -> Self {
        Self {
            family: Some(family),
        }
    }

    pub fn detached() -> Self {
        Self { family: None }
    }

    pub fn is_detached(&self) -> bool {
        self.family.is_none()
    }

    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<(), MetricsError> {
        match &self.family {
            Some(family) => family.observe(label_values, value),
            None => Ok(()),
        }
    }

    pub fn get(&self, label_values: &[&str]) -> Option<HistogramState> {
        self.family.as_ref()?.get(label_values)
    }
}
