use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::Collector;
use prometheus::proto::{Metric, MetricFamily};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use super::registry::{MetricsRegistry, Snapshot};
use super::series::{
    check_arity, Counter, CounterFamily, Histogram, HistogramFamily, HistogramState,
};
use super::MetricsError;

// ─── Prometheus-backed families ──────────────────────────────────

struct PromCounter {
    name: String,
    label_names: Vec<String>,
    vec: IntCounterVec,
}

impl CounterFamily for PromCounter {
    fn inc_by(&self, label_values: &[&str], delta: u64) -> Result<(), MetricsError> {
        check_arity(&self.name, self.label_names.len(), label_values)?;
        let series = self
            .vec
            .get_metric_with_label_values(label_values)
            .map_err(|e| backend_error(&self.name, e))?;
        series.inc_by(delta);
        Ok(())
    }

    fn get(&self, label_values: &[&str]) -> Option<u64> {
        let metric = find_series(&self.vec.collect(), &self.label_names, label_values)?;
        Some(metric.get_counter().get_value() as u64)
    }
}

struct PromHistogram {
    name: String,
    label_names: Vec<String>,
    vec: HistogramVec,
}

impl HistogramFamily for PromHistogram {
    fn observe(&self, label_values: &[&str], value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() {
            return Err(MetricsError::NonFinite {
                metric: self.name.clone(),
                value,
            });
        }
        check_arity(&self.name, self.label_names.len(), label_values)?;
        let series = self
            .vec
            .get_metric_with_label_values(label_values)
            .map_err(|e| backend_error(&self.name, e))?;
        series.observe(value);
        Ok(())
    }

    fn get(&self, label_values: &[&str]) -> Option<HistogramState> {
        let metric = find_series(&self.vec.collect(), &self.label_names, label_values)?;
        let histogram = metric.get_histogram();
        Some(HistogramState {
            buckets: histogram
                .get_bucket()
                .iter()
                .map(|b| b.get_cumulative_count())
                .collect(),
            sum: histogram.get_sample_sum(),
            count: histogram.get_sample_count(),
        })
    }
}

fn backend_error(metric: &str, err: prometheus::Error) -> MetricsError {
    MetricsError::Backend {
        metric: metric.to_owned(),
        message: err.to_string(),
    }
}

/// Reads one series out of a collected family without creating it.
fn find_series(
    families: &[MetricFamily],
    label_names: &[String],
    label_values: &[&str],
) -> Option<Metric> {
    if label_values.len() != label_names.len() {
        return None;
    }
    families
        .iter()
        .flat_map(|family| family.get_metric())
        .find(|metric| {
            label_names.iter().zip(label_values).all(|(name, value)| {
                metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == name && pair.get_value() == *value)
            })
        })
        .cloned()
}

fn owned_names(label_names: &[&str]) -> Vec<String> {
    label_names.iter().map(|n| (*n).to_owned()).collect()
}

// Prometheus rejects an empty HELP string.
fn help_text<'a>(name: &'a str, help: &'a str) -> &'a str {
    if help.trim().is_empty() {
        name
    } else {
        help
    }
}

fn histogram_bounds(buckets: &[f64]) -> Vec<f64> {
    let mut bounds: Vec<f64> = buckets.iter().copied().filter(|b| b.is_finite()).collect();
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();
    bounds
}

#[cfg(target_os = "linux")]
fn register_process_metrics(registry: &Registry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(err) = registry.register(Box::new(collector)) {
        tracing::warn!(error = %err, "process metrics unavailable");
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_metrics(_registry: &Registry) {}

// ─── Active registry ─────────────────────────────────────────────

enum Registered {
    Counter(Counter),
    Histogram(Histogram),
}

/// Registry backed by the `prometheus` crate. Families are exposed sorted
/// by name, series within a family by label values. Process CPU, memory
/// and file-descriptor series are registered alongside the application's
/// own instruments.
pub struct ActiveRegistry {
    registry: Registry,
    families: Mutex<HashMap<String, Registered>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();
        register_process_metrics(&registry);
        Self {
            registry,
            families: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ActiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry for ActiveRegistry {
    fn counter(&self, name: &str, help: &str, label_names: &[&str]) -> Counter {
        let mut families = self.families.lock();
        match families.get(name) {
            Some(Registered::Counter(existing)) => return existing.clone(),
            Some(Registered::Histogram(_)) => {
                tracing::warn!(metric = name, "name already registered as a histogram");
                return Counter::detached();
            }
            None => {}
        }

        let vec = IntCounterVec::new(Opts::new(name, help_text(name, help)), label_names)
            .and_then(|vec| {
                self.registry.register(Box::new(vec.clone()))?;
                Ok(vec)
            });
        let vec = match vec {
            Ok(vec) => vec,
            Err(err) => {
                tracing::warn!(metric = name, error = %err, "counter registration failed");
                return Counter::detached();
            }
        };

        let handle = Counter::attached(Arc::new(PromCounter {
            name: name.to_owned(),
            label_names: owned_names(label_names),
            vec,
        }));
        families.insert(name.to_owned(), Registered::Counter(handle.clone()));
        handle
    }

    fn histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Histogram {
        let mut families = self.families.lock();
        match families.get(name) {
            Some(Registered::Histogram(existing)) => return existing.clone(),
            Some(Registered::Counter(_)) => {
                tracing::warn!(metric = name, "name already registered as a counter");
                return Histogram::detached();
            }
            None => {}
        }

        let opts =
            HistogramOpts::new(name, help_text(name, help)).buckets(histogram_bounds(buckets));
        let vec = HistogramVec::new(opts, label_names).and_then(|vec| {
            self.registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        });
        let vec = match vec {
            Ok(vec) => vec,
            Err(err) => {
                tracing::warn!(metric = name, error = %err, "histogram registration failed");
                return Histogram::detached();
            }
        };

        let handle = Histogram::attached(Arc::new(PromHistogram {
            name: name.to_owned(),
            label_names: owned_names(label_names),
            vec,
        }));
        families.insert(name.to_owned(), Registered::Histogram(handle.clone()));
        handle
    }

    fn snapshot(&self) -> Result<Snapshot, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buffer)
            .map(Snapshot::Document)
            .map_err(|e| MetricsError::Encode(e.to_string()))
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(registry: &ActiveRegistry) -> String {
        match registry.snapshot().unwrap() {
            Snapshot::Document(doc) => doc,
            Snapshot::Disabled => panic!("active registry must produce a document"),
        }
    }

    #[test]
    fn increments_accumulate_on_one_series() {
        let registry = ActiveRegistry::new();
        let c = registry.counter("c_total", "help", &["a", "b"]);
        c.inc(&["x", "y"]).unwrap();
        c.inc_by(&["x", "y"], 4).unwrap();
        c.inc(&["x", "y"]).unwrap();
        c.inc(&["y", "x"]).unwrap();
        assert_eq!(c.get(&["x", "y"]), Some(6));
        assert_eq!(c.get(&["y", "x"]), Some(1));
        assert_eq!(c.get(&["x", "z"]), None);
    }

    #[test]
    fn wrong_label_count_is_rejected() {
        let registry = ActiveRegistry::new();
        let c = registry.counter("c_total", "help", &["a", "b"]);
        let err = c.inc(&["only-one"]).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::LabelArity {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn observation_touches_only_buckets_at_or_above_value() {
        let registry = ActiveRegistry::new();
        let h = registry.histogram("h_seconds", "help", &["route"], &[0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0]);
        h.observe(&["/"], 0.2).unwrap();
        let state = h.get(&["/"]).unwrap();
        assert_eq!(state.buckets, vec![0, 0, 1, 1, 1, 1, 1]);
        assert_eq!(state.count, 1);
        assert!((state.sum - 0.2).abs() < f64::EPSILON);

        h.observe(&["/"], 7.5).unwrap();
        let state = h.get(&["/"]).unwrap();
        assert_eq!(state.buckets, vec![0, 0, 1, 1, 1, 1, 1]);
        assert_eq!(state.count, 2);
        assert!((state.sum - 7.7).abs() < 1e-9);
    }

    #[test]
    fn non_finite_observation_is_rejected() {
        let registry = ActiveRegistry::new();
        let h = registry.histogram("h_seconds", "", &["route"], &[1.0]);
        assert!(h.observe(&["/"], f64::NAN).is_err());
        assert!(h.get(&["/"]).is_none());
    }

    #[test]
    fn bounds_are_sorted_and_deduplicated() {
        assert_eq!(histogram_bounds(&[1.0, 0.5, 1.0, f64::INFINITY]), vec![0.5, 1.0]);
    }

    #[test]
    fn registration_is_idempotent() {
        let registry = ActiveRegistry::new();
        let a = registry.counter("hits_total", "Hits", &["route"]);
        let b = registry.counter("hits_total", "Hits again", &["route"]);
        a.inc(&["/"]).unwrap();
        b.inc(&["/"]).unwrap();

        assert_eq!(a.get(&["/"]), Some(2));
        let doc = document(&registry);
        assert_eq!(doc.matches("# TYPE hits_total counter").count(), 1);
        assert_eq!(doc.matches("hits_total{route=\"/\"} 2").count(), 1);
    }

    #[test]
    fn kind_clash_yields_detached_handle() {
        let registry = ActiveRegistry::new();
        let _ = registry.counter("latency", "", &[]);
        let h = registry.histogram("latency", "", &[], &[1.0]);
        assert!(h.is_detached());
        assert!(h.observe(&[], 0.5).is_ok());
    }

    #[test]
    fn histogram_exposes_buckets_sum_and_count() {
        let registry = ActiveRegistry::new();
        let h = registry.histogram("d_seconds", "Durations", &["route"], &[0.5, 1.0]);
        h.observe(&["/"], 0.25).unwrap();
        h.observe(&["/"], 0.75).unwrap();
        h.observe(&["/"], 4.0).unwrap();

        let doc = document(&registry);
        assert!(doc.contains("# TYPE d_seconds histogram"));
        assert!(doc.contains("d_seconds_bucket{route=\"/\",le=\"0.5\"} 1"));
        assert!(doc.contains("d_seconds_bucket{route=\"/\",le=\"1\"} 2"));
        assert!(doc.contains("d_seconds_bucket{route=\"/\",le=\"+Inf\"} 3"));
        assert!(doc.contains("d_seconds_sum{route=\"/\"} 5"));
        assert!(doc.contains("d_seconds_count{route=\"/\"} 3"));
    }

    #[test]
    fn label_values_are_escaped() {
        let registry = ActiveRegistry::new();
        let c = registry.counter("ua_total", "", &["agent"]);
        c.inc(&["a\"b\\c"]).unwrap();
        let doc = document(&registry);
        assert!(doc.contains(r#"ua_total{agent="a\"b\\c"} 1"#));
    }

    #[test]
    fn snapshot_is_deterministic() {
        let registry = ActiveRegistry::new();
        let c = registry.counter("req_total", "", &["route"]);
        c.inc(&["/b"]).unwrap();
        c.inc(&["/a"]).unwrap();
        let first = document(&registry);
        let second = document(&registry);
        let strip = |doc: &str| {
            doc.lines()
                .filter(|l| l.contains("req_total"))
                .map(str::to_owned)
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first), strip(&second));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_metrics_are_exported() {
        let registry = ActiveRegistry::new();
        let doc = document(&registry);
        assert!(doc.contains("# TYPE process_resident_memory_bytes gauge"));
        assert!(doc.contains("process_cpu_seconds_total"));
    }
}
