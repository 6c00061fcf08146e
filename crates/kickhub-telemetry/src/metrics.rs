use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Type of metric.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
}

/// Point-in-time value of one metric series.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub metric_type: MetricType,
}

/// In-memory counter. Monotonically increasing.
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// In-memory integer gauge. Can go up or down.
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }
    fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }
    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metric key: name + labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.to_string(),
            labels: sorted,
        }
    }
}

/// Thread-safe in-memory metrics recorder.
#[derive(Default)]
pub struct MetricsRecorder {
    counters: RwLock<HashMap<MetricKey, Counter>>,
    gauges: RwLock<HashMap<MetricKey, Gauge>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        let key = MetricKey::new(name, labels);
        // Fast path: series already exists.
        if let Some(counter) = self.counters.read().get(&key) {
            counter.increment(n);
            return;
        }
        self.counters
            .write()
            .entry(key)
            .or_insert_with(Counter::new)
            .increment(n);
    }

    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: i64) {
        let key = MetricKey::new(name, labels);
        if let Some(gauge) = self.gauges.read().get(&key) {
            gauge.set(value);
            return;
        }
        self.gauges.write().entry(key).or_insert_with(Gauge::new).set(value);
    }

    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, labels);
        self.counters.read().get(&key).map_or(0, Counter::get)
    }

    pub fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> i64 {
        let key = MetricKey::new(name, labels);
        self.gauges.read().get(&key).map_or(0, Gauge::get)
    }

    /// All series, sorted by name then labels.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let mut samples: Vec<MetricSample> = Vec::new();
        for (key, counter) in self.counters.read().iter() {
            samples.push(MetricSample {
                name: key.name.clone(),
                labels: key.labels.clone(),
                value: counter.get() as f64,
                metric_type: MetricType::Counter,
            });
        }
        for (key, gauge) in self.gauges.read().iter() {
            samples.push(MetricSample {
                name: key.name.clone(),
                labels: key.labels.clone(),
                value: gauge.get() as f64,
                metric_type: MetricType::Gauge,
            });
        }
        samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_label_set() {
        let m = MetricsRecorder::new();
        m.increment_counter("frames", &[("kind", "a")], 1);
        m.increment_counter("frames", &[("kind", "a")], 2);
        m.increment_counter("frames", &[("kind", "b")], 5);
        assert_eq!(m.counter_value("frames", &[("kind", "a")]), 3);
        assert_eq!(m.counter_value("frames", &[("kind", "b")]), 5);
        assert_eq!(m.counter_value("frames", &[]), 0);
    }

    #[test]
    fn label_order_does_not_matter() {
        let m = MetricsRecorder::new();
        m.increment_counter("x", &[("a", "1"), ("b", "2")], 1);
        m.increment_counter("x", &[("b", "2"), ("a", "1")], 1);
        assert_eq!(m.counter_value("x", &[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn gauge_moves_both_ways() {
        let m = MetricsRecorder::new();
        m.set_gauge("active", &[], 3);
        assert_eq!(m.gauge_value("active", &[]), 3);
        m.set_gauge("active", &[], 1);
        assert_eq!(m.gauge_value("active", &[]), 1);
    }

    #[test]
    fn snapshot_is_sorted_and_typed() {
        let m = MetricsRecorder::new();
        m.set_gauge("b_gauge", &[], 1);
        m.increment_counter("a_counter", &[], 4);
        let snap = m.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a_counter");
        assert_eq!(snap[0].metric_type, MetricType::Counter);
        assert_eq!(snap[0].value, 4.0);
        assert_eq!(snap[1].metric_type, MetricType::Gauge);
    }
}
