//! Metrics collection and reporting using metrics-rs.
//!
//! Library code records through the `metrics` facade; nothing is kept unless
//! a recorder is installed. The CLI installs [`CliRecorder`] for `--metrics`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;
use wacct_corpus::TestCase;

use crate::BackendKind;

// ============================================================================
// Metric descriptions
// ============================================================================

/// Initialize metric descriptions.
///
/// Call this once at startup to register metric descriptions.
pub fn init() {
    describe_counter!(
        "wacct_tests_passed_total",
        Unit::Count,
        "Tests whose backends agreed"
    );
    describe_counter!(
        "wacct_divergences_total",
        Unit::Count,
        "Tests whose backends disagreed"
    );
    describe_gauge!(
        "wacct_build_duration_seconds",
        Unit::Seconds,
        "Wall-clock time of the last compiler build"
    );
    describe_histogram!(
        "wacct_backend_duration_seconds",
        Unit::Seconds,
        "Time to compile and run one test on a backend"
    );
}

// ============================================================================
// Metric recording functions
// ============================================================================

/// Record one backend invocation.
pub fn record_backend(backend: BackendKind, elapsed: Duration) {
    let labels = [("backend", backend.as_str())];
    histogram!("wacct_backend_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// Record a compiler build.
pub fn record_build(elapsed: Duration) {
    gauge!("wacct_build_duration_seconds").set(elapsed.as_secs_f64());
}

/// Record a compared test.
pub fn record_test(case: &TestCase, agreed: bool) {
    let labels = [("chapter", case.chapter.to_string())];
    if agreed {
        counter!("wacct_tests_passed_total", &labels).increment(1);
    } else {
        counter!("wacct_divergences_total", &labels).increment(1);
    }
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct Storage<T> {
    values: RwLock<HashMap<String, T>>,
}

struct CliCounter {
    key: String,
    storage: Arc<Storage<u64>>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<Storage<f64>>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<Storage<Vec<f64>>>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.storage
            .values
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// Recorder that keeps metrics in memory for a summary at exit.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<Storage<u64>>,
    gauges: Arc<Storage<f64>>,
    histograms: Arc<Storage<Vec<f64>>>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install this recorder as the global metrics recorder.
    ///
    /// Returns `None` if a recorder is already installed.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }

    fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            counters: Arc::clone(&self.counters),
            gauges: Arc::clone(&self.gauges),
            histograms: Arc::clone(&self.histograms),
        }
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Handle for reading metrics after installing the CLI recorder.
pub struct CliRecorderHandle {
    counters: Arc<Storage<u64>>,
    gauges: Arc<Storage<f64>>,
    histograms: Arc<Storage<Vec<f64>>>,
}

impl CliRecorderHandle {
    #[must_use]
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    /// Print all collected metrics in a human-readable format.
    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            for (key, value) in sorted(&counters) {
                println!("  {key}: {value}");
            }
            println!();
        }

        if !gauges.is_empty() {
            println!("### Gauges");
            for (key, value) in sorted(&gauges) {
                println!("  {key}: {value:.6}");
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            for (key, values) in sorted(&histograms) {
                if values.is_empty() {
                    continue;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                #[allow(clippy::cast_precision_loss)]
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                println!(
                    "  {key}: count={}, min={min:.6}, max={max:.6}, avg={avg:.6}",
                    values.len()
                );
            }
            println!();
        }
    }
}

fn sorted<T>(map: &HashMap<String, T>) -> Vec<(&String, &T)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}
