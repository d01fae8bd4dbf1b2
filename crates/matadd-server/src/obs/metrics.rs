//! Metrics registry for the service.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap` and
//! atomics. Labels are flattened into sorted key vectors and series are
//! rendered in sorted order so scrapes are deterministic. Histogram state is
//! kept in integer microseconds and rendered in seconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use matadd_core::device::DeviceStat;

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Snapshot `(labels, value)` pairs sorted by label key.
fn sorted<V, T>(map: &DashMap<LabelKey, V>, read: impl Fn(&V) -> T) -> Vec<(LabelKey, T)> {
    let mut rows: Vec<(LabelKey, T)> = map
        .iter()
        .map(|r| (r.key().clone(), read(r.value())))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "counter");
        for (key, val) in sorted(&self.map, |c| c.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(&key), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    /// Overwrite the series value (last write wins).
    pub fn set(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicI64::new(0));
        gauge.store(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Option<i64> {
        self.map.get(&label_key(labels)).map(|g| g.load(Ordering::Relaxed))
    }

    /// Number of distinct label sets.
    pub fn series(&self) -> usize {
        self.map.len()
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "gauge");
        for (key, val) in sorted(&self.map, |g| g.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(&key), val);
        }
    }
}

// Bucket upper bounds in microseconds:
// 5ms 10ms 25ms 50ms 75ms 100ms 250ms 500ms 750ms 1s 2.5s 5s 7.5s 10s
const BUCKETS_MICROS: [u64; 14] = [
    5_000, 10_000, 25_000, 50_000, 75_000, 100_000, 250_000, 500_000, 750_000,
    1_000_000, 2_500_000, 5_000_000, 7_500_000, 10_000_000,
];

fn micros_as_secs(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_micros.fetch_add(micros, Ordering::Relaxed);

        // Cumulative: every bucket whose bound covers the value.
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observation count for one series.
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "histogram");
        let rows = sorted(&self.map, |h| {
            let buckets: Vec<u64> = h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect();
            (buckets, h.count.load(Ordering::Relaxed), h.sum_micros.load(Ordering::Relaxed))
        });

        for (key, (buckets, count, sum)) in rows {
            let labels = label_str(&key);
            let prefix = if labels.is_empty() { String::new() } else { format!("{labels},") };

            for (le, n) in BUCKETS_MICROS.iter().zip(&buckets) {
                let le = micros_as_secs(*le);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, n);
            }
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, micros_as_secs(sum));
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

/// Process-wide metrics shared by every handler.
#[derive(Default)]
pub struct ServiceMetrics {
    pub requests: CounterVec,
    pub request_latency: HistogramVec,
    pub gpu_memory_used: GaugeVec,
    pub gpu_memory_total: GaugeVec,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: &str, method: &str, status: u16) {
        let status = status.to_string();
        self.requests
            .inc(&[("endpoint", endpoint), ("method", method), ("status", &status)]);
    }

    pub fn observe_latency(&self, endpoint: &str, method: &str, elapsed: Duration) {
        self.request_latency
            .observe(&[("endpoint", endpoint), ("method", method)], elapsed);
    }

    /// Publish one device's memory figures, replacing earlier values.
    pub fn set_device_memory(&self, stat: &DeviceStat) {
        let labels = [("gpu_index", stat.gpu.as_str())];
        self.gpu_memory_used
            .set(&labels, i64::try_from(stat.memory_used_mb).unwrap_or(i64::MAX));
        self.gpu_memory_total
            .set(&labels, i64::try_from(stat.memory_total_mb).unwrap_or(i64::MAX));
    }

    pub fn requests_with_status(&self, endpoint: &str, method: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests
            .get(&[("endpoint", endpoint), ("method", method), ("status", &status)])
    }

    /// Render everything in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render(
            "gpu_service_requests_total",
            "Total number of /add requests",
            &mut out,
        );
        self.request_latency.render(
            "gpu_service_request_latency_seconds",
            "Latency for /add",
            &mut out,
        );
        self.gpu_memory_used
            .render("gpu_memory_used_mb", "GPU memory used in MB", &mut out);
        self.gpu_memory_total
            .render("gpu_memory_total_mb", "GPU total memory in MB", &mut out);
        out
    }
}
