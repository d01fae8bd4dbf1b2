//! Lightweight in-process metrics.
//!
//! Request counters, latency histograms and device memory gauges are stored as
//! atomics and rendered by the `/metrics` handler in Prometheus text format.

pub mod metrics;

pub use metrics::ServiceMetrics;
