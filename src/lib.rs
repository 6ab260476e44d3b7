//! cgroup metrics collection for Prometheus.
//!
//! The [`collector`] module holds the collection engine; the binary wraps it
//! in an HTTP exporter.

pub mod collector;
