//! HTTP endpoint handlers for the exporter.
//!
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/`: Landing page

pub mod health;
pub mod index;
pub mod metrics;

pub use health::health_handler;
pub use index::index_handler;
pub use metrics::metrics_handler;
