//! Application state shared by the HTTP handlers.

use cgroup_exporter::collector::Collector;
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::{CgroupMetrics, ExporterMetrics};

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub registry: Registry,
    pub metrics: CgroupMetrics,
    /// Present unless exporter self-metrics are disabled.
    pub exporter_metrics: Option<ExporterMetrics>,
    pub collector: Arc<Collector>,
    pub paths: Arc<Vec<String>>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Serializes scrapes so a reset never interleaves with another export.
    pub scrape_lock: Mutex<()>,
}

impl AppState {
    /// Builds the registry, metric sets and collector for an effective config.
    pub fn new(config: Config) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = CgroupMetrics::new(&registry)?;
        let exporter_metrics = if config.enable_exporter_metrics.unwrap_or(true) {
            Some(ExporterMetrics::new(&registry)?)
        } else {
            None
        };
        debug!("All metrics registered successfully");

        let collector = Collector::new(config.collector_config());

        Ok(Self {
            registry,
            metrics,
            exporter_metrics,
            collector: Arc::new(collector),
            paths: Arc::new(config.paths()),
            config: Arc::new(config),
            health_stats: Arc::new(HealthStats::new()),
            scrape_lock: Mutex::new(()),
        })
    }
}
