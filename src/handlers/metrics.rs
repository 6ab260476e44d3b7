//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs a fresh collection on the blocking pool and exports
//! the resulting snapshot in Prometheus text format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 256 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    CollectionFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::CollectionFailed => "Failed to collect cgroup metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.health_stats.record_http_request();

    let _guard = state.scrape_lock.lock().await;

    let collector = state.collector.clone();
    let paths = state.paths.clone();
    let records = tokio::task::spawn_blocking(move || collector.collect(&paths))
        .await
        .map_err(|e| {
            error!("Collection task failed: {}", e);
            MetricsError::CollectionFailed
        })?;

    // Reset metrics before populating with fresh data
    state.metrics.reset();
    let mut failed = 0u64;
    for record in &records {
        if record.collection_failed {
            failed += 1;
        }
        state.metrics.set_for_group(record);
    }

    let duration = start.elapsed().as_secs_f64();
    if let Some(exporter) = &state.exporter_metrics {
        exporter.scrape_duration.set(duration);
        exporter.groups_total.set(records.len() as f64);
        exporter.groups_failed.set(failed as f64);
    }
    state
        .health_stats
        .record_scrape(records.len() as u64, failed, duration);

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    debug!(
        "Metrics request completed: {} cgroups ({} failed), {} bytes, {:.3}ms",
        records.len(),
        failed,
        buffer.len(),
        duration * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn v1_state(dir: &Path, enable_exporter_metrics: bool) -> SharedState {
        let slice = dir.join("cpuacct/user.slice/user-20821.slice");
        write(&slice.join("cgroup.procs"), "1000\n");
        write(&slice.join("cpuacct.usage"), "831825022\n");
        write(
            &dir.join("memory/user.slice/user-20821.slice/memory.usage_in_bytes"),
            "27115520\n",
        );

        let config = Config {
            paths: Some(vec!["/user.slice".into(), "/dne".into()]),
            cgroup_root: Some(dir.to_path_buf()),
            cgroup_version: Some("v1".into()),
            enable_exporter_metrics: Some(enable_exporter_metrics),
            ..Default::default()
        };
        Arc::new(AppState::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let dir = tempfile::tempdir().unwrap();
        let state = v1_state(dir.path(), true);

        let body = metrics_handler(State(state.clone())).await.unwrap();
        assert!(body.contains(
            "cgroup_memory_used_bytes{cgroup=\"/user.slice/user-20821.slice\"} 27115520"
        ));
        assert!(body.contains("cgroup_cpu_total_seconds{cgroup=\"/user.slice/user-20821.slice\"} 0.831825022"));
        assert!(body.contains("cgroup_info{cgroup=\"/user.slice/user-20821.slice\""));
        assert!(body.contains("cgroup_exporter_collect_error{cgroup=\"/dne\"} 1"));
        assert!(body.contains("cgroup_exporter_groups 2"));
        assert!(body.contains("cgroup_exporter_groups_failed 1"));
        assert_eq!(state.health_stats.total_scrapes(), 1);
    }

    #[tokio::test]
    async fn test_metrics_handler_without_exporter_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let state = v1_state(dir.path(), false);

        let body = metrics_handler(State(state)).await.unwrap();
        assert!(body.contains("cgroup_memsw_fail_count"));
        assert!(!body.contains("cgroup_exporter_scrape_duration_seconds"));
    }
}
