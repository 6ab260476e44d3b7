//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! scrape statistics as a plain-text table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    let message = if state.health_stats.total_scrapes() == 0 {
        "OK - No scrapes yet"
    } else if state.health_stats.last_failed_groups() > 0 {
        "OK - Some cgroups failed in the last scrape"
    } else {
        "OK"
    };

    let table = state.health_stats.render_table();

    debug!("Health check: {}", message);
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\ncgroup version: {}\npaths: {}\n\n{table}",
            state.collector.version(),
            state.paths.join(",")
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use axum::body::to_bytes;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_handler() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: Some(vec!["/user.slice".into()]),
            cgroup_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let state = Arc::new(AppState::new(config).unwrap());
        state.health_stats.record_scrape(4, 0, 0.01);

        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("OK\n"));
        assert!(body.contains("cgroup version: v1"));
        assert!(body.contains("paths: /user.slice"));
        assert!(body.contains("number of done scrapes: 1"));
    }
}
