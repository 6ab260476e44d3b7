//! Landing page handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the / endpoint.
#[instrument(skip(state))]
pub async fn index_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let health_link = if state.config.enable_health.unwrap_or(true) {
        "<p><a href=\"/health\">Health</a></p>\n"
    } else {
        ""
    };
    let page = format!(
        "<html>\n<head><title>cgroup Exporter</title></head>\n<body>\n\
         <h1>cgroup Exporter</h1>\n\
         <p>Version {}</p>\n\
         <p><a href=\"/metrics\">Metrics</a></p>\n\
         {}</body>\n</html>\n",
        env!("CARGO_PKG_VERSION"),
        health_link
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/html; charset=utf-8")],
        page,
    )
}
