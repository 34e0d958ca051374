//! Metrics scrape endpoint.
//!
//! Exposes the collector's internal counters in Prometheus text exposition
//! format for pull-based scraping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Router};

/// Creates the metrics scrape routes.
pub fn metrics_routes() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> impl IntoResponse {
    match crate::metrics::metrics_text_payload() {
        Ok(payload) => (StatusCode::OK, payload),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics payload");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
