//! Liveness endpoint.
//!
//! Local liveness only: answers 200 with process uptime whether or not the
//! collector is reachable. Telemetry pipeline health is never consulted.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" if the process can answer at all.
    pub status: &'static str,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the process started.
    pub uptime: f64,
}

/// Creates the liveness routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime: state.uptime().as_secs_f64(),
    })
}
