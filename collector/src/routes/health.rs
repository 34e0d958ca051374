//! Health probe endpoint.
//!
//! Answers with the collector's current [`HealthState`] and nothing else: a
//! probe never triggers dependency checks, it only reads the state derived
//! from listener readiness and exporter reachability.

use crate::health::HealthState;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

/// Health probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current collector state.
    pub status: HealthState,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Seconds since the collector started.
    pub uptime_secs: u64,
}

/// Creates the health probe routes.
///
/// Orchestrators typically probe `/`; `/health` answers identically.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_probe))
        .route("/health", get(health_probe))
        .with_state(state)
}

/// Health probe handler: 200 while healthy, 503 otherwise.
async fn health_probe(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.health().state();
    let code = if status == HealthState::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: "tracegate-collector",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.uptime().as_secs(),
        }),
    )
}
