//! Demo emitter route definitions.

mod demo;
mod health;

pub use demo::demo_routes;
pub use health::health_routes;

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Request middleware: logs the request and feeds the counter and duration
/// histogram for every route.
pub(crate) async fn track_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let started = Instant::now();

    tracing::info!(%method, %route, "request received");
    state.record_request(&method, &route);

    let response = next.run(request).await;

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    state.record_duration(&method, &route, response.status().as_u16(), duration_ms);

    response
}
