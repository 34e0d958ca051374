//! Tracegate Demo Emitter
//!
//! A toy web service that produces trace spans, counters, and a histogram,
//! and pushes them to the collector sidecar's OTLP/HTTP ingest surface. No
//! business logic lives here: the routes exist to exercise the telemetry
//! pipeline, including a deliberately raised error and artificial latency.
//!
//! Liveness is local: `/health` answers 200 whether or not the collector is
//! reachable.
//!
//! # Example
//!
//! ```no_run
//! use emitter::{run_server, EmitterConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server(EmitterConfig::from_env()?).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod routes;
mod state;
pub mod telemetry;

pub use config::EmitterConfig;
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the demo emitter with the provided configuration.
///
/// # Errors
///
/// Returns an error if the server fails to bind or a fatal error occurs
/// during operation.
pub async fn run_server(config: EmitterConfig) -> Result<()> {
    let addr = config.socket_addr();
    let state = AppState::new(config.environment.clone());
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        service = %config.service_name,
        environment = %config.environment,
        otlp_endpoint = %config.otlp_endpoint,
        "demo emitter listening"
    );

    let heartbeat = tokio::spawn(heartbeat_loop());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    heartbeat.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a
/// full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::demo_routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state,
            routes::track_request,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Periodic background activity so the log stream shows the process is
/// alive between requests.
async fn heartbeat_loop() {
    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tracing::info!("background activity heartbeat");
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_health() {
        let app = create_router(AppState::new("test".to_string()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_unknown_route_is_404() {
        let app = create_router(AppState::new("test".to_string()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
