//! Tracegate Collector
//!
//! A telemetry relay sidecar: accepts OTLP records over gRPC and HTTP, runs
//! them through configured pipelines (bounded queues, processor chain,
//! retrying exporters), and forwards them to telemetry backends. Nothing is
//! persisted; undeliverable batches are dropped after a bounded retry budget.
//!
//! # Surfaces
//!
//! Four independent listeners, each always-on once the collector is healthy:
//! OTLP/gRPC ingest (4317), OTLP/HTTP ingest (4318), Prometheus metrics
//! scrape (8888), and a health probe (13133) answering with the current
//! state only.
//!
//! # Startup
//!
//! The configuration document is fetched exactly once, from the source named
//! by `TRACEGATE_CONFIG`. A fetch or validation failure is fatal: the
//! process exits without serving traffic.
//!
//! # Example
//!
//! ```no_run
//! use collector::run_collector;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_collector().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod grpc;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod routes;
mod source;
mod state;

pub use config::Settings;
pub use source::{ConfigFetchError, ConfigSource};
pub use state::AppState;

use anyhow::{anyhow, Context, Result};
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::LogsServiceServer;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::MetricsServiceServer;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::TraceServiceServer;
use shared::config::TelemetryConfig;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

/// How long pipeline stages get to drain after the servers have stopped.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Runs the collector with settings from environment variables.
///
/// Fetches the configuration document exactly once, builds the pipelines,
/// binds all four surfaces, and serves until SIGTERM/SIGINT.
///
/// # Errors
///
/// Returns an error if the configuration document cannot be fetched or
/// validated, a listener cannot be bound, or a server fails fatally.
pub async fn run_collector() -> Result<()> {
    let settings = Settings::from_env();
    run_with_settings(&settings).await
}

/// Runs the collector with the provided settings.
///
/// This is useful for testing or when you want to provide settings
/// programmatically.
///
/// # Errors
///
/// Same as [`run_collector`].
pub async fn run_with_settings(settings: &Settings) -> Result<()> {
    let source = settings.source()?;
    tracing::info!(%source, "fetching configuration document");
    let config = source.load()?;
    serve(config).await
}

/// Serves a validated configuration until shutdown.
///
/// # Errors
///
/// Returns an error if an exporter cannot be built, a listener cannot be
/// bound, or a server fails fatally.
pub async fn serve(config: TelemetryConfig) -> Result<()> {
    let health = health::HealthMonitor::new(config.service.health.exporter_grace());
    let (handles, pipeline_tasks) = pipeline::build(&config, &health)?;
    let state = AppState::new(handles, health.clone());

    let grpc_addr = config.grpc_ingest_addr()?;
    let http_addr = config.http_ingest_addr()?;
    let metrics_addr = config.metrics_addr()?;
    let health_addr = config.health_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind OTLP HTTP listener on {http_addr}"))?;
    let metrics_listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {metrics_addr}"))?;
    let health_listener = TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("failed to bind health listener on {health_addr}"))?;
    let grpc_incoming = TcpIncoming::new(grpc_addr, true, None)
        .map_err(|e| anyhow!("failed to bind OTLP gRPC listener on {grpc_addr}: {e}"))?;

    let grpc_server = Server::builder()
        .add_service(TraceServiceServer::new(grpc::TracesServiceImpl::new(
            state.clone(),
        )))
        .add_service(MetricsServiceServer::new(grpc::MetricsServiceImpl::new(
            state.clone(),
        )))
        .add_service(LogsServiceServer::new(grpc::LogsServiceImpl::new(
            state.clone(),
        )))
        .serve_with_incoming_shutdown(grpc_incoming, wait_for_shutdown(shutdown_rx.clone()));

    let ingest_app = routes::otlp_routes(state.clone()).layer(TraceLayer::new_for_http());
    let metrics_app = routes::metrics_routes().layer(TraceLayer::new_for_http());
    let health_app = routes::health_routes(state.clone()).layer(TraceLayer::new_for_http());

    // Pipelines are spawned and all four listeners are bound.
    health.mark_serving();
    let watchdog = tokio::spawn(
        health
            .clone()
            .run_watchdog(Duration::from_secs(1), shutdown_rx.clone()),
    );

    tracing::info!(
        %grpc_addr,
        %http_addr,
        %metrics_addr,
        %health_addr,
        "collector serving"
    );

    let http_server = axum::serve(http_listener, ingest_app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let metrics_server = axum::serve(metrics_listener, metrics_app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let health_server = axum::serve(health_listener, health_app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let (grpc_result, http_result, metrics_result, health_result) =
        tokio::join!(grpc_server, http_server, metrics_server, health_server);
    grpc_result.context("OTLP gRPC server failed")?;
    http_result.context("OTLP HTTP server failed")?;
    metrics_result.context("metrics server failed")?;
    health_result.context("health server failed")?;

    // Close the pipeline inputs and let the stages drain.
    drop(state);
    for task in pipeline_tasks {
        if tokio::time::timeout(DRAIN_DEADLINE, task).await.is_err() {
            tracing::warn!("pipeline task did not drain within the shutdown deadline");
        }
    }
    let _ = watchdog.await;

    tracing::info!("Collector shutdown complete");
    Ok(())
}

/// Resolves once shutdown has been signalled.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
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

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_on_signal() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(true).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_when_already_signalled() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        wait_for_shutdown(rx).await;
    }
}
