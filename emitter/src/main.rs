//! Tracegate Demo Emitter Binary
//!
//! Entry point for the demo web service that exercises the collector's
//! ingest surfaces.

#![deny(unsafe_code)]

use anyhow::Result;
use emitter::{telemetry, EmitterConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = EmitterConfig::from_env()?;
    let guard = telemetry::init_telemetry(&config)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        otlp_endpoint = %config.otlp_endpoint,
        "OpenTelemetry initialized"
    );

    let result = emitter::run_server(config).await;
    guard.shutdown();
    result
}
