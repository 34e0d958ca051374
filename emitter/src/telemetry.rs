//! OTEL SDK initialisation: tracing subscriber + OTLP exporters.
//!
//! Pushes spans and metrics to the collector's OTLP/HTTP ingest surface.
//! Export is fire-and-forget from this process's perspective: an unreachable
//! collector never affects request handling or liveness.

use crate::config::EmitterConfig;
use anyhow::{Context, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::{runtime, Resource};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Handle for the installed pipelines; call [`TelemetryGuard::shutdown`] on
/// exit to flush whatever is still buffered.
pub struct TelemetryGuard {
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Flushes and shuts down the telemetry pipelines.
    pub fn shutdown(self) {
        global::shutdown_tracer_provider();
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!(error = %e, "failed to shut down meter provider");
        }
    }
}

/// Initialise the global tracing subscriber and OTEL pipelines.
///
/// Configures:
/// - A formatted [`tracing_subscriber`] layer for log output.
/// - A [`tracing_opentelemetry`] layer that exports spans over OTLP/HTTP.
/// - A periodic OTLP metrics pipeline (counter + histogram).
///
/// # Errors
///
/// Returns an error if an OTLP exporter or SDK pipeline cannot be
/// initialised.
pub fn init_telemetry(config: &EmitterConfig) -> Result<TelemetryGuard> {
    let resource = service_resource(config);

    // --- Tracing pipeline ---
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint(config.otlp_endpoint.clone()),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default().with_resource(resource.clone()),
        )
        .install_batch(runtime::Tokio)
        .context("failed to install OTLP tracing pipeline")?;

    // --- Metrics pipeline ---
    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint(config.otlp_endpoint.clone()),
        )
        .with_resource(resource)
        .with_period(Duration::from_secs(10))
        .build()
        .context("failed to install OTLP metrics pipeline")?;
    global::set_meter_provider(meter_provider.clone());

    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    // --- Subscriber ---
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()
        .context("failed to initialise tracing subscriber")?;

    Ok(TelemetryGuard { meter_provider })
}

fn service_resource(config: &EmitterConfig) -> Resource {
    let mut attributes = vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            config.service_version.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::DEPLOYMENT_ENVIRONMENT,
            config.environment.clone(),
        ),
    ];
    attributes.extend(
        config
            .resource_attributes
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
    );
    Resource::new(attributes)
}
