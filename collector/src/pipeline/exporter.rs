//! Export tasks.
//!
//! Each exporter configured for a pipeline runs as its own task, pulling
//! batches from a bounded queue. Delivery is attempted up to the configured
//! retry budget with exponential backoff and jitter; a per-attempt timeout
//! abandons stalled attempts. A batch that exhausts its budget is dropped
//! and counted. Success and failure feed the health monitor.

use super::{signal_label, TelemetryBatch};
use crate::health::HealthMonitor;
use crate::metrics::METRICS;
use anyhow::{anyhow, Context, Result};
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use shared::config::{DebugVerbosity, ExporterConfig, OtlpExporterConfig, RetryConfig};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, Endpoint};

/// Content type for OTLP protobuf over HTTP.
const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// A single export attempt failure.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The gRPC backend rejected the request or was unreachable.
    #[error("gRPC export failed: {0}")]
    Grpc(#[from] tonic::Status),

    /// The HTTP request could not be sent.
    #[error("HTTP export failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Bounded retry policy with jittered exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on the exponential backoff.
    pub max_backoff: Duration,
}

impl From<&RetryConfig> for RetryParams {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl Default for RetryParams {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryParams {
    /// Computes the delay before the retry following the given attempt
    /// (1-based): exponential in the attempt number, capped, plus up to 50%
    /// random jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.max_backoff);

        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base_ms / 2)
        };
        base + Duration::from_millis(jitter_ms)
    }
}

/// Where a batch is delivered.
enum ExporterKind {
    /// OTLP over gRPC, one lazily connected channel shared by all signals.
    OtlpGrpc {
        traces: TraceServiceClient<Channel>,
        metrics: MetricsServiceClient<Channel>,
        logs: LogsServiceClient<Channel>,
        metadata: MetadataMap,
    },
    /// OTLP protobuf over HTTP.
    OtlpHttp {
        client: reqwest::Client,
        endpoint: String,
        headers: HeaderMap,
    },
    /// Logged through the collector's own logs; never fails.
    Debug { verbosity: DebugVerbosity },
}

/// One pipeline's export task for one configured exporter.
pub struct ExporterTask {
    name: String,
    kind: ExporterKind,
    timeout: Duration,
    retry: RetryParams,
    health: HealthMonitor,
}

fn grpc_metadata(config: &OtlpExporterConfig) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();
    for (key, value) in &config.headers {
        let key: AsciiMetadataKey = key
            .parse()
            .map_err(|_| anyhow!("invalid exporter header name '{key}'"))?;
        let value: AsciiMetadataValue = value
            .parse()
            .map_err(|_| anyhow!("invalid exporter header value for '{key}'"))?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

fn http_headers(config: &OtlpExporterConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("invalid exporter header name '{key}'"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid exporter header value for '{key}'"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

impl ExporterTask {
    /// Builds an export task from its configuration.
    ///
    /// Network exporters connect lazily: an unreachable backend does not
    /// block startup, it shows up as export failures and, past the grace
    /// window, as an unhealthy collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or a header does not parse.
    pub fn build(name: &str, config: &ExporterConfig, health: HealthMonitor) -> Result<Self> {
        let (kind, timeout, retry) = match config {
            ExporterConfig::Otlp(cfg) => {
                let channel = Endpoint::from_shared(cfg.endpoint.clone())
                    .with_context(|| format!("invalid exporter endpoint '{}'", cfg.endpoint))?
                    .connect_lazy();
                let kind = ExporterKind::OtlpGrpc {
                    traces: TraceServiceClient::new(channel.clone()),
                    metrics: MetricsServiceClient::new(channel.clone()),
                    logs: LogsServiceClient::new(channel),
                    metadata: grpc_metadata(cfg)?,
                };
                (kind, cfg.timeout(), RetryParams::from(&cfg.retry))
            }
            ExporterConfig::OtlpHttp(cfg) => {
                let kind = ExporterKind::OtlpHttp {
                    client: reqwest::Client::new(),
                    endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
                    headers: http_headers(cfg)?,
                };
                (kind, cfg.timeout(), RetryParams::from(&cfg.retry))
            }
            ExporterConfig::Debug(cfg) => (
                ExporterKind::Debug {
                    verbosity: cfg.verbosity,
                },
                Duration::from_secs(1),
                RetryParams::default(),
            ),
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            timeout,
            retry,
            health,
        })
    }

    /// Pulls batches from the queue until it closes.
    pub async fn run(mut self, mut input: mpsc::Receiver<TelemetryBatch>) {
        while let Some(batch) = input.recv().await {
            self.export_with_retry(batch).await;
        }
        tracing::debug!(exporter = %self.name, "export task stopped");
    }

    /// Attempts delivery within the retry budget; drops the batch when the
    /// budget is exhausted.
    pub async fn export_with_retry(&mut self, batch: TelemetryBatch) {
        let signal = signal_label(batch.signal());
        let records = batch.record_count() as u64;

        for attempt in 1..=self.retry.max_attempts {
            let outcome = tokio::time::timeout(self.timeout, self.export_once(&batch)).await;
            match outcome {
                Ok(Ok(())) => {
                    METRICS
                        .exported_batches
                        .with_label_values(&[signal, &self.name])
                        .inc();
                    METRICS
                        .exported_records
                        .with_label_values(&[signal, &self.name])
                        .inc_by(records);
                    self.health.record_success(&self.name);
                    return;
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        exporter = %self.name,
                        signal,
                        attempt,
                        %error,
                        "export attempt failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        exporter = %self.name,
                        signal,
                        attempt,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "export attempt timed out; abandoning it"
                    );
                }
            }

            self.health.record_failure(&self.name);
            if attempt < self.retry.max_attempts {
                METRICS
                    .export_retries
                    .with_label_values(&[signal, &self.name])
                    .inc();
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        METRICS
            .dropped_records
            .with_label_values(&[signal, "export_failed"])
            .inc_by(records);
        tracing::warn!(
            exporter = %self.name,
            signal,
            records,
            "dropping batch after exhausting retry budget"
        );
    }

    async fn export_once(&mut self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        let name = &self.name;
        match &mut self.kind {
            ExporterKind::OtlpGrpc {
                traces,
                metrics,
                logs,
                metadata,
            } => match batch {
                TelemetryBatch::Traces(groups) => {
                    let mut request = tonic::Request::new(ExportTraceServiceRequest {
                        resource_spans: groups.clone(),
                    });
                    *request.metadata_mut() = metadata.clone();
                    traces.export(request).await?;
                }
                TelemetryBatch::Metrics(groups) => {
                    let mut request = tonic::Request::new(ExportMetricsServiceRequest {
                        resource_metrics: groups.clone(),
                    });
                    *request.metadata_mut() = metadata.clone();
                    metrics.export(request).await?;
                }
                TelemetryBatch::Logs(groups) => {
                    let mut request = tonic::Request::new(ExportLogsServiceRequest {
                        resource_logs: groups.clone(),
                    });
                    *request.metadata_mut() = metadata.clone();
                    logs.export(request).await?;
                }
            },
            ExporterKind::OtlpHttp {
                client,
                endpoint,
                headers,
            } => {
                let (path, body) = match batch {
                    TelemetryBatch::Traces(groups) => (
                        "/v1/traces",
                        ExportTraceServiceRequest {
                            resource_spans: groups.clone(),
                        }
                        .encode_to_vec(),
                    ),
                    TelemetryBatch::Metrics(groups) => (
                        "/v1/metrics",
                        ExportMetricsServiceRequest {
                            resource_metrics: groups.clone(),
                        }
                        .encode_to_vec(),
                    ),
                    TelemetryBatch::Logs(groups) => (
                        "/v1/logs",
                        ExportLogsServiceRequest {
                            resource_logs: groups.clone(),
                        }
                        .encode_to_vec(),
                    ),
                };

                let response = client
                    .post(format!("{endpoint}{path}"))
                    .headers(headers.clone())
                    .header(CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)
                    .body(body)
                    .send()
                    .await?;
                response.error_for_status()?;
            }
            ExporterKind::Debug { verbosity } => match verbosity {
                DebugVerbosity::Basic => {
                    tracing::info!(
                        exporter = %name,
                        signal = signal_label(batch.signal()),
                        records = batch.record_count(),
                        "debug exporter received batch"
                    );
                }
                DebugVerbosity::Detailed => {
                    tracing::info!(
                        exporter = %name,
                        signal = signal_label(batch.signal()),
                        records = batch.record_count(),
                        ?batch,
                        "debug exporter received batch"
                    );
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
    use shared::config::DebugExporterConfig;

    fn spans_batch(count: usize) -> TelemetryBatch {
        TelemetryBatch::Traces(vec![ResourceSpans {
            resource: None,
            scope_spans: vec![ScopeSpans {
                scope: None,
                spans: (0..count).map(|_| Span::default()).collect(),
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }])
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryParams {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(400),
        };

        // Jitter adds at most 50% on top of the capped base.
        assert!(retry.backoff(1) >= Duration::from_millis(100));
        assert!(retry.backoff(1) <= Duration::from_millis(150));
        assert!(retry.backoff(2) >= Duration::from_millis(200));
        assert!(retry.backoff(10) >= Duration::from_millis(400));
        assert!(retry.backoff(10) <= Duration::from_millis(600));
    }

    #[test]
    fn test_retry_params_from_config() {
        let config = RetryConfig {
            max_attempts: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        };
        let retry = RetryParams::from(&config);
        // At least one attempt always happens.
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.initial_backoff, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_debug_exporter_records_success() {
        let health = HealthMonitor::new(Duration::from_secs(30));
        health.register_exporter("debug");
        health.mark_serving();

        let mut task = ExporterTask::build(
            "debug",
            &ExporterConfig::Debug(DebugExporterConfig::default()),
            health.clone(),
        )
        .unwrap();

        task.export_with_retry(spans_batch(2)).await;
        assert_eq!(health.state(), HealthState::Healthy);
    }

    #[tokio::test]
    async fn test_unreachable_http_backend_drops_after_budget() {
        let health = HealthMonitor::new(Duration::ZERO);
        health.register_exporter("otlphttp");
        health.mark_serving();

        let config = OtlpExporterConfig {
            // Port 9 (discard) on localhost is not listening.
            endpoint: "http://127.0.0.1:9".to_string(),
            headers: std::collections::BTreeMap::new(),
            timeout_ms: 250,
            retry: RetryConfig {
                max_attempts: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
        };
        let mut task = ExporterTask::build(
            "otlphttp",
            &ExporterConfig::OtlpHttp(config),
            health.clone(),
        )
        .unwrap();

        let dropped_before = METRICS
            .dropped_records
            .with_label_values(&["traces", "export_failed"])
            .get();

        task.export_with_retry(spans_batch(3)).await;

        let dropped_after = METRICS
            .dropped_records
            .with_label_values(&["traces", "export_failed"])
            .get();
        assert_eq!(dropped_after - dropped_before, 3);

        // With a zero grace window the failure streak degrades health
        // immediately.
        assert_eq!(health.state(), HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn test_build_rejects_bad_header() {
        let health = HealthMonitor::new(Duration::from_secs(30));
        let config = OtlpExporterConfig {
            endpoint: "http://backend:4317".to_string(),
            headers: [("bad header name".to_string(), "v".to_string())]
                .into_iter()
                .collect(),
            timeout_ms: 1000,
            retry: RetryConfig::default(),
        };
        let result = ExporterTask::build("otlp", &ExporterConfig::Otlp(config), health);
        assert!(result.is_err());
    }
}
