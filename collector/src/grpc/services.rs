//! gRPC service implementations for OTLP ingest.

use crate::metrics::METRICS;
use crate::pipeline::TelemetryBatch;
use crate::state::AppState;
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::LogsService;
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::MetricsService;
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::TraceService;
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tonic::{Request, Response, Status};

/// Implementation of the OTLP `LogsService` gRPC service.
#[derive(Clone)]
pub struct LogsServiceImpl {
    state: AppState,
}

impl LogsServiceImpl {
    /// Creates a new `LogsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl LogsService for LogsServiceImpl {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let batch = TelemetryBatch::Logs(request.into_inner().resource_logs);
        let records = batch.record_count() as u64;
        METRICS
            .ingested_records
            .with_label_values(&["logs", "grpc"])
            .inc_by(records);
        tracing::debug!(records, "accepted OTLP gRPC logs");

        self.state.pipelines().dispatch(batch).await;
        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: None,
        }))
    }
}

/// Implementation of the OTLP `MetricsService` gRPC service.
#[derive(Clone)]
pub struct MetricsServiceImpl {
    state: AppState,
}

impl MetricsServiceImpl {
    /// Creates a new `MetricsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsServiceImpl {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let batch = TelemetryBatch::Metrics(request.into_inner().resource_metrics);
        let records = batch.record_count() as u64;
        METRICS
            .ingested_records
            .with_label_values(&["metrics", "grpc"])
            .inc_by(records);
        tracing::debug!(records, "accepted OTLP gRPC metrics");

        self.state.pipelines().dispatch(batch).await;
        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

/// Implementation of the OTLP `TraceService` gRPC service.
#[derive(Clone)]
pub struct TracesServiceImpl {
    state: AppState,
}

impl TracesServiceImpl {
    /// Creates a new `TracesServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl TraceService for TracesServiceImpl {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let batch = TelemetryBatch::Traces(request.into_inner().resource_spans);
        let records = batch.record_count() as u64;
        METRICS
            .ingested_records
            .with_label_values(&["traces", "grpc"])
            .inc_by(records);
        tracing::debug!(records, "accepted OTLP gRPC traces");

        self.state.pipelines().dispatch(batch).await;
        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthMonitor;
    use crate::pipeline::PipelineHandles;
    use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn create_test_state() -> (
        AppState,
        mpsc::Receiver<TelemetryBatch>,
        mpsc::Receiver<TelemetryBatch>,
    ) {
        let (traces_tx, traces_rx) = mpsc::channel(8);
        let (logs_tx, logs_rx) = mpsc::channel(8);
        let state = AppState::new(
            PipelineHandles::new(Some(traces_tx), None, Some(logs_tx)),
            HealthMonitor::new(Duration::from_secs(30)),
        );
        (state, traces_rx, logs_rx)
    }

    #[tokio::test]
    async fn test_traces_service_empty_request() {
        let (state, _traces_rx, _logs_rx) = create_test_state();
        let service = TracesServiceImpl::new(state);

        let response = service
            .export(Request::new(ExportTraceServiceRequest {
                resource_spans: vec![],
            }))
            .await
            .unwrap();

        assert!(response.into_inner().partial_success.is_none());
    }

    #[tokio::test]
    async fn test_traces_service_enqueues_batch() {
        let (state, mut traces_rx, _logs_rx) = create_test_state();
        let service = TracesServiceImpl::new(state);

        let resource_spans = vec![ResourceSpans {
            resource: None,
            scope_spans: vec![ScopeSpans {
                scope: None,
                spans: vec![Span {
                    trace_id: vec![1; 16],
                    span_id: vec![2; 8],
                    name: "grpc-test-operation".to_string(),
                    ..Default::default()
                }],
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }];

        let response = service
            .export(Request::new(ExportTraceServiceRequest {
                resource_spans: resource_spans.clone(),
            }))
            .await
            .unwrap();
        assert!(response.into_inner().partial_success.is_none());

        let batch = traces_rx.try_recv().unwrap();
        assert_eq!(batch, TelemetryBatch::Traces(resource_spans));
    }

    #[tokio::test]
    async fn test_logs_service_enqueues_batch() {
        let (state, _traces_rx, mut logs_rx) = create_test_state();
        let service = LogsServiceImpl::new(state);

        let resource_logs = vec![ResourceLogs {
            resource: None,
            scope_logs: vec![ScopeLogs {
                scope: None,
                log_records: vec![LogRecord {
                    time_unix_nano: 1_700_000_000_000_000_000,
                    severity_number: 9,
                    ..Default::default()
                }],
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }];

        let response = service
            .export(Request::new(ExportLogsServiceRequest {
                resource_logs: resource_logs.clone(),
            }))
            .await
            .unwrap();
        assert!(response.into_inner().partial_success.is_none());

        let batch = logs_rx.try_recv().unwrap();
        assert_eq!(batch.record_count(), 1);
        assert_eq!(batch, TelemetryBatch::Logs(resource_logs));
    }

    #[tokio::test]
    async fn test_metrics_service_without_pipeline_still_succeeds() {
        // Metrics has no configured pipeline in this state; ingest stays
        // fire-and-forget.
        let (state, _traces_rx, _logs_rx) = create_test_state();
        let service = MetricsServiceImpl::new(state);

        let response = service
            .export(Request::new(ExportMetricsServiceRequest {
                resource_metrics: vec![],
            }))
            .await
            .unwrap();

        assert!(response.into_inner().partial_success.is_none());
    }
}
