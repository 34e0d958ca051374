//! OTLP HTTP receiver endpoints.
//!
//! Implements OpenTelemetry Protocol HTTP endpoints for ingesting logs,
//! metrics, and traces. Supports both protobuf (`application/x-protobuf`)
//! and JSON (`application/json`) content types.
//!
//! Ingest is fire-and-forget for callers: a payload that decodes is always
//! acknowledged with full success, and anything that happens to it
//! downstream is observable only through the collector's metrics and health
//! surfaces. Undecodable payloads are rejected with 400.
//!
//! # Endpoints
//!
//! - `POST /v1/logs` - Ingest OTLP logs
//! - `POST /v1/metrics` - Ingest OTLP metrics
//! - `POST /v1/traces` - Ingest OTLP traces

use crate::metrics::METRICS;
use crate::pipeline::TelemetryBatch;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use serde::{Deserialize, Serialize};

/// Content type for protobuf requests.
const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Response for OTLP export requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Rejection summary; absent on full success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<PartialSuccess>,
}

impl ExportResponse {
    /// The full-success response.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            partial_success: None,
        }
    }
}

/// Partial success information.
#[derive(Debug, Serialize, Deserialize)]
pub struct PartialSuccess {
    /// Number of rejected items.
    pub rejected_count: i64,
    /// Error message if any items were rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Error response for OTLP endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct OtlpError {
    /// Error code.
    pub code: u32,
    /// Error message.
    pub message: String,
}

/// Creates the OTLP ingest routes with application state.
pub fn otlp_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/logs", post(ingest_logs))
        .route("/v1/metrics", post(ingest_metrics))
        .route("/v1/traces", post(ingest_traces))
        .with_state(state)
}

/// Determines if the request is protobuf based on Content-Type header.
fn is_protobuf(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(CONTENT_TYPE_PROTOBUF))
}

/// Decodes an OTLP export request from either supported encoding.
fn decode_request<T>(
    headers: &HeaderMap,
    body: &Bytes,
    signal: &'static str,
) -> Result<T, (StatusCode, Json<OtlpError>)>
where
    T: Message + Default + serde::de::DeserializeOwned,
{
    if is_protobuf(headers) {
        T::decode(body.as_ref()).map_err(|e| {
            tracing::error!(signal, error = %e, "failed to decode protobuf request");
            (
                StatusCode::BAD_REQUEST,
                Json(OtlpError {
                    code: 400,
                    message: format!("Failed to decode protobuf: {e}"),
                }),
            )
        })
    } else {
        serde_json::from_slice(body).map_err(|e| {
            tracing::error!(signal, error = %e, "failed to decode JSON request");
            (
                StatusCode::BAD_REQUEST,
                Json(OtlpError {
                    code: 400,
                    message: format!("Failed to decode JSON: {e}"),
                }),
            )
        })
    }
}

/// Handler for OTLP logs ingestion.
///
/// Accepts `ExportLogsServiceRequest` in protobuf or JSON format.
async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<OtlpError>)> {
    let request: ExportLogsServiceRequest = decode_request(&headers, &body, "logs")?;

    let batch = TelemetryBatch::Logs(request.resource_logs);
    let records = batch.record_count() as u64;
    METRICS
        .ingested_records
        .with_label_values(&["logs", "http"])
        .inc_by(records);
    tracing::debug!(records, "accepted OTLP/HTTP logs");

    state.pipelines().dispatch(batch).await;
    Ok((StatusCode::OK, Json(ExportResponse::accepted())))
}

/// Handler for OTLP metrics ingestion.
///
/// Accepts `ExportMetricsServiceRequest` in protobuf or JSON format.
async fn ingest_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<OtlpError>)> {
    let request: ExportMetricsServiceRequest = decode_request(&headers, &body, "metrics")?;

    let batch = TelemetryBatch::Metrics(request.resource_metrics);
    let records = batch.record_count() as u64;
    METRICS
        .ingested_records
        .with_label_values(&["metrics", "http"])
        .inc_by(records);
    tracing::debug!(records, "accepted OTLP/HTTP metrics");

    state.pipelines().dispatch(batch).await;
    Ok((StatusCode::OK, Json(ExportResponse::accepted())))
}

/// Handler for OTLP traces ingestion.
///
/// Accepts `ExportTraceServiceRequest` in protobuf or JSON format.
async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<OtlpError>)> {
    let request: ExportTraceServiceRequest = decode_request(&headers, &body, "traces")?;

    let batch = TelemetryBatch::Traces(request.resource_spans);
    let records = batch.record_count() as u64;
    METRICS
        .ingested_records
        .with_label_values(&["traces", "http"])
        .inc_by(records);
    tracing::debug!(records, "accepted OTLP/HTTP traces");

    state.pipelines().dispatch(batch).await;
    Ok((StatusCode::OK, Json(ExportResponse::accepted())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthMonitor;
    use crate::pipeline::PipelineHandles;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span, Status};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const CONTENT_TYPE_JSON: &str = "application/json";

    struct PipelineEnds {
        traces: mpsc::Receiver<TelemetryBatch>,
        metrics: mpsc::Receiver<TelemetryBatch>,
        logs: mpsc::Receiver<TelemetryBatch>,
    }

    fn create_test_router_with_state() -> (Router, PipelineEnds) {
        let (traces_tx, traces) = mpsc::channel(8);
        let (metrics_tx, metrics) = mpsc::channel(8);
        let (logs_tx, logs) = mpsc::channel(8);
        let state = AppState::new(
            PipelineHandles::new(Some(traces_tx), Some(metrics_tx), Some(logs_tx)),
            HealthMonitor::new(Duration::from_secs(30)),
        );
        (
            otlp_routes(state),
            PipelineEnds {
                traces,
                metrics,
                logs,
            },
        )
    }

    fn create_test_router() -> Router {
        create_test_router_with_state().0
    }

    fn sample_trace_request() -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: vec![KeyValue {
                        key: "service.name".to_string(),
                        value: Some(AnyValue {
                            value: Some(any_value::Value::StringValue(
                                "test-service".to_string(),
                            )),
                        }),
                    }],
                    dropped_attributes_count: 0,
                }),
                scope_spans: vec![ScopeSpans {
                    scope: None,
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        name: "test-operation".to_string(),
                        kind: 2, // Server
                        start_time_unix_nano: 1_700_000_000_000_000_000,
                        end_time_unix_nano: 1_700_000_001_000_000_000,
                        status: Some(Status {
                            message: String::new(),
                            code: 1, // Ok
                        }),
                        ..Default::default()
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        }
    }

    async fn post(app: Router, uri: &str, content_type: &str, body: Vec<u8>) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    // ========== Traces endpoint tests ==========

    #[tokio::test]
    async fn test_ingest_traces_json_empty_request() {
        let app = create_test_router();
        let body = br#"{"resourceSpans": []}"#.to_vec();

        let response = post(app, "/v1/traces", CONTENT_TYPE_JSON, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_traces_protobuf_reaches_pipeline() {
        let (app, mut ends) = create_test_router_with_state();
        let request = sample_trace_request();

        let response = post(
            app,
            "/v1/traces",
            CONTENT_TYPE_PROTOBUF,
            request.encode_to_vec(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The decoded payload enters the traces pipeline unchanged.
        let batch = ends.traces.try_recv().unwrap();
        assert_eq!(batch, TelemetryBatch::Traces(request.resource_spans));
    }

    #[tokio::test]
    async fn test_ingest_traces_acknowledges_full_success() {
        let (app, _ends) = create_test_router_with_state();
        let request = sample_trace_request();

        let response = post(
            app,
            "/v1/traces",
            CONTENT_TYPE_PROTOBUF,
            request.encode_to_vec(),
        )
        .await;

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let result: ExportResponse = serde_json::from_slice(&body).unwrap();
        assert!(result.partial_success.is_none());
    }

    #[tokio::test]
    async fn test_ingest_traces_invalid_json() {
        let app = create_test_router();

        let response = post(app, "/v1/traces", CONTENT_TYPE_JSON, b"{ invalid }".to_vec()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: OtlpError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, 400);
        assert!(error.message.contains("Failed to decode JSON"));
    }

    #[tokio::test]
    async fn test_ingest_traces_invalid_protobuf() {
        let app = create_test_router();

        let response = post(
            app,
            "/v1/traces",
            CONTENT_TYPE_PROTOBUF,
            vec![0xFF, 0xFF, 0xFF],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ========== Metrics endpoint tests ==========

    #[tokio::test]
    async fn test_ingest_metrics_json_empty_request() {
        let app = create_test_router();
        let body = br#"{"resourceMetrics": []}"#.to_vec();

        let response = post(app, "/v1/metrics", CONTENT_TYPE_JSON, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_metrics_protobuf_reaches_pipeline() {
        use opentelemetry_proto::tonic::metrics::v1::{
            metric, number_data_point, Gauge, Metric, NumberDataPoint, ResourceMetrics,
            ScopeMetrics,
        };

        let (app, mut ends) = create_test_router_with_state();
        let request = ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                resource: None,
                scope_metrics: vec![ScopeMetrics {
                    scope: None,
                    metrics: vec![Metric {
                        name: "test_gauge".to_string(),
                        description: "A test gauge".to_string(),
                        unit: "bytes".to_string(),
                        metadata: vec![],
                        data: Some(metric::Data::Gauge(Gauge {
                            data_points: vec![NumberDataPoint {
                                attributes: vec![],
                                start_time_unix_nano: 0,
                                time_unix_nano: 1_700_000_000_000_000_000,
                                exemplars: vec![],
                                flags: 0,
                                value: Some(number_data_point::Value::AsDouble(42.5)),
                            }],
                        })),
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        };

        let response = post(
            app,
            "/v1/metrics",
            CONTENT_TYPE_PROTOBUF,
            request.encode_to_vec(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let batch = ends.metrics.try_recv().unwrap();
        assert_eq!(batch.record_count(), 1);
        assert_eq!(batch, TelemetryBatch::Metrics(request.resource_metrics));
    }

    #[tokio::test]
    async fn test_ingest_metrics_invalid_json() {
        let app = create_test_router();

        let response = post(app, "/v1/metrics", CONTENT_TYPE_JSON, b"{ invalid }".to_vec()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ========== Logs endpoint tests ==========

    #[tokio::test]
    async fn test_ingest_logs_json_empty_request() {
        let app = create_test_router();
        let body = br#"{"resourceLogs": []}"#.to_vec();

        let response = post(app, "/v1/logs", CONTENT_TYPE_JSON, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_logs_protobuf_reaches_pipeline() {
        use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};

        let (app, mut ends) = create_test_router_with_state();
        let request = ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                resource: None,
                scope_logs: vec![ScopeLogs {
                    scope: None,
                    log_records: vec![LogRecord {
                        time_unix_nano: 1_700_000_000_000_000_000,
                        severity_number: 9,
                        body: Some(AnyValue {
                            value: Some(any_value::Value::StringValue(
                                "Test log message".to_string(),
                            )),
                        }),
                        ..Default::default()
                    }],
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        };

        let response = post(
            app,
            "/v1/logs",
            CONTENT_TYPE_PROTOBUF,
            request.encode_to_vec(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let batch = ends.logs.try_recv().unwrap();
        assert_eq!(batch.record_count(), 1);
        assert_eq!(batch, TelemetryBatch::Logs(request.resource_logs));
    }

    // ========== Content-Type detection tests ==========

    #[test]
    fn test_content_type_detection_protobuf() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-protobuf".parse().unwrap(),
        );
        assert!(is_protobuf(&headers));
    }

    #[test]
    fn test_content_type_detection_protobuf_with_charset() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-protobuf; charset=utf-8".parse().unwrap(),
        );
        assert!(is_protobuf(&headers));
    }

    #[test]
    fn test_content_type_detection_json() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_protobuf(&headers));
    }

    #[test]
    fn test_content_type_detection_missing() {
        let headers = HeaderMap::new();
        assert!(!is_protobuf(&headers));
    }
}
