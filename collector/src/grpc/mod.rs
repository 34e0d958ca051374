//! OTLP gRPC receiver services.
//!
//! Implements the OpenTelemetry Protocol gRPC collector services for logs,
//! metrics, and traces. These services follow the OTLP specification and
//! work with standard OpenTelemetry SDK exporters; everything they accept is
//! handed to the signal's pipeline and acknowledged as full success.

mod services;

pub use services::{LogsServiceImpl, MetricsServiceImpl, TracesServiceImpl};
