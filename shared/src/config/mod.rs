//! Configuration module for Tracegate.
//!
//! Contains the pipeline configuration document schema shared by the
//! collector (which validates and applies it) and the CLI (which can
//! pre-validate it before publishing).

pub mod document;

pub use document::{
    BatchProcessorConfig, ConfigError, DebugExporterConfig, DebugVerbosity, EndpointConfig,
    ExporterConfig, HealthSettings, OtlpExporterConfig, OtlpProtocols, OtlpReceiverConfig,
    PipelineConfig, ProcessorConfig, ReceiverConfig, ResourceProcessorConfig, RetryConfig,
    ServiceConfig, Signal,
    TelemetryConfig, TelemetrySettings,
};
