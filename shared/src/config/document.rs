//! The pipeline configuration document.
//!
//! This module defines the typed schema for the collector's configuration
//! document: named receivers, processors, and exporters, plus a `service`
//! section wiring them into per-signal pipelines. Component map keys follow
//! the `type` or `type/name` convention, so `otlp/internal` is an `otlp`
//! receiver named `otlp/internal`.
//!
//! The document is published verbatim by the supplier and only ever parsed
//! and validated by the collector at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// A telemetry signal carried by a pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Trace spans.
    #[default]
    Traces,
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traces => write!(f, "traces"),
            Self::Metrics => write!(f, "metrics"),
            Self::Logs => write!(f, "logs"),
        }
    }
}

/// Errors produced while parsing or validating a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the top-level shape.
    #[error("failed to parse configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A component entry did not match its type's schema.
    #[error("invalid configuration for component '{name}': {source}")]
    ComponentParse {
        /// The component map key.
        name: String,
        /// The underlying parse error.
        source: serde_yaml::Error,
    },

    /// A component map key names a type this collector does not implement.
    #[error("unknown {kind} type in component '{name}'")]
    UnknownComponent {
        /// Component kind: receiver, processor, or exporter.
        kind: &'static str,
        /// The component map key.
        name: String,
    },

    /// The service section declares no pipelines at all.
    #[error("service must declare at least one pipeline")]
    NoPipelines,

    /// A pipeline has an empty receivers or exporters list.
    #[error("pipeline '{pipeline}' must declare at least one {kind}")]
    EmptyPipeline {
        /// The pipeline signal.
        pipeline: Signal,
        /// Component kind the pipeline is missing.
        kind: &'static str,
    },

    /// A pipeline references a component that is not declared.
    #[error("pipeline '{pipeline}' references undeclared {kind} '{name}'")]
    UnknownReference {
        /// The pipeline signal.
        pipeline: Signal,
        /// Component kind: receiver, processor, or exporter.
        kind: &'static str,
        /// The missing component name.
        name: String,
    },

    /// A pipeline declares more than one batch processor.
    #[error("pipeline '{pipeline}' declares more than one batch processor")]
    DuplicateBatch {
        /// The pipeline signal.
        pipeline: Signal,
    },

    /// A listen endpoint is not a valid socket address, or an exporter
    /// endpoint is missing its scheme.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A listen endpoint for one of the collector's surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The `host:port` address to bind.
    pub endpoint: String,
}

impl EndpointConfig {
    /// Creates an endpoint from a `host:port` string.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Parses the endpoint into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the string is not a valid
    /// `host:port` address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.endpoint
            .parse()
            .map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("{e}"),
            })
    }
}

fn default_grpc_endpoint() -> EndpointConfig {
    EndpointConfig::new("0.0.0.0:4317")
}

fn default_http_endpoint() -> EndpointConfig {
    EndpointConfig::new("0.0.0.0:4318")
}

fn default_metrics_endpoint() -> EndpointConfig {
    EndpointConfig::new("0.0.0.0:8888")
}

fn default_health_endpoint() -> EndpointConfig {
    EndpointConfig::new("0.0.0.0:13133")
}

/// Protocol endpoints for an OTLP receiver.
///
/// Both ingest protocols are always served; omitting one falls back to its
/// well-known default port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpProtocols {
    /// OTLP over gRPC.
    #[serde(default = "default_grpc_endpoint")]
    pub grpc: EndpointConfig,
    /// OTLP over HTTP.
    #[serde(default = "default_http_endpoint")]
    pub http: EndpointConfig,
}

impl Default for OtlpProtocols {
    fn default() -> Self {
        Self {
            grpc: default_grpc_endpoint(),
            http: default_http_endpoint(),
        }
    }
}

/// Configuration for an OTLP receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OtlpReceiverConfig {
    /// Per-protocol listen endpoints.
    #[serde(default)]
    pub protocols: OtlpProtocols,
}

/// A declared receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverConfig {
    /// OTLP ingest over gRPC and HTTP.
    Otlp(OtlpReceiverConfig),
}

fn default_max_batch_size() -> usize {
    512
}

fn default_flush_interval_ms() -> u64 {
    5000
}

/// Configuration for the batch processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProcessorConfig {
    /// Flush once this many records have accumulated.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Flush at least this often, full or not.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for BatchProcessorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl BatchProcessorConfig {
    /// Returns the flush interval as a `Duration`.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Configuration for the resource processor.
///
/// Mutates the resource attributes attached to every record group passing
/// through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceProcessorConfig {
    /// Attributes added only when the key is absent.
    #[serde(default)]
    pub insert: BTreeMap<String, String>,
    /// Attributes added or overwritten unconditionally.
    #[serde(default)]
    pub upsert: BTreeMap<String, String>,
    /// Attribute keys removed.
    #[serde(default)]
    pub delete: Vec<String>,
}

/// A declared processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorConfig {
    /// Size/interval batching.
    Batch(BatchProcessorConfig),
    /// Resource attribute mutation.
    Resource(ResourceProcessorConfig),
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_initial_backoff_ms() -> u64 {
    250
}

fn default_retry_max_backoff_ms() -> u64 {
    5000
}

/// Bounded retry policy for an exporter.
///
/// A batch is attempted at most `max_attempts` times and then dropped; it is
/// never held indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry.
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on the backoff between retries.
    #[serde(default = "default_retry_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            initial_backoff_ms: default_retry_initial_backoff_ms(),
            max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

fn default_export_timeout_ms() -> u64 {
    10_000
}

/// Configuration for an OTLP exporter (gRPC or HTTP flavour).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpExporterConfig {
    /// Backend endpoint, including the `http://` or `https://` scheme.
    pub endpoint: String,
    /// Extra request headers (API keys, dataset selectors).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-attempt timeout; a timed-out attempt is abandoned.
    #[serde(default = "default_export_timeout_ms")]
    pub timeout_ms: u64,
    /// Bounded retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl OtlpExporterConfig {
    /// Returns the per-attempt timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Verbosity of the debug exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugVerbosity {
    /// Log record counts only.
    #[default]
    Basic,
    /// Log full record payloads.
    Detailed,
}

/// Configuration for the debug exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DebugExporterConfig {
    /// How much of each batch to log.
    #[serde(default)]
    pub verbosity: DebugVerbosity,
}

/// A declared exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExporterConfig {
    /// OTLP over gRPC.
    Otlp(OtlpExporterConfig),
    /// OTLP protobuf over HTTP.
    OtlpHttp(OtlpExporterConfig),
    /// Log batches through the collector's own logs; no network.
    Debug(DebugExporterConfig),
}

/// A single signal pipeline: which receivers feed it, which processors run,
/// and which exporters it fans out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Receivers feeding this pipeline.
    pub receivers: Vec<String>,
    /// Processors applied in order.
    #[serde(default)]
    pub processors: Vec<String>,
    /// Exporters the pipeline fans out to.
    pub exporters: Vec<String>,
}

/// The collector's own telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Where the Prometheus scrape endpoint listens.
    #[serde(default = "default_metrics_endpoint")]
    pub metrics: EndpointConfig,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            metrics: default_metrics_endpoint(),
        }
    }
}

fn default_exporter_grace_ms() -> u64 {
    30_000
}

/// Health probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Where the health probe listens.
    #[serde(default = "default_health_endpoint")]
    pub endpoint: EndpointConfig,
    /// How long an exporter may fail continuously before the collector
    /// reports unhealthy.
    #[serde(default = "default_exporter_grace_ms")]
    pub exporter_grace_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            endpoint: default_health_endpoint(),
            exporter_grace_ms: default_exporter_grace_ms(),
        }
    }
}

impl HealthSettings {
    /// Returns the exporter grace window as a `Duration`.
    #[must_use]
    pub fn exporter_grace(&self) -> Duration {
        Duration::from_millis(self.exporter_grace_ms)
    }
}

fn default_queue_capacity() -> usize {
    1024
}

/// The `service` section: pipeline wiring plus collector-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// One pipeline per signal.
    pub pipelines: BTreeMap<Signal, PipelineConfig>,
    /// The collector's own telemetry surface.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    /// The health probe surface.
    #[serde(default)]
    pub health: HealthSettings,
    /// Capacity of every inter-stage queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// The raw top-level document before component-type dispatch.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    receivers: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    processors: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    exporters: BTreeMap<String, serde_yaml::Value>,
    service: ServiceConfig,
}

/// A parsed and validated pipeline configuration document.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Declared receivers by component name.
    pub receivers: BTreeMap<String, ReceiverConfig>,
    /// Declared processors by component name.
    pub processors: BTreeMap<String, ProcessorConfig>,
    /// Declared exporters by component name.
    pub exporters: BTreeMap<String, ExporterConfig>,
    /// Pipeline wiring and collector-wide settings.
    pub service: ServiceConfig,
}

/// Returns the component type for a map key: everything before the first `/`.
fn component_type(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

impl TelemetryConfig {
    /// Parses a YAML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is not valid YAML, declares
    /// unknown component types, or fails referential validation.
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_yaml::from_str(document)?;

        let mut receivers = BTreeMap::new();
        for (name, value) in raw.receivers {
            let receiver = match component_type(&name) {
                "otlp" => ReceiverConfig::Otlp(parse_component(&name, value)?),
                _ => {
                    return Err(ConfigError::UnknownComponent {
                        kind: "receiver",
                        name,
                    })
                }
            };
            receivers.insert(name, receiver);
        }

        let mut processors = BTreeMap::new();
        for (name, value) in raw.processors {
            let processor = match component_type(&name) {
                "batch" => ProcessorConfig::Batch(parse_component(&name, value)?),
                "resource" => ProcessorConfig::Resource(parse_component(&name, value)?),
                _ => {
                    return Err(ConfigError::UnknownComponent {
                        kind: "processor",
                        name,
                    })
                }
            };
            processors.insert(name, processor);
        }

        let mut exporters = BTreeMap::new();
        for (name, value) in raw.exporters {
            let exporter = match component_type(&name) {
                "otlp" => ExporterConfig::Otlp(parse_component(&name, value)?),
                "otlphttp" => ExporterConfig::OtlpHttp(parse_component(&name, value)?),
                "debug" => ExporterConfig::Debug(parse_component(&name, value)?),
                _ => {
                    return Err(ConfigError::UnknownComponent {
                        kind: "exporter",
                        name,
                    })
                }
            };
            exporters.insert(name, exporter);
        }

        let config = Self {
            receivers,
            processors,
            exporters,
            service: raw.service,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates pipeline wiring and endpoint syntax.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.pipelines.is_empty() {
            return Err(ConfigError::NoPipelines);
        }

        for (signal, pipeline) in &self.service.pipelines {
            if pipeline.receivers.is_empty() {
                return Err(ConfigError::EmptyPipeline {
                    pipeline: *signal,
                    kind: "receiver",
                });
            }
            if pipeline.exporters.is_empty() {
                return Err(ConfigError::EmptyPipeline {
                    pipeline: *signal,
                    kind: "exporter",
                });
            }

            for name in &pipeline.receivers {
                if !self.receivers.contains_key(name) {
                    return Err(ConfigError::UnknownReference {
                        pipeline: *signal,
                        kind: "receiver",
                        name: name.clone(),
                    });
                }
            }
            for name in &pipeline.exporters {
                if !self.exporters.contains_key(name) {
                    return Err(ConfigError::UnknownReference {
                        pipeline: *signal,
                        kind: "exporter",
                        name: name.clone(),
                    });
                }
            }

            let mut batch_count = 0;
            for name in &pipeline.processors {
                match self.processors.get(name) {
                    Some(ProcessorConfig::Batch(_)) => batch_count += 1,
                    Some(ProcessorConfig::Resource(_)) => {}
                    None => {
                        return Err(ConfigError::UnknownReference {
                            pipeline: *signal,
                            kind: "processor",
                            name: name.clone(),
                        });
                    }
                }
            }
            if batch_count > 1 {
                return Err(ConfigError::DuplicateBatch { pipeline: *signal });
            }
        }

        for receiver in self.receivers.values() {
            let ReceiverConfig::Otlp(otlp) = receiver;
            otlp.protocols.grpc.socket_addr()?;
            otlp.protocols.http.socket_addr()?;
        }
        self.service.telemetry.metrics.socket_addr()?;
        self.service.health.endpoint.socket_addr()?;

        for exporter in self.exporters.values() {
            let endpoint = match exporter {
                ExporterConfig::Otlp(cfg) | ExporterConfig::OtlpHttp(cfg) => &cfg.endpoint,
                ExporterConfig::Debug(_) => continue,
            };
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: "exporter endpoint must include an http:// or https:// scheme"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the first declared OTLP receiver, if any.
    #[must_use]
    pub fn otlp_receiver(&self) -> Option<&OtlpReceiverConfig> {
        self.receivers
            .values()
            .next()
            .map(|ReceiverConfig::Otlp(otlp)| otlp)
    }

    /// The OTLP gRPC ingest listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the configured endpoint
    /// does not parse.
    pub fn grpc_ingest_addr(&self) -> Result<SocketAddr, ConfigError> {
        match self.otlp_receiver() {
            Some(otlp) => otlp.protocols.grpc.socket_addr(),
            None => default_grpc_endpoint().socket_addr(),
        }
    }

    /// The OTLP HTTP ingest listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the configured endpoint
    /// does not parse.
    pub fn http_ingest_addr(&self) -> Result<SocketAddr, ConfigError> {
        match self.otlp_receiver() {
            Some(otlp) => otlp.protocols.http.socket_addr(),
            None => default_http_endpoint().socket_addr(),
        }
    }

    /// The Prometheus scrape listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the configured endpoint
    /// does not parse.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.service.telemetry.metrics.socket_addr()
    }

    /// The health probe listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the configured endpoint
    /// does not parse.
    pub fn health_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.service.health.endpoint.socket_addr()
    }
}

fn parse_component<T: serde::de::DeserializeOwned>(
    name: &str,
    value: serde_yaml::Value,
) -> Result<T, ConfigError> {
    serde_yaml::from_value(value).map_err(|source| ConfigError::ComponentParse {
        name: name.to_string(),
        source,
    })
}
