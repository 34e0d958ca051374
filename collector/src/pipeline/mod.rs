//! Telemetry pipelines.
//!
//! Each configured signal pipeline is a chain of bounded stages connected by
//! mpsc queues: ingest surfaces push into the pipeline's input queue, a
//! processor stage applies the configured processor chain, and one queue per
//! exporter feeds an export task. A full downstream queue blocks the
//! producer; nothing is ever persisted, and an undeliverable batch is
//! dropped after its exporter's bounded retry budget.

pub mod exporter;
pub mod processor;

pub use exporter::{ExportError, ExporterTask, RetryParams};
pub use processor::ProcessorChain;

use crate::health::HealthMonitor;
use crate::metrics::METRICS;
use anyhow::{anyhow, Result};
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use shared::config::{Signal, TelemetryConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Returns the metrics label for a signal.
pub(crate) fn signal_label(signal: Signal) -> &'static str {
    match signal {
        Signal::Traces => "traces",
        Signal::Metrics => "metrics",
        Signal::Logs => "logs",
    }
}

/// A batch of telemetry records for one signal, kept in OTLP form end to
/// end so attribute content and span event ordering are preserved exactly
/// as received.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryBatch {
    /// Resource-grouped trace spans.
    Traces(Vec<ResourceSpans>),
    /// Resource-grouped metric data.
    Metrics(Vec<ResourceMetrics>),
    /// Resource-grouped log records.
    Logs(Vec<ResourceLogs>),
}

impl TelemetryBatch {
    /// The signal this batch carries.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            Self::Traces(_) => Signal::Traces,
            Self::Metrics(_) => Signal::Metrics,
            Self::Logs(_) => Signal::Logs,
        }
    }

    /// Counts the individual records (spans, metrics, log records) in the
    /// batch.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            Self::Traces(groups) => groups
                .iter()
                .flat_map(|g| &g.scope_spans)
                .map(|s| s.spans.len())
                .sum(),
            Self::Metrics(groups) => groups
                .iter()
                .flat_map(|g| &g.scope_metrics)
                .map(|s| s.metrics.len())
                .sum(),
            Self::Logs(groups) => groups
                .iter()
                .flat_map(|g| &g.scope_logs)
                .map(|s| s.log_records.len())
                .sum(),
        }
    }

    /// Returns true if the batch carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Appends another batch of the same signal. A mismatched signal is a
    /// wiring bug; the offending batch is discarded with an error log.
    pub fn merge(&mut self, other: TelemetryBatch) {
        match (self, other) {
            (Self::Traces(a), Self::Traces(b)) => a.extend(b),
            (Self::Metrics(a), Self::Metrics(b)) => a.extend(b),
            (Self::Logs(a), Self::Logs(b)) => a.extend(b),
            (this, other) => {
                tracing::error!(
                    expected = %this.signal(),
                    received = %other.signal(),
                    "discarding batch with mismatched signal"
                );
            }
        }
    }
}

/// Input queues for the configured pipelines, one per signal.
///
/// Cheap to clone; ingest surfaces hold a clone each.
#[derive(Debug, Clone, Default)]
pub struct PipelineHandles {
    traces: Option<mpsc::Sender<TelemetryBatch>>,
    metrics: Option<mpsc::Sender<TelemetryBatch>>,
    logs: Option<mpsc::Sender<TelemetryBatch>>,
}

impl PipelineHandles {
    /// Creates handles from per-signal input queues.
    #[must_use]
    pub fn new(
        traces: Option<mpsc::Sender<TelemetryBatch>>,
        metrics: Option<mpsc::Sender<TelemetryBatch>>,
        logs: Option<mpsc::Sender<TelemetryBatch>>,
    ) -> Self {
        Self {
            traces,
            metrics,
            logs,
        }
    }

    fn set(&mut self, signal: Signal, sender: mpsc::Sender<TelemetryBatch>) {
        match signal {
            Signal::Traces => self.traces = Some(sender),
            Signal::Metrics => self.metrics = Some(sender),
            Signal::Logs => self.logs = Some(sender),
        }
    }

    fn sender(&self, signal: Signal) -> Option<&mpsc::Sender<TelemetryBatch>> {
        match signal {
            Signal::Traces => self.traces.as_ref(),
            Signal::Metrics => self.metrics.as_ref(),
            Signal::Logs => self.logs.as_ref(),
        }
    }

    /// Hands a batch to its signal's pipeline.
    ///
    /// Ingest is fire-and-forget for callers: a signal with no configured
    /// pipeline, or a pipeline already shut down, absorbs the batch and
    /// counts it as dropped. Waits when the input queue is full (bounded
    /// backpressure).
    pub async fn dispatch(&self, batch: TelemetryBatch) {
        let signal = batch.signal();
        let records = batch.record_count() as u64;

        match self.sender(signal) {
            Some(sender) => {
                if sender.send(batch).await.is_err() {
                    METRICS
                        .dropped_records
                        .with_label_values(&[signal_label(signal), "shutdown"])
                        .inc_by(records);
                }
            }
            None => {
                METRICS
                    .dropped_records
                    .with_label_values(&[signal_label(signal), "no_pipeline"])
                    .inc_by(records);
            }
        }
    }
}

/// Builds the configured pipelines and spawns their stage tasks.
///
/// Returns the input handles for the ingest surfaces plus the spawned task
/// handles, which finish once every input handle has been dropped and the
/// queues have drained.
///
/// # Errors
///
/// Returns an error if an exporter cannot be constructed (for example an
/// endpoint or header that does not parse).
pub fn build(
    config: &TelemetryConfig,
    health: &HealthMonitor,
) -> Result<(PipelineHandles, Vec<JoinHandle<()>>)> {
    let mut handles = PipelineHandles::default();
    let mut tasks = Vec::new();
    let capacity = config.service.queue_capacity.max(1);

    for (signal, pipeline) in &config.service.pipelines {
        let mut outputs = Vec::with_capacity(pipeline.exporters.len());
        for name in &pipeline.exporters {
            let exporter_config = config
                .exporters
                .get(name)
                .ok_or_else(|| anyhow!("pipeline '{signal}' references unknown exporter '{name}'"))?;

            let task = ExporterTask::build(name, exporter_config, health.clone())?;
            health.register_exporter(name);

            let (tx, rx) = mpsc::channel(capacity);
            tasks.push(tokio::spawn(task.run(rx)));
            outputs.push(tx);
        }

        let mut chain_configs = Vec::with_capacity(pipeline.processors.len());
        for name in &pipeline.processors {
            let processor_config = config.processors.get(name).ok_or_else(|| {
                anyhow!("pipeline '{signal}' references unknown processor '{name}'")
            })?;
            chain_configs.push(processor_config.clone());
        }
        let chain = ProcessorChain::from_configs(&chain_configs);

        let (tx, rx) = mpsc::channel(capacity);
        tasks.push(tokio::spawn(processor::run_stage(*signal, rx, chain, outputs)));
        handles.set(*signal, tx);

        tracing::info!(
            %signal,
            processors = pipeline.processors.len(),
            exporters = pipeline.exporters.len(),
            "pipeline initialized"
        );
    }

    Ok((handles, tasks))
}
