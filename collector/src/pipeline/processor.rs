//! The processor stage.
//!
//! Applies the configured processor chain to every batch entering a
//! pipeline. Processors are a closed set of tagged variants: `resource`
//! (stateless resource-attribute mutation, applied in configuration order)
//! and `batch` (stateful accumulation, flushed by record count or interval).
//! Record content and ordering within a batch are never rearranged.

use super::{signal_label, TelemetryBatch};
use crate::metrics::METRICS;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use shared::config::{BatchProcessorConfig, ProcessorConfig, ResourceProcessorConfig, Signal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// The resolved processor chain for one pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProcessorChain {
    resources: Vec<ResourceProcessorConfig>,
    batching: Option<BatchProcessorConfig>,
}

impl ProcessorChain {
    /// Builds a chain from the pipeline's processor configurations, in
    /// order. Validation guarantees at most one batch processor.
    #[must_use]
    pub fn from_configs(configs: &[ProcessorConfig]) -> Self {
        let mut chain = Self::default();
        for config in configs {
            match config {
                ProcessorConfig::Resource(cfg) => chain.resources.push(cfg.clone()),
                ProcessorConfig::Batch(cfg) => chain.batching = Some(cfg.clone()),
            }
        }
        chain
    }

    /// Returns the batching configuration, if the chain has one.
    #[must_use]
    pub fn batching(&self) -> Option<&BatchProcessorConfig> {
        self.batching.as_ref()
    }

    /// Applies the stateless processors to a batch in place.
    pub fn apply(&self, batch: &mut TelemetryBatch) {
        for config in &self.resources {
            match batch {
                TelemetryBatch::Traces(groups) => {
                    for group in groups.iter_mut() {
                        apply_resource(&mut group.resource, config);
                    }
                }
                TelemetryBatch::Metrics(groups) => {
                    for group in groups.iter_mut() {
                        apply_resource(&mut group.resource, config);
                    }
                }
                TelemetryBatch::Logs(groups) => {
                    for group in groups.iter_mut() {
                        apply_resource(&mut group.resource, config);
                    }
                }
            }
        }
    }
}

fn string_value(value: &str) -> AnyValue {
    AnyValue {
        value: Some(any_value::Value::StringValue(value.to_string())),
    }
}

fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(string_value(value)),
    }
}

/// Applies one resource processor to a record group's resource: delete, then
/// insert-if-absent, then upsert.
fn apply_resource(resource: &mut Option<Resource>, config: &ResourceProcessorConfig) {
    let resource = resource.get_or_insert_with(Resource::default);

    resource
        .attributes
        .retain(|kv| !config.delete.iter().any(|key| key == &kv.key));

    for (key, value) in &config.insert {
        if !resource.attributes.iter().any(|kv| &kv.key == key) {
            resource.attributes.push(string_attribute(key, value));
        }
    }

    for (key, value) in &config.upsert {
        match resource.attributes.iter_mut().find(|kv| &kv.key == key) {
            Some(kv) => kv.value = Some(string_value(value)),
            None => resource.attributes.push(string_attribute(key, value)),
        }
    }
}

/// Sends a batch to every exporter queue, waiting when one is full.
async fn dispatch(outputs: &[mpsc::Sender<TelemetryBatch>], batch: TelemetryBatch) {
    let Some((last, rest)) = outputs.split_last() else {
        return;
    };
    for output in rest {
        send_one(output, batch.clone()).await;
    }
    send_one(last, batch).await;
}

async fn send_one(output: &mpsc::Sender<TelemetryBatch>, batch: TelemetryBatch) {
    let signal = batch.signal();
    let records = batch.record_count() as u64;
    if output.send(batch).await.is_err() {
        METRICS
            .dropped_records
            .with_label_values(&[signal_label(signal), "shutdown"])
            .inc_by(records);
    }
}

/// Runs one pipeline's processor stage until its input queue closes.
///
/// Without a batch processor, every incoming batch is forwarded as soon as
/// the chain has been applied. With one, records accumulate until the size
/// threshold or the flush interval is reached; whatever is pending when the
/// stage shuts down is flushed, not dropped.
pub async fn run_stage(
    signal: Signal,
    mut input: mpsc::Receiver<TelemetryBatch>,
    chain: ProcessorChain,
    outputs: Vec<mpsc::Sender<TelemetryBatch>>,
) {
    let Some(batching) = chain.batching().cloned() else {
        while let Some(mut incoming) = input.recv().await {
            chain.apply(&mut incoming);
            dispatch(&outputs, incoming).await;
        }
        tracing::debug!(%signal, "processor stage stopped");
        return;
    };

    let mut pending: Option<TelemetryBatch> = None;
    let mut pending_records = 0usize;
    let mut ticker = tokio::time::interval(batching.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the interval
    // measures from stage start.
    ticker.tick().await;

    loop {
        tokio::select! {
            incoming = input.recv() => match incoming {
                Some(mut incoming) => {
                    chain.apply(&mut incoming);
                    pending_records += incoming.record_count();
                    match pending.as_mut() {
                        Some(buffer) => buffer.merge(incoming),
                        None => pending = Some(incoming),
                    }
                    if pending_records >= batching.max_batch_size {
                        if let Some(batch) = pending.take() {
                            dispatch(&outputs, batch).await;
                        }
                        pending_records = 0;
                        ticker.reset();
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(batch) = pending.take() {
                    dispatch(&outputs, batch).await;
                    pending_records = 0;
                }
            }
        }
    }

    if let Some(batch) = pending.take() {
        dispatch(&outputs, batch).await;
    }
    tracing::debug!(%signal, "processor stage stopped");
}
