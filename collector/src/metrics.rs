//! Process-internal metrics.
//!
//! Counters for the collector's own behavior (records ingested, batches
//! exported, retries, drops), registered in the default Prometheus registry
//! and served in text exposition format on the metrics surface.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts, TextEncoder};

/// Creates and registers a namespaced counter vec.
fn new_counter_vec(name: &str, help: &str, label_names: &[&str]) -> IntCounterVec {
    let opts = Opts::new(name, help).namespace("tracegate");
    let counter = IntCounterVec::new(opts, label_names).expect("failed to create counter vec");
    prometheus::register(Box::new(counter.clone())).expect("failed to register counter vec");
    counter
}

/// All counters the collector maintains about itself.
pub struct CollectorMetrics {
    /// Records accepted on an ingest surface, by signal and transport.
    pub ingested_records: IntCounterVec,
    /// Batches handed to a backend successfully, by signal and exporter.
    pub exported_batches: IntCounterVec,
    /// Records handed to a backend successfully, by signal and exporter.
    pub exported_records: IntCounterVec,
    /// Export attempts that will be retried, by signal and exporter.
    pub export_retries: IntCounterVec,
    /// Records dropped, by signal and reason.
    pub dropped_records: IntCounterVec,
}

impl CollectorMetrics {
    fn new() -> Self {
        Self {
            ingested_records: new_counter_vec(
                "ingested_records_total",
                "Telemetry records accepted on an ingest surface",
                &["signal", "transport"],
            ),
            exported_batches: new_counter_vec(
                "exported_batches_total",
                "Batches delivered to a backend",
                &["signal", "exporter"],
            ),
            exported_records: new_counter_vec(
                "exported_records_total",
                "Telemetry records delivered to a backend",
                &["signal", "exporter"],
            ),
            export_retries: new_counter_vec(
                "export_retries_total",
                "Export attempts that failed and will be retried",
                &["signal", "exporter"],
            ),
            dropped_records: new_counter_vec(
                "dropped_records_total",
                "Telemetry records dropped instead of delivered",
                &["signal", "reason"],
            ),
        }
    }
}

/// The process-wide metrics instance.
pub static METRICS: Lazy<CollectorMetrics> = Lazy::new(CollectorMetrics::new);

/// Encodes every registered metric family in text exposition format.
///
/// # Errors
///
/// Returns a [`prometheus::Error`] if encoding fails.
pub fn metrics_text_payload() -> Result<String, prometheus::Error> {
    let metric_families = prometheus::gather();
    let mut buffer = String::new();
    TextEncoder::new().encode_utf8(&metric_families, &mut buffer)?;
    Ok(buffer)
}
