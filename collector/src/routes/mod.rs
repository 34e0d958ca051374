//! Collector HTTP route definitions.
//!
//! One module per surface: OTLP ingest, health probe, and metrics scrape.
//! Each surface is served by its own listener; the routers are composed in
//! the crate root.

mod health;
mod metrics;
mod otlp;

pub use health::health_routes;
pub use metrics::metrics_routes;
pub use otlp::{otlp_routes, ExportResponse, OtlpError, PartialSuccess};
