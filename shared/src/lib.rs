//! Tracegate Shared Library
//!
//! This crate contains the types shared between the collector, the demo
//! emitter, and the CLI:
//!
//! - [`config`] - The pipeline configuration document schema and validation
//! - [`store`] - The config store abstraction the document is published to
//!
//! # Example
//!
//! ```
//! use shared::config::TelemetryConfig;
//!
//! let doc = r#"
//! receivers:
//!   otlp:
//!     protocols:
//!       grpc: {endpoint: "0.0.0.0:4317"}
//!       http: {endpoint: "0.0.0.0:4318"}
//! exporters:
//!   debug: {}
//! service:
//!   pipelines:
//!     traces: {receivers: [otlp], exporters: [debug]}
//! "#;
//!
//! let config = TelemetryConfig::from_yaml(doc).unwrap();
//! assert_eq!(config.service.pipelines.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod store;

/// Re-export common dependencies for convenience.
pub use serde;
pub use serde_json;
pub use serde_yaml;
