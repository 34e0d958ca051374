//! Emitter configuration module.
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. The recognized variables match what the deployment injects:
//!
//! - `PORT`: the listen port (default: 3000)
//! - `NODE_ENV`: environment tag reported in responses and telemetry
//!   (default: "development")
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: base endpoint of the collector's HTTP
//!   ingest surface (default: "http://localhost:4318")
//! - `OTEL_SERVICE_NAME`: service name attached to all telemetry
//!   (default: "tracegate-demo")
//! - `OTEL_SERVICE_VERSION`: service version attached to all telemetry
//! - `OTEL_RESOURCE_ATTRIBUTES`: comma-separated `key=value` pairs attached
//!   to all telemetry

use anyhow::Result;
use std::net::SocketAddr;

/// Demo emitter configuration.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Environment tag.
    pub environment: String,
    /// Base OTLP/HTTP endpoint telemetry is pushed to.
    pub otlp_endpoint: String,
    /// Service name for the telemetry resource.
    pub service_name: String,
    /// Service version for the telemetry resource.
    pub service_version: String,
    /// Extra static resource attributes.
    pub resource_attributes: Vec<(String, String)>,
}

impl EmitterConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but cannot be parsed as a valid
    /// port number.
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()?
            .unwrap_or(3000);

        let environment =
            std::env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string());

        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4318".to_string());

        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "tracegate-demo".to_string());

        let service_version = std::env::var("OTEL_SERVICE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let resource_attributes = std::env::var("OTEL_RESOURCE_ATTRIBUTES")
            .map(|raw| parse_resource_attributes(&raw))
            .unwrap_or_default();

        Ok(Self {
            host: "0.0.0.0".to_string(),
            port,
            environment,
            otlp_endpoint,
            service_name,
            service_version,
            resource_attributes,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Panics
    ///
    /// Panics if the host and port combination cannot be parsed as a valid
    /// socket address.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address from config")
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            otlp_endpoint: "http://localhost:4318".to_string(),
            service_name: "tracegate-demo".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            resource_attributes: Vec::new(),
        }
    }
}

/// Parses `key=value,key=value` resource attributes; malformed segments are
/// skipped.
fn parse_resource_attributes(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}
