//! Application state module.
//!
//! Holds the environment tag, the process start time for the liveness
//! endpoint, and the custom metric instruments every request reports to.
//! Measurements are handed straight to the SDK's export pipeline; no
//! aggregation state lives here.

use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{global, KeyValue};
use std::time::{Duration, Instant};

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    environment: String,
    started_at: Instant,
    request_count: Counter<u64>,
    request_duration: Histogram<f64>,
}

impl AppState {
    /// Creates the application state and its metric instruments.
    #[must_use]
    pub fn new(environment: String) -> Self {
        let meter = global::meter("tracegate-demo");
        Self {
            environment,
            started_at: Instant::now(),
            request_count: meter
                .u64_counter("http_requests_total")
                .with_description("Total number of HTTP requests")
                .init(),
            request_duration: meter
                .f64_histogram("http_request_duration_ms")
                .with_description("Duration of HTTP requests in milliseconds")
                .init(),
        }
    }

    /// Returns the configured environment tag.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Time since the process state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Counts one incoming request.
    pub fn record_request(&self, method: &str, route: &str) {
        self.request_count.add(
            1,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("route", route.to_string()),
            ],
        );
    }

    /// Records a finished request's duration.
    pub fn record_duration(&self, method: &str, route: &str, status_code: u16, duration_ms: f64) {
        self.request_duration.record(
            duration_ms,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("route", route.to_string()),
                KeyValue::new("status_code", status_code.to_string()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_reports_environment_and_uptime() {
        let state = AppState::new("test".to_string());
        assert_eq!(state.environment(), "test");
        assert!(state.uptime() < Duration::from_secs(5));
    }

    #[test]
    fn test_recording_against_noop_meter_is_fine() {
        // Without an installed SDK the global meter is a no-op; recording
        // must still be safe.
        let state = AppState::new("test".to_string());
        state.record_request("GET", "/api/users");
        state.record_duration("GET", "/api/users", 200, 12.5);
    }
}
