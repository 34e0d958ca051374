//! Demonstration routes.
//!
//! These exist solely to exercise the collector's ingest surfaces: a static
//! status payload, a user listing with artificial latency to feed the
//! duration histogram, and an endpoint that manufactures a recorded
//! exception so error telemetry can be verified end to end.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{global, KeyValue};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Instrumentation scope for the demo spans.
const TRACER_NAME: &str = "tracegate-demo";

/// Bounds of the artificial `/api/users` latency, in milliseconds.
const USER_FETCH_DELAY_MS: std::ops::RangeInclusive<u64> = 50..=250;

/// The deliberately raised error recorded on the `/api/error` span.
#[derive(Debug, Error)]
#[error("simulated failure for testing")]
struct SimulatedError;

/// Root status payload.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Greeting line.
    pub message: &'static str,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Configured environment tag.
    pub environment: String,
    /// Service version.
    pub version: &'static str,
    /// What this service is for.
    pub note: &'static str,
}

/// A demo user record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// User id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

/// Response for the user listing.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    /// The demo users.
    pub users: Vec<User>,
    /// Always equal to `users.len()`.
    pub count: usize,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Response for the simulated error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error category.
    pub error: &'static str,
    /// Human-readable detail.
    pub message: &'static str,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Creates the demonstration routes.
pub fn demo_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/users", get(get_users))
        .route("/api/error", get(simulate_error))
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Hello from the Tracegate demo emitter!",
        timestamp: Utc::now(),
        environment: state.environment().to_string(),
        version: env!("CARGO_PKG_VERSION"),
        note: "This app sends telemetry to the collector sidecar",
    })
}

/// Picks the artificial user-fetch latency.
fn random_fetch_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(USER_FETCH_DELAY_MS))
}

fn sample_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        },
        User {
            id: 2,
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
        },
        User {
            id: 3,
            name: "Charlie".to_string(),
            email: "charlie@example.com".to_string(),
        },
    ]
}

/// Lists the demo users after a randomized delay.
///
/// The delay is a test fixture exercising histogram export; the request
/// suspends without blocking other requests.
async fn get_users() -> Json<UsersResponse> {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer
        .span_builder("get_users")
        .with_kind(SpanKind::Server)
        .start(&tracer);
    span.set_attribute(KeyValue::new("http.method", "GET"));
    span.set_attribute(KeyValue::new("http.route", "/api/users"));
    span.set_attribute(KeyValue::new("user.operation", "fetch_all_users"));

    let delay = random_fetch_delay();
    span.add_event(
        "starting_user_fetch",
        vec![KeyValue::new(
            "delay_ms",
            i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
        )],
    );
    tokio::time::sleep(delay).await;

    let users = sample_users();
    let count = users.len();
    span.add_event(
        "users_fetched",
        vec![KeyValue::new("user_count", count as i64)],
    );
    span.set_attribute(KeyValue::new("users.count", count as i64));
    span.set_status(Status::Ok);
    span.end();

    Json(UsersResponse {
        users,
        count,
        timestamp: Utc::now(),
    })
}

/// Deliberately raises and records an exception, then answers 500.
///
/// Not a real fault: it exists to validate that error telemetry propagates
/// through the pipeline.
async fn simulate_error() -> (StatusCode, Json<ErrorResponse>) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer
        .span_builder("simulate_error")
        .with_kind(SpanKind::Server)
        .start(&tracer);
    span.set_attribute(KeyValue::new("http.method", "GET"));
    span.set_attribute(KeyValue::new("http.route", "/api/error"));
    span.set_attribute(KeyValue::new("error.type", "simulated_error"));

    tracing::error!("simulated error endpoint called");
    span.add_event(
        "error_simulated",
        vec![KeyValue::new(
            "message",
            "This is a simulated error for testing",
        )],
    );

    let error = SimulatedError;
    span.record_error(&error);
    span.set_status(Status::error(error.to_string()));
    span.end();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal Server Error",
            message: "This is a simulated error for testing",
            timestamp: Utc::now(),
        }),
    )
}
