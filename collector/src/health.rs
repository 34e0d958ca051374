//! Collector health state.
//!
//! The collector owns a single `starting -> healthy -> unhealthy` state,
//! derived from listener readiness and exporter reachability, and publishes
//! it on a watch channel. Probes only ever read it.
//!
//! An exporter that fails continuously for longer than the configured grace
//! window degrades the collector to `unhealthy`; the first successful export
//! afterwards recovers it. There is no terminal state.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// The externally observable health of the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Pipelines and listeners are still coming up.
    Starting,
    /// All listeners are bound and exporters are reachable.
    Healthy,
    /// At least one exporter has been failing beyond the grace window.
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Default)]
struct ExporterStatus {
    /// Start of the current uninterrupted failure streak, if any.
    failing_since: Option<Instant>,
}

struct Inner {
    grace: Duration,
    tx: watch::Sender<HealthState>,
    exporters: Mutex<HashMap<String, ExporterStatus>>,
    serving: AtomicBool,
}

/// Tracks exporter reachability and publishes the derived [`HealthState`].
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

impl HealthMonitor {
    /// Creates a monitor in the `starting` state with the given exporter
    /// grace window.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        let (tx, _rx) = watch::channel(HealthState::Starting);
        Self {
            inner: Arc::new(Inner {
                grace,
                tx,
                exporters: Mutex::new(HashMap::new()),
                serving: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes to health state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.inner.tx.subscribe()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        *self.inner.tx.borrow()
    }

    /// Registers an exporter so its reachability participates in the derived
    /// state. Registering the same name twice is a no-op.
    pub fn register_exporter(&self, name: &str) {
        let mut exporters = self.inner.exporters.lock().expect("health lock poisoned");
        exporters.entry(name.to_string()).or_default();
    }

    /// Records a successful export, ending any failure streak.
    pub fn record_success(&self, name: &str) {
        {
            let mut exporters = self.inner.exporters.lock().expect("health lock poisoned");
            exporters.entry(name.to_string()).or_default().failing_since = None;
        }
        self.evaluate();
    }

    /// Records a failed export attempt, starting a failure streak if one is
    /// not already running.
    pub fn record_failure(&self, name: &str) {
        {
            let mut exporters = self.inner.exporters.lock().expect("health lock poisoned");
            let status = exporters.entry(name.to_string()).or_default();
            if status.failing_since.is_none() {
                status.failing_since = Some(Instant::now());
            }
        }
        self.evaluate();
    }

    /// Marks startup complete: pipelines spawned and all listeners bound.
    pub fn mark_serving(&self) {
        self.inner.serving.store(true, Ordering::SeqCst);
        self.evaluate();
    }

    /// Recomputes and publishes the derived state.
    pub fn evaluate(&self) {
        let next = if self.inner.serving.load(Ordering::SeqCst) {
            let exporters = self.inner.exporters.lock().expect("health lock poisoned");
            let degraded = exporters
                .values()
                .any(|s| s.failing_since.is_some_and(|t| t.elapsed() >= self.inner.grace));
            if degraded {
                HealthState::Unhealthy
            } else {
                HealthState::Healthy
            }
        } else {
            HealthState::Starting
        };

        let previous = self.inner.tx.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "health state changed");
        }
    }

    /// Periodically re-evaluates until shutdown, so a silent failure streak
    /// crosses the grace window even when no new export attempts arrive.
    pub async fn run_watchdog(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.evaluate(),
                _ = shutdown.changed() => break,
            }
        }
    }
}
