//! Application state module.
//!
//! Defines the shared state handed to the HTTP routers and gRPC services:
//! the pipeline input handles and the health monitor.

use crate::health::HealthMonitor;
use crate::pipeline::PipelineHandles;
use std::time::{Duration, Instant};

/// State shared across all ingest and probe handlers.
///
/// Cheap to clone; every clone shares the same pipelines and health monitor.
#[derive(Clone)]
pub struct AppState {
    pipelines: PipelineHandles,
    health: HealthMonitor,
    started_at: Instant,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub fn new(pipelines: PipelineHandles, health: HealthMonitor) -> Self {
        Self {
            pipelines,
            health,
            started_at: Instant::now(),
        }
    }

    /// Returns the pipeline input handles.
    #[must_use]
    pub fn pipelines(&self) -> &PipelineHandles {
        &self.pipelines
    }

    /// Returns the health monitor.
    #[must_use]
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Time since this state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TelemetryBatch;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_app_state_is_clone() {
        let (tx, mut rx) = mpsc::channel(4);
        let state = AppState::new(
            PipelineHandles::new(Some(tx), None, None),
            HealthMonitor::new(Duration::from_secs(30)),
        );
        let state2 = state.clone();

        // Both clones dispatch into the same pipeline.
        state
            .pipelines()
            .dispatch(TelemetryBatch::Traces(vec![]))
            .await;
        state2
            .pipelines()
            .dispatch(TelemetryBatch::Traces(vec![]))
            .await;

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }
}
