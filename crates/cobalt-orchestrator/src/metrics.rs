//! Per-role execution metrics.
//!
//! Agents stay stateless; the orchestrator records outcomes at stage
//! boundaries and exposes read-only snapshots.

use crate::AgentRole;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Execution metrics for one agent role.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentMetrics {
    /// Stages this role completed successfully.
    pub tasks_completed: u64,
    /// Stages this role failed.
    pub tasks_failed: u64,
    /// Completed / (completed + failed).
    pub success_rate: f64,
    /// Running mean of stage execution time in milliseconds.
    pub average_execution_time_ms: f64,
    /// Timestamp of the most recent execution.
    pub last_activity: Option<DateTime<Utc>>,
}

impl AgentMetrics {
    fn record(&mut self, success: bool, elapsed: Duration) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }

        let total = self.tasks_completed + self.tasks_failed;
        self.success_rate = self.tasks_completed as f64 / total as f64;

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.average_execution_time_ms +=
            (elapsed_ms - self.average_execution_time_ms) / total as f64;

        self.last_activity = Some(Utc::now());
    }
}

/// Shared metrics store, one entry per role.
#[derive(Debug, Default)]
pub(crate) struct MetricsBoard {
    inner: RwLock<HashMap<AgentRole, AgentMetrics>>,
}

impl MetricsBoard {
    pub(crate) fn new() -> Self {
        let mut inner = HashMap::new();
        for role in AgentRole::ALL {
            inner.insert(role, AgentMetrics::default());
        }
        Self { inner: RwLock::new(inner) }
    }

    pub(crate) async fn record_success(&self, role: AgentRole, elapsed: Duration) {
        self.inner.write().await.entry(role).or_default().record(true, elapsed);
    }

    pub(crate) async fn record_failure(&self, role: AgentRole, elapsed: Duration) {
        self.inner.write().await.entry(role).or_default().record(false, elapsed);
    }

    pub(crate) async fn snapshot(&self) -> HashMap<AgentRole, AgentMetrics> {
        self.inner.read().await.clone()
    }
}
