//! Orchestrator lifecycle events.
//!
//! Events are fanned out over a broadcast channel; a slow or lagging
//! subscriber never blocks the pipeline.

use crate::session::ProgressMode;
use crate::task::Stage;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything observable about sessions, tasks, and stages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A session was created.
    SessionCreated {
        /// The new session's id.
        session_id: String,
        /// Its progress mode.
        mode: ProgressMode,
    },
    /// A session was stopped and removed.
    SessionStopped {
        /// The removed session's id.
        session_id: String,
    },
    /// A task began executing.
    TaskStarted {
        /// The owning session.
        session_id: String,
        /// The task id.
        task_id: String,
    },
    /// A task paused awaiting approval.
    TaskPaused {
        /// The task id.
        task_id: String,
        /// The gated stage.
        stage: Stage,
    },
    /// A paused task resumed.
    TaskResumed {
        /// The task id.
        task_id: String,
        /// The stage the decision addressed.
        stage: Stage,
    },
    /// A stage began executing.
    StageStarted {
        /// The task id.
        task_id: String,
        /// The stage.
        stage: Stage,
    },
    /// A stage finished successfully.
    StageCompleted {
        /// The task id.
        task_id: String,
        /// The stage.
        stage: Stage,
    },
    /// A stage was skipped by a denial.
    StageSkipped {
        /// The task id.
        task_id: String,
        /// The stage.
        stage: Stage,
    },
    /// A task completed.
    TaskCompleted {
        /// The task id.
        task_id: String,
    },
    /// A task failed.
    TaskFailed {
        /// The task id.
        task_id: String,
        /// The failure description.
        error: String,
    },
}

/// Broadcast fan-out for orchestrator events.
#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emits an event. Send failures (no subscribers) are ignored.
    pub(crate) fn emit(&self, event: OrchestratorEvent) {
        trace!(event = ?event, "Emitting orchestrator event");
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }
}
