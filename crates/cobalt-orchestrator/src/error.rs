// Error types for orchestration

use thiserror::Error;

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Orchestrator API misuse errors.
///
/// This is the only error class the orchestrator surface returns; task-level
/// failures are captured in the task's status and error fields instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The referenced session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The referenced task does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The progress mode string is not one of auto/interactive/hybrid.
    #[error("Unknown progress mode: {0}")]
    InvalidMode(String),

    /// There is no parked pipeline waiting at the given step.
    #[error("No pending approval for task {task_id} at step {step}")]
    NoPendingApproval {
        /// The task whose approval was addressed.
        task_id: String,
        /// The zero-based pipeline step index.
        step: usize,
    },
}

/// Stage-level failures raised by a role agent.
///
/// Parse failures never surface here; agents recover those with typed
/// fallbacks. Only generation-level failures abort a stage.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The generation service returned an error-bearing response.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
