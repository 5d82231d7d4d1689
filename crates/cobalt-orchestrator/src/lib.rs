//! Agent orchestration engine for Cobalt.
//!
//! This crate turns a task into a sequence of agent invocations under a
//! session's progress mode: coordination, analysis, execution, review.

pub mod agents;
pub mod approval;
pub mod error;
pub mod events;
pub mod metrics;
pub mod orchestrator;
mod pipeline;
pub mod session;
pub mod task;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use agents::{
    AnalysisOutput, AnalyzerAgent, CodeReview, ContentReview, CoordinationOutput,
    CoordinationPlan, CoordinatorAgent, ExecutionOutput, ExecutionPayload, ExecutorAgent,
    QualityReview, RequirementsAnalysis, ReviewOutput, ReviewPayload, ReviewerAgent, Risk,
    StageOutput, Subtask,
};
pub use approval::{ApprovalDecision, ApprovalGate, AutoApprove, FnGate, PendingApprovals};
pub use error::{AgentError, OrchestratorError, Result};
pub use events::OrchestratorEvent;
pub use metrics::AgentMetrics;
pub use orchestrator::AgentOrchestrator;
pub use session::{AgentContext, ProgressMode, Session, SessionStatus, SessionSummary};
pub use task::{Stage, Task, TaskResult, TaskStatus};

/// The closed set of agent roles in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Decomposes tasks and plans their execution.
    Coordinator,
    /// Analyzes requirements and risks.
    Analyzer,
    /// Performs the actual work.
    Executor,
    /// Reviews the result.
    Reviewer,
}

impl AgentRole {
    /// All roles, in pipeline order.
    pub const ALL: [Self; 4] = [Self::Coordinator, Self::Analyzer, Self::Executor, Self::Reviewer];
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coordinator => write!(f, "coordinator"),
            Self::Analyzer => write!(f, "analyzer"),
            Self::Executor => write!(f, "executor"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// A stateless task handler for one role.
///
/// Implementations issue one or more generation calls and return a typed
/// stage output. They must not persist per-call state; session-scoped state
/// lives in [`AgentContext`] owned by the orchestrator.
#[async_trait]
pub trait RoleAgent: Send + Sync {
    /// The role this agent implements.
    fn role(&self) -> AgentRole;

    /// Executes one stage of the given task.
    ///
    /// # Arguments
    /// * `task` - The task being processed
    /// * `context` - The accumulated stage context, earlier outputs included
    ///
    /// # Errors
    /// Returns an `AgentError` only for generation-level failures;
    /// unparseable model output is recovered with typed fallbacks.
    async fn execute(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> std::result::Result<StageOutput, AgentError>;
}
