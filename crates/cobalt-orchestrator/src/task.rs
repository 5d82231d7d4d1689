//! Task definitions and the task status state machine.

use crate::AgentRole;
use crate::agents::{AnalysisOutput, CoordinationOutput, ExecutionOutput, ReviewOutput};
use crate::session::ProgressMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

/// Task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task has been created but not started.
    Pending,
    /// Task is executing its pipeline.
    Running,
    /// Task is waiting on an approval decision.
    Paused,
    /// Task finished; its result payload is set.
    Completed,
    /// Task failed; its error field is set.
    Failed,
}

impl TaskStatus {
    /// Checks if the task can transition to the given status.
    ///
    /// Status is monotonic: pending to running to a terminal state, with
    /// paused reachable only from running while awaiting approval.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Pending, Self::Running) => true,
            (Self::Running, Self::Paused | Self::Completed | Self::Failed) => true,
            (Self::Paused, Self::Running | Self::Failed) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Whether this status admits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One step of the task pipeline, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Task decomposition and planning.
    Coordination,
    /// Requirements and risk analysis.
    Analysis,
    /// The actual work.
    Execution,
    /// Quality review of the execution output.
    Review,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 4] = [Self::Coordination, Self::Analysis, Self::Execution, Self::Review];

    /// The stable key used for result fields and context merging.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Coordination => "coordination",
            Self::Analysis => "analysis",
            Self::Execution => "execution",
            Self::Review => "review",
        }
    }

    /// The agent role that runs this stage.
    #[must_use]
    pub fn role(self) -> AgentRole {
        match self {
            Self::Coordination => AgentRole::Coordinator,
            Self::Analysis => AgentRole::Analyzer,
            Self::Execution => AgentRole::Executor,
            Self::Review => AgentRole::Reviewer,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The result payload of a finished pipeline.
///
/// Stage fields are declared in pipeline order so serialized output lists
/// them in the order they ran.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// The progress mode the pipeline ran under.
    pub mode: ProgressMode,
    /// Keys of the stages that actually ran, in order.
    pub steps: Vec<String>,
    /// Coordinator output, when the stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordination: Option<CoordinationOutput>,
    /// Analyzer output, when the stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisOutput>,
    /// Executor output, when the stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOutput>,
    /// Reviewer output, when the stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewOutput>,
    /// Final pipeline status ("completed" or "failed").
    pub status: String,
}

impl TaskResult {
    /// Creates an empty result for the given mode.
    #[must_use]
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            steps: Vec::new(),
            coordination: None,
            analysis: None,
            execution: None,
            review: None,
            status: String::new(),
        }
    }
}

/// A unit of work submitted to a session.
///
/// Owned by its session until completion; mutated only by the
/// orchestrator's execution routine.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Detailed description.
    pub description: String,
    /// Priority in `1..=5`; lower is more urgent.
    pub priority: u8,
    /// Ids of tasks this one depends on.
    pub dependencies: Vec<String>,
    /// Caller-supplied context handed to the first stage.
    pub context: Map<String, Value>,
    /// Current status.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Result payload, set on completion.
    pub result: Option<TaskResult>,
    /// Human-readable error, set on failure.
    pub error: Option<String>,
}

impl Task {
    /// Creates a new pending task.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            priority: 1,
            dependencies: Vec::new(),
            context: Map::new(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Sets the priority, clamped to `1..=5`.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }

    /// Sets the initial context map.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Sets the dependency list.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Transitions the task to a new status if the transition is valid.
    ///
    /// # Returns
    /// Returns `true` when the transition was applied.
    pub fn transition(&mut self, to: TaskStatus) -> bool {
        if !self.status.can_transition_to(to) {
            error!(
                task_id = %self.id,
                from = %self.status,
                to = %to,
                "Invalid task status transition"
            );
            return false;
        }

        debug!(task_id = %self.id, from = %self.status, to = %to, "Task status transition");
        self.status = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_follow_lifecycle() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Paused));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Paused.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Paused.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn test_invalid_status_transitions() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Paused));
        assert!(!TaskStatus::Paused.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        for to in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Paused,
        ] {
            assert!(!TaskStatus::Completed.can_transition_to(to));
            assert!(!TaskStatus::Failed.can_transition_to(to));
        }
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_task_builder() {
        let mut context = Map::new();
        context.insert("task_type".to_string(), Value::String("general".to_string()));

        let task = Task::new("Write report", "Summarize the quarter")
            .with_priority(9)
            .with_context(context)
            .with_dependencies(vec!["other-task".to_string()]);

        assert_eq!(task.priority, 5, "priority is clamped to 1..=5");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.dependencies.len(), 1);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_task_transition_rejects_invalid() {
        let mut task = Task::new("t", "d");
        assert!(!task.transition(TaskStatus::Completed));
        assert_eq!(task.status, TaskStatus::Pending);

        assert!(task.transition(TaskStatus::Running));
        assert!(task.transition(TaskStatus::Completed));
        assert!(!task.transition(TaskStatus::Running));
    }

    #[test]
    fn test_stage_order_and_roles() {
        let keys: Vec<&str> = Stage::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["coordination", "analysis", "execution", "review"]);
        assert_eq!(Stage::Execution.role(), AgentRole::Executor);
    }

    #[test]
    fn test_task_result_serializes_stages_in_pipeline_order() {
        let mut result = TaskResult::new(ProgressMode::Auto);
        result.status = "completed".to_string();
        let json = serde_json::to_string(&result).unwrap();
        let mode_pos = json.find("\"mode\"").unwrap();
        let steps_pos = json.find("\"steps\"").unwrap();
        let status_pos = json.find("\"status\"").unwrap();
        assert!(mode_pos < steps_pos && steps_pos < status_pos);
    }
}
