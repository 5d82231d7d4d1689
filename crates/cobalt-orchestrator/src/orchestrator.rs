//! The agent orchestrator: sessions, tasks, and the pipeline driver.

use crate::agents::{AnalyzerAgent, CoordinatorAgent, ExecutorAgent, ReviewerAgent};
use crate::approval::{ApprovalDecision, ApprovalGate, PendingApprovals};
use crate::error::{OrchestratorError, Result};
use crate::events::{EventBus, OrchestratorEvent};
use crate::metrics::MetricsBoard;
use crate::pipeline::PipelineRun;
use crate::session::{ProgressMode, Session, SessionStatus, SessionSummary};
use crate::task::{Stage, Task, TaskStatus};
use crate::{AgentMetrics, AgentRole, RoleAgent};
use cobalt_providers::GenerationService;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a gated stage obtains its approval decision.
enum GateMode {
    /// No gating (AUTO mode).
    None,
    /// A caller-supplied gate decides.
    Callback(Arc<dyn ApprovalGate>),
    /// The run parks on the pending-approval surface until
    /// `approve_step`/`deny_step` resolves it.
    Parked,
}

/// Orchestrator for sessions, tasks, and the four-role pipeline.
///
/// One instance serves many independent sessions; task execution within a
/// session is sequential, and independent sessions may run concurrently.
pub struct AgentOrchestrator {
    /// Role implementations, one per role.
    agents: HashMap<AgentRole, Arc<dyn RoleAgent>>,
    /// Live sessions keyed by id.
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Submitted tasks keyed by id.
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    /// Parked pipelines awaiting approve_step/deny_step.
    approvals: Arc<PendingApprovals>,
    /// Cancellation tokens for running tasks (task id -> token).
    cancellations: Arc<RwLock<HashMap<String, CancellationToken>>>,
    /// Per-role execution metrics.
    metrics: MetricsBoard,
    /// Lifecycle event fan-out.
    events: EventBus,
}

impl std::fmt::Debug for AgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOrchestrator")
            .field("roles", &self.agents.len())
            .finish_non_exhaustive()
    }
}

impl AgentOrchestrator {
    /// Creates an orchestrator with the default role agents, all bound to
    /// the given generation service.
    #[must_use]
    pub fn new(service: Arc<GenerationService>) -> Self {
        let mut agents: HashMap<AgentRole, Arc<dyn RoleAgent>> = HashMap::new();
        agents.insert(
            AgentRole::Coordinator,
            Arc::new(CoordinatorAgent::new(Arc::clone(&service))),
        );
        agents.insert(AgentRole::Analyzer, Arc::new(AnalyzerAgent::new(Arc::clone(&service))));
        agents.insert(AgentRole::Executor, Arc::new(ExecutorAgent::new(Arc::clone(&service))));
        agents.insert(AgentRole::Reviewer, Arc::new(ReviewerAgent::new(service)));

        for role in AgentRole::ALL {
            debug!(role = %role, "Initialized role agent");
        }

        Self {
            agents,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            approvals: Arc::new(PendingApprovals::new()),
            cancellations: Arc::new(RwLock::new(HashMap::new())),
            metrics: MetricsBoard::new(),
            events: EventBus::new(),
        }
    }

    /// Replaces the implementation for one role.
    #[must_use]
    pub fn with_agent(mut self, agent: Arc<dyn RoleAgent>) -> Self {
        self.agents.insert(agent.role(), agent);
        self
    }

    /// Creates a new session with the given progress mode.
    ///
    /// # Returns
    /// The new session's id.
    pub async fn create_session(&self, mode: ProgressMode) -> String {
        let session = Session::new(mode);
        let session_id = session.id.clone();

        self.sessions.write().await.insert(session_id.clone(), session);
        info!(session_id = %session_id, mode = %mode, "Created session");
        self.events.emit(OrchestratorEvent::SessionCreated {
            session_id: session_id.clone(),
            mode,
        });

        session_id
    }

    /// Creates a session from a mode string ("auto", "interactive",
    /// "hybrid").
    ///
    /// # Errors
    /// Returns `InvalidMode` for unrecognized strings.
    pub async fn start_session(&self, mode: &str) -> Result<String> {
        let mode: ProgressMode =
            mode.parse().map_err(|()| OrchestratorError::InvalidMode(mode.to_string()))?;
        Ok(self.create_session(mode).await)
    }

    /// Stops one session, or all sessions when `session_id` is `None`.
    ///
    /// # Returns
    /// Returns `true` if at least one session was removed.
    pub async fn stop_session(&self, session_id: Option<&str>) -> bool {
        match session_id {
            None => {
                let mut sessions = self.sessions.write().await;
                let removed = !sessions.is_empty();
                for session_id in sessions.keys() {
                    self.events.emit(OrchestratorEvent::SessionStopped {
                        session_id: session_id.clone(),
                    });
                }
                sessions.clear();
                info!("All sessions stopped");
                removed
            }
            Some(id) => {
                let removed = self.sessions.write().await.remove(id).is_some();
                if removed {
                    info!(session_id = %id, "Session stopped");
                    self.events.emit(OrchestratorEvent::SessionStopped {
                        session_id: id.to_string(),
                    });
                } else {
                    warn!(session_id = %id, "Attempted to stop unknown session");
                }
                removed
            }
        }
    }

    /// Ids of all live sessions.
    pub async fn list_sessions(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// A clone of one session's full state.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Read-only summary of one session.
    pub async fn get_session_summary(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions.read().await.get(session_id).map(Session::summary)
    }

    /// Status of one session, or an overview of all sessions when no id is
    /// given.
    pub async fn get_session_status(&self, session_id: Option<&str>) -> SessionStatus {
        match session_id {
            Some(id) => match self.get_session_summary(id).await {
                Some(summary) => SessionStatus::Session(summary),
                None => SessionStatus::NotFound { session_id: id.to_string() },
            },
            None => {
                let sessions = self.sessions.read().await;
                SessionStatus::Overview {
                    active_sessions: sessions.len(),
                    session_ids: sessions.keys().cloned().collect(),
                }
            }
        }
    }

    /// Switches a session's progress mode.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn switch_mode(&self, session_id: &str, mode: ProgressMode) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        session.mode = mode;
        info!(session_id = %session_id, mode = %mode, "Switched session mode");
        Ok(())
    }

    /// Per-role execution metrics.
    pub async fn get_agent_metrics(&self) -> HashMap<AgentRole, AgentMetrics> {
        self.metrics.snapshot().await
    }

    /// Subscribes to orchestrator lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Submits a task for later execution.
    ///
    /// # Returns
    /// The new task's id.
    pub async fn add_task(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        context: Map<String, Value>,
    ) -> String {
        let task = Task::new(title, description).with_context(context);
        let task_id = task.id.clone();
        self.tasks.write().await.insert(task_id.clone(), task);
        debug!(task_id = %task_id, "Task added");
        task_id
    }

    /// A clone of one submitted task.
    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Executes a previously submitted task.
    ///
    /// Without a session id the first live session is used, or an AUTO
    /// session is created when none exist.
    ///
    /// # Errors
    /// Returns `TaskNotFound` or `SessionNotFound` on unknown ids.
    pub async fn execute_task_by_id(
        &self,
        session_id: Option<&str>,
        task_id: &str,
    ) -> Result<Task> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => {
                let existing = self.sessions.read().await.keys().next().cloned();
                match existing {
                    Some(id) => id,
                    None => self.create_session(ProgressMode::Auto).await,
                }
            }
        };

        let task = self
            .tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        self.execute_task(&session_id, task, None).await
    }

    /// Runs a task through the pipeline under the session's progress mode.
    ///
    /// All task-level failures are captured in the returned task's status
    /// and error fields so a batch driver can keep scheduling other tasks.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown session id; this is the only
    /// error this method raises.
    pub async fn execute_task(
        &self,
        session_id: &str,
        mut task: Task,
        gate: Option<Arc<dyn ApprovalGate>>,
    ) -> Result<Task> {
        let mode = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .map(|session| session.mode)
                .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?
        };

        if task.status.is_terminal() {
            warn!(task_id = %task.id, status = %task.status, "Task already finished");
            return Ok(task);
        }

        info!(session_id = %session_id, task_id = %task.id, mode = %mode, "Executing task");

        let token = CancellationToken::new();
        self.cancellations.write().await.insert(task.id.clone(), token.clone());

        task.transition(TaskStatus::Running);
        task.started_at = Some(chrono::Utc::now());
        self.events.emit(OrchestratorEvent::TaskStarted {
            session_id: session_id.to_string(),
            task_id: task.id.clone(),
        });
        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                session.active_tasks.push(task.clone());
            }
        }

        let gate_mode = match (mode, gate) {
            (ProgressMode::Auto, _) => GateMode::None,
            (_, Some(gate)) => GateMode::Callback(gate),
            (_, None) => GateMode::Parked,
        };

        let mut run = PipelineRun::new(mode, &task);
        let outcome = self
            .drive_pipeline(session_id, &mut task, &mut run, &gate_mode, &token)
            .await;

        match outcome {
            Ok(()) => {
                task.result = Some(run.result_with_status("completed"));
                task.transition(TaskStatus::Completed);
                info!(task_id = %task.id, "Task completed");
                self.events.emit(OrchestratorEvent::TaskCompleted { task_id: task.id.clone() });
            }
            Err(error) => {
                task.error = Some(error.clone());
                task.result = Some(run.result_with_status("failed"));
                task.transition(TaskStatus::Failed);
                warn!(task_id = %task.id, error = %error, "Task failed");
                self.events.emit(OrchestratorEvent::TaskFailed {
                    task_id: task.id.clone(),
                    error,
                });
            }
        }
        task.completed_at = Some(chrono::Utc::now());

        self.cancellations.write().await.remove(&task.id);
        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                session.active_tasks.retain(|active| active.id != task.id);
                session.completed_tasks.push(task.clone());
            }
        }
        self.tasks.write().await.insert(task.id.clone(), task.clone());

        Ok(task)
    }

    /// Drives the pipeline to completion, denial, cancellation, or failure.
    ///
    /// `Ok(())` covers both full completion and a denial that skipped the
    /// remaining stages; `Err` carries the failure message for the task.
    async fn drive_pipeline(
        &self,
        session_id: &str,
        task: &mut Task,
        run: &mut PipelineRun,
        gate_mode: &GateMode,
        token: &CancellationToken,
    ) -> std::result::Result<(), String> {
        while let Some(stage) = run.current() {
            if token.is_cancelled() {
                return Err(format!("task cancelled before {stage} stage"));
            }

            if run.requires_approval(stage) && !matches!(gate_mode, GateMode::None) {
                let decision = self.await_decision(session_id, task, run, stage, gate_mode).await;

                if !decision.approved {
                    info!(task_id = %task.id, stage = %stage, "Stage denied, skipping rest of pipeline");
                    for skipped in &Stage::ALL[run.step()..] {
                        self.events.emit(OrchestratorEvent::StageSkipped {
                            task_id: task.id.clone(),
                            stage: *skipped,
                        });
                    }
                    return Ok(());
                }
                if let Some(modifications) = decision.modifications {
                    run.merge_context(modifications);
                }
            }

            self.events.emit(OrchestratorEvent::StageStarted {
                task_id: task.id.clone(),
                stage,
            });

            let Some(agent) = self.agents.get(&stage.role()).cloned() else {
                return Err(format!("no agent registered for {} role", stage.role()));
            };

            let started = Instant::now();
            match agent.execute(task, run.context()).await {
                Ok(output) => {
                    self.metrics.record_success(stage.role(), started.elapsed()).await;
                    run.record(stage, output);
                    self.record_last_action(session_id, stage, &task.id).await;
                    self.events.emit(OrchestratorEvent::StageCompleted {
                        task_id: task.id.clone(),
                        stage,
                    });
                }
                Err(e) => {
                    self.metrics.record_failure(stage.role(), started.elapsed()).await;
                    return Err(format!("{stage} stage failed: {e}"));
                }
            }
        }

        Ok(())
    }

    /// Pauses the task, obtains the approval decision without holding any
    /// lock, and resumes.
    async fn await_decision(
        &self,
        session_id: &str,
        task: &mut Task,
        run: &PipelineRun,
        stage: Stage,
        gate_mode: &GateMode,
    ) -> ApprovalDecision {
        task.transition(TaskStatus::Paused);
        self.sync_active_task(session_id, task).await;
        self.events.emit(OrchestratorEvent::TaskPaused {
            task_id: task.id.clone(),
            stage,
        });

        let decision = match gate_mode {
            GateMode::None => ApprovalDecision::approve(),
            GateMode::Callback(gate) => gate.approve(stage, task).await,
            GateMode::Parked => {
                let receiver = self.approvals.park(&task.id, run.step()).await;
                // A dropped sender counts as a denial.
                receiver.await.unwrap_or_else(|_| ApprovalDecision::deny())
            }
        };

        task.transition(TaskStatus::Running);
        self.sync_active_task(session_id, task).await;
        self.events.emit(OrchestratorEvent::TaskResumed {
            task_id: task.id.clone(),
            stage,
        });

        decision
    }

    /// Notes the completed stage in the session's agent context for the
    /// role that ran it.
    async fn record_last_action(&self, session_id: &str, stage: Stage, task_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if let Some(context) = session.agent_contexts.get_mut(&stage.role()) {
                context.last_action = Some(format!("{stage} for task {task_id}"));
            }
        }
    }

    /// Mirrors the in-flight task's state into its session's active list so
    /// summaries observe pauses.
    async fn sync_active_task(&self, session_id: &str, task: &Task) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if let Some(active) =
                session.active_tasks.iter_mut().find(|active| active.id == task.id)
            {
                *active = task.clone();
            }
        }
    }

    /// Approves a parked pipeline step, optionally merging context
    /// modifications before the stage runs.
    ///
    /// # Errors
    /// Returns `NoPendingApproval` when nothing is parked at that step.
    pub async fn approve_step(
        &self,
        task_id: &str,
        step: usize,
        modifications: Option<Map<String, Value>>,
    ) -> Result<()> {
        let decision = match modifications {
            Some(modifications) => ApprovalDecision::approve_with(modifications),
            None => ApprovalDecision::approve(),
        };
        self.approvals.resolve(task_id, step, decision).await
    }

    /// Denies a parked pipeline step, skipping it and every later stage.
    ///
    /// # Errors
    /// Returns `NoPendingApproval` when nothing is parked at that step.
    pub async fn deny_step(&self, task_id: &str, step: usize) -> Result<()> {
        self.approvals.resolve(task_id, step, ApprovalDecision::deny()).await
    }

    /// Lists `(task id, step index)` pairs currently awaiting approval.
    pub async fn pending_approvals(&self) -> Vec<(String, usize)> {
        self.approvals.pending().await
    }

    /// Requests cooperative cancellation of a running task; honored at the
    /// next stage boundary.
    ///
    /// # Returns
    /// Returns `true` if the task was running and the request was recorded.
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        match self.cancellations.read().await.get(task_id) {
            Some(token) => {
                token.cancel();
                info!(task_id = %task_id, "Task cancellation requested");
                true
            }
            None => {
                warn!(task_id = %task_id, "Attempted to cancel task that is not running");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_providers::{MockProvider, ServiceSettings};

    async fn orchestrator() -> AgentOrchestrator {
        let service = GenerationService::new(ServiceSettings::default());
        service
            .register_provider(
                "mock",
                Arc::new(MockProvider::new("mock").with_available_model("llama2", 0.8)),
            )
            .await;
        AgentOrchestrator::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_create_and_list_sessions() {
        let orchestrator = orchestrator().await;
        assert!(orchestrator.list_sessions().await.is_empty());

        let first = orchestrator.create_session(ProgressMode::Auto).await;
        let second = orchestrator.create_session(ProgressMode::Hybrid).await;

        let sessions = orchestrator.list_sessions().await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.contains(&first));
        assert!(sessions.contains(&second));
    }

    #[tokio::test]
    async fn test_start_session_parses_mode() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.start_session("interactive").await.unwrap();

        let session = orchestrator.session(&session_id).await.unwrap();
        assert_eq!(session.mode, ProgressMode::Interactive);

        let result = orchestrator.start_session("manual").await;
        assert!(matches!(result, Err(OrchestratorError::InvalidMode(_))));
    }

    #[tokio::test]
    async fn test_stop_session_single_and_all() {
        let orchestrator = orchestrator().await;
        let first = orchestrator.create_session(ProgressMode::Auto).await;
        let _second = orchestrator.create_session(ProgressMode::Auto).await;

        assert!(orchestrator.stop_session(Some(&first)).await);
        assert!(!orchestrator.stop_session(Some(&first)).await);
        assert_eq!(orchestrator.list_sessions().await.len(), 1);

        assert!(orchestrator.stop_session(None).await);
        assert!(orchestrator.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_task_unknown_session_is_an_error() {
        let orchestrator = orchestrator().await;
        let task = Task::new("t", "d");
        let result = orchestrator.execute_task("no-such-session", task, None).await;
        assert!(matches!(result, Err(OrchestratorError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_auto_mode_runs_all_stages() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        let task = Task::new("Report", "Write the quarterly report");
        let finished = orchestrator.execute_task(&session_id, task, None).await.unwrap();

        assert_eq!(finished.status, TaskStatus::Completed);
        assert!(finished.error.is_none());

        let result = finished.result.unwrap();
        assert_eq!(result.steps, vec!["coordination", "analysis", "execution", "review"]);
        assert!(result.coordination.is_some());
        assert!(result.analysis.is_some());
        assert!(result.execution.is_some());
        assert!(result.review.is_some());
        assert_eq!(result.status, "completed");
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_pipeline() {
        let service = GenerationService::new(ServiceSettings::default());
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.8);
        // Coordinator's two calls succeed; the analyzer's first call fails.
        provider.push_response("not json");
        provider.push_response("not json");
        provider.push_failure("backend down");
        service.register_provider("mock", Arc::new(provider)).await;

        let orchestrator = AgentOrchestrator::new(Arc::new(service));
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        let task = Task::new("Report", "Write it");
        let finished = orchestrator.execute_task(&session_id, task, None).await.unwrap();

        assert_eq!(finished.status, TaskStatus::Failed);
        let error = finished.error.unwrap();
        assert!(error.contains("analysis stage failed"), "unexpected error: {error}");

        let result = finished.result.unwrap();
        assert_eq!(result.steps, vec!["coordination"]);
        assert!(result.execution.is_none());
        assert_eq!(result.status, "failed");
    }

    #[tokio::test]
    async fn test_session_tracks_completed_tasks() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        let task = Task::new("Report", "Write it");
        orchestrator.execute_task(&session_id, task, None).await.unwrap();

        let summary = orchestrator.get_session_summary(&session_id).await.unwrap();
        assert_eq!(summary.active_tasks, 0);
        assert_eq!(summary.completed_tasks, 1);
    }

    #[tokio::test]
    async fn test_metrics_recorded_per_role() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        let task = Task::new("Report", "Write it");
        orchestrator.execute_task(&session_id, task, None).await.unwrap();

        let metrics = orchestrator.get_agent_metrics().await;
        for role in AgentRole::ALL {
            assert_eq!(metrics[&role].tasks_completed, 1, "role {role} not recorded");
            assert!((metrics[&role].success_rate - 1.0).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_add_task_and_execute_by_id() {
        let orchestrator = orchestrator().await;

        let task_id = orchestrator.add_task("Report", "Write it", Map::new()).await;
        let finished = orchestrator.execute_task_by_id(None, &task_id).await.unwrap();

        assert_eq!(finished.status, TaskStatus::Completed);
        // A default AUTO session was created on the fly.
        assert_eq!(orchestrator.list_sessions().await.len(), 1);
        // The stored task reflects the final state.
        let stored = orchestrator.get_task(&task_id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_execute_by_id_unknown_task() {
        let orchestrator = orchestrator().await;
        let result = orchestrator.execute_task_by_id(None, "no-such-task").await;
        assert!(matches!(result, Err(OrchestratorError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_switch_mode() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        orchestrator.switch_mode(&session_id, ProgressMode::Hybrid).await.unwrap();
        let session = orchestrator.session(&session_id).await.unwrap();
        assert_eq!(session.mode, ProgressMode::Hybrid);

        let result = orchestrator.switch_mode("missing", ProgressMode::Auto).await;
        assert!(matches!(result, Err(OrchestratorError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_session_status_variants() {
        let orchestrator = orchestrator().await;
        let session_id = orchestrator.create_session(ProgressMode::Auto).await;

        match orchestrator.get_session_status(Some(&session_id)).await {
            SessionStatus::Session(summary) => assert_eq!(summary.session_id, session_id),
            other => panic!("unexpected status: {other:?}"),
        }

        match orchestrator.get_session_status(Some("missing")).await {
            SessionStatus::NotFound { session_id } => assert_eq!(session_id, "missing"),
            other => panic!("unexpected status: {other:?}"),
        }

        match orchestrator.get_session_status(None).await {
            SessionStatus::Overview { active_sessions, session_ids } => {
                assert_eq!(active_sessions, 1);
                assert_eq!(session_ids, vec![session_id]);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let orchestrator = orchestrator().await;
        assert!(!orchestrator.cancel_task("no-such-task").await);
    }
}
