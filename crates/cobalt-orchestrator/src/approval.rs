//! Approval gates for interactive and hybrid progress modes.
//!
//! A gated stage pauses its task until a decision arrives, either from a
//! caller-supplied [`ApprovalGate`] or from the pending-approval surface
//! (`approve_step`/`deny_step`), which resumes a parked pipeline by message
//! passing over a oneshot channel.

use crate::error::{OrchestratorError, Result};
use crate::task::{Stage, Task};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

/// The outcome of one approval request.
#[derive(Debug, Clone, Default)]
pub struct ApprovalDecision {
    /// Whether the stage may run. A denial skips the stage and every later
    /// one.
    pub approved: bool,
    /// Optional context modifications merged into the stage context before
    /// it runs.
    pub modifications: Option<Map<String, Value>>,
}

impl ApprovalDecision {
    /// An unconditional approval.
    #[must_use]
    pub fn approve() -> Self {
        Self { approved: true, modifications: None }
    }

    /// An approval that merges modifications into the stage context.
    #[must_use]
    pub fn approve_with(modifications: Map<String, Value>) -> Self {
        Self { approved: true, modifications: Some(modifications) }
    }

    /// A denial.
    #[must_use]
    pub fn deny() -> Self {
        Self { approved: false, modifications: None }
    }
}

/// Decides whether a gated stage may run.
///
/// Implementations may block on human input; the orchestrator holds no lock
/// while awaiting them.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Returns the decision for the given stage of the given task.
    async fn approve(&self, stage: Stage, task: &Task) -> ApprovalDecision;
}

/// A gate that approves everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn approve(&self, _stage: Stage, _task: &Task) -> ApprovalDecision {
        ApprovalDecision::approve()
    }
}

/// Adapts a synchronous closure into a gate. Handy in tests and simple
/// drivers.
pub struct FnGate<F>
where
    F: Fn(Stage, &Task) -> bool + Send + Sync,
{
    decide: F,
}

impl<F> FnGate<F>
where
    F: Fn(Stage, &Task) -> bool + Send + Sync,
{
    /// Wraps the closure.
    #[must_use]
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F> ApprovalGate for FnGate<F>
where
    F: Fn(Stage, &Task) -> bool + Send + Sync,
{
    async fn approve(&self, stage: Stage, task: &Task) -> ApprovalDecision {
        if (self.decide)(stage, task) {
            ApprovalDecision::approve()
        } else {
            ApprovalDecision::deny()
        }
    }
}

/// Parked pipelines waiting for an external approval decision.
///
/// Keys are `(task id, zero-based step index)`; each entry resolves exactly
/// once.
#[derive(Debug, Default)]
pub struct PendingApprovals {
    waiting: Mutex<HashMap<(String, usize), oneshot::Sender<ApprovalDecision>>>,
}

impl PendingApprovals {
    /// Creates an empty parking surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter and returns the receiver the pipeline awaits.
    pub(crate) async fn park(
        &self,
        task_id: &str,
        step: usize,
    ) -> oneshot::Receiver<ApprovalDecision> {
        let (tx, rx) = oneshot::channel();
        debug!(task_id = %task_id, step, "Parking pipeline for approval");
        self.waiting.lock().await.insert((task_id.to_string(), step), tx);
        rx
    }

    /// Resolves a parked pipeline with the given decision.
    ///
    /// # Errors
    /// Returns `NoPendingApproval` when nothing is parked at that step.
    pub async fn resolve(
        &self,
        task_id: &str,
        step: usize,
        decision: ApprovalDecision,
    ) -> Result<()> {
        let sender = self.waiting.lock().await.remove(&(task_id.to_string(), step));
        match sender {
            Some(tx) => {
                if tx.send(decision).is_err() {
                    warn!(task_id = %task_id, step, "Parked pipeline went away before resolution");
                }
                Ok(())
            }
            None => Err(OrchestratorError::NoPendingApproval {
                task_id: task_id.to_string(),
                step,
            }),
        }
    }

    /// Lists `(task id, step index)` pairs currently waiting.
    pub async fn pending(&self) -> Vec<(String, usize)> {
        self.waiting.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_approve_approves_all_stages() {
        let gate = AutoApprove;
        let task = Task::new("t", "d");
        for stage in Stage::ALL {
            assert!(gate.approve(stage, &task).await.approved);
        }
    }

    #[tokio::test]
    async fn test_fn_gate_denies_selected_stage() {
        let gate = FnGate::new(|stage, _task| stage != Stage::Execution);
        let task = Task::new("t", "d");
        assert!(gate.approve(Stage::Coordination, &task).await.approved);
        assert!(!gate.approve(Stage::Execution, &task).await.approved);
    }

    #[tokio::test]
    async fn test_park_and_resolve() {
        let approvals = PendingApprovals::new();
        let rx = approvals.park("task-1", 0).await;

        assert_eq!(approvals.pending().await, vec![("task-1".to_string(), 0)]);

        approvals
            .resolve("task-1", 0, ApprovalDecision::approve())
            .await
            .unwrap();
        let decision = rx.await.unwrap();
        assert!(decision.approved);
        assert!(approvals.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_without_waiter_is_an_error() {
        let approvals = PendingApprovals::new();
        let result = approvals.resolve("task-1", 2, ApprovalDecision::deny()).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::NoPendingApproval { step: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_decision_with_modifications() {
        let mut modifications = Map::new();
        modifications.insert("language".to_string(), Value::String("rust".to_string()));
        let decision = ApprovalDecision::approve_with(modifications);
        assert!(decision.approved);
        assert!(decision.modifications.unwrap().contains_key("language"));
    }
}
