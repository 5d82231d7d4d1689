//! The resumable pipeline state driving one task through its stages.

use crate::agents::StageOutput;
use crate::session::ProgressMode;
use crate::task::{Stage, Task, TaskResult};
use serde_json::{Map, Value};
use tracing::debug;

/// Resumable pipeline state: the current step index plus everything
/// accumulated so far.
///
/// The driver advances this object instead of re-entering itself, so a
/// paused pipeline resumes from its stored step.
#[derive(Debug)]
pub(crate) struct PipelineRun {
    mode: ProgressMode,
    index: usize,
    result: TaskResult,
    context: Map<String, Value>,
}

impl PipelineRun {
    /// Starts a run for the given task, seeding the stage context from the
    /// task's own context plus the mode marker.
    pub(crate) fn new(mode: ProgressMode, task: &Task) -> Self {
        let mut context = task.context.clone();
        context.insert("mode".to_string(), Value::String(mode.to_string()));
        Self { mode, index: 0, result: TaskResult::new(mode), context }
    }

    /// The stage about to run, or `None` when the pipeline is exhausted.
    pub(crate) fn current(&self) -> Option<Stage> {
        Stage::ALL.get(self.index).copied()
    }

    /// Zero-based index of the stage about to run.
    pub(crate) fn step(&self) -> usize {
        self.index
    }

    /// Whether the current mode gates the given stage behind approval.
    pub(crate) fn requires_approval(&self, stage: Stage) -> bool {
        match self.mode {
            ProgressMode::Auto => false,
            ProgressMode::Interactive => true,
            ProgressMode::Hybrid => matches!(stage, Stage::Execution | Stage::Review),
        }
    }

    /// The accumulated stage context.
    pub(crate) fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Merges approval modifications into the stage context.
    pub(crate) fn merge_context(&mut self, modifications: Map<String, Value>) {
        for (key, value) in modifications {
            self.context.insert(key, value);
        }
    }

    /// Records a completed stage: stores its output, merges it into the
    /// context for later stages, and advances the step index.
    pub(crate) fn record(&mut self, stage: Stage, output: StageOutput) {
        if let Ok(value) = serde_json::to_value(&output) {
            self.context.insert(stage.key().to_string(), value);
        }

        match output {
            StageOutput::Coordination(payload) => self.result.coordination = Some(payload),
            StageOutput::Analysis(payload) => self.result.analysis = Some(payload),
            StageOutput::Execution(payload) => self.result.execution = Some(payload),
            StageOutput::Review(payload) => self.result.review = Some(payload),
        }

        self.result.steps.push(stage.key().to_string());
        self.index += 1;
        debug!(stage = %stage, step = self.index, "Stage recorded");
    }

    /// Snapshots the accumulated result with the given final status.
    pub(crate) fn result_with_status(&self, status: &str) -> TaskResult {
        let mut result = self.result.clone();
        result.status = status.to_string();
        result
    }
}
