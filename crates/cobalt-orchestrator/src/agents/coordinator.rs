//! Coordinator agent: task decomposition and planning.

use crate::error::AgentError;
use crate::task::Task;
use crate::{AgentRole, RoleAgent};
use async_trait::async_trait;
use cobalt_providers::GenerationService;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{StageOutput, context_excerpt, generate_text, parse_json_payload};

fn default_priority() -> u8 {
    1
}

fn default_duration() -> u32 {
    30
}

/// One decomposed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Short title.
    pub title: String,
    /// What the subtask does.
    #[serde(default)]
    pub description: String,
    /// Priority in `1..=5`.
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Estimated duration in minutes.
    #[serde(default = "default_duration")]
    pub estimated_duration: u32,
    /// Skills the subtask calls for.
    #[serde(default)]
    pub required_skills: Vec<String>,
    /// Titles of subtasks this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Subtask {
    /// The fallback when decomposition output cannot be parsed: one
    /// umbrella subtask covering the whole task.
    fn umbrella(task: &Task) -> Self {
        Self {
            title: format!("Sub-task for: {}", task.title),
            description: format!("Execute: {}", task.description),
            priority: task.priority,
            estimated_duration: default_duration(),
            required_skills: vec!["general".to_string()],
            dependencies: Vec::new(),
        }
    }
}

/// The execution plan the coordinator produces for the subtasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationPlan {
    /// Overall ordering strategy.
    #[serde(default)]
    pub execution_order: String,
    /// Groups of subtasks that could run in parallel.
    #[serde(default)]
    pub parallel_groups: Vec<Value>,
    /// How resources are split across subtasks.
    #[serde(default)]
    pub resource_allocation: String,
    /// Rough schedule.
    #[serde(default)]
    pub timeline: String,
    /// Checkpoints at which progress is assessed.
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

impl Default for CoordinationPlan {
    fn default() -> Self {
        Self {
            execution_order: "sequential".to_string(),
            parallel_groups: Vec::new(),
            resource_allocation: "balanced".to_string(),
            timeline: "flexible".to_string(),
            checkpoints: vec![
                "start".to_string(),
                "middle".to_string(),
                "end".to_string(),
            ],
        }
    }
}

/// Output of the coordination stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinationOutput {
    /// The decomposed subtasks.
    pub subtasks: Vec<Subtask>,
    /// The plan for executing them.
    pub plan: CoordinationPlan,
    /// Stage status marker.
    pub status: String,
}

/// Coordinator agent - decomposes tasks and builds the execution plan.
pub struct CoordinatorAgent {
    service: Arc<GenerationService>,
}

impl CoordinatorAgent {
    /// Creates a coordinator bound to the given generation service.
    #[must_use]
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }

    async fn decompose(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<Vec<Subtask>, AgentError> {
        let prompt = format!(
            "Break the following task into small executable subtasks.\n\n\
             Task: {}\n\
             Description: {}\n\
             Context: {}\n\n\
             Answer with a JSON array where each element has these fields:\n\
             - title: subtask title\n\
             - description: detailed description\n\
             - priority: priority from 1 to 5\n\
             - estimated_duration: estimated duration in minutes\n\
             - required_skills: list of required skills\n\
             - dependencies: titles of subtasks this one depends on",
            task.title,
            task.description,
            context_excerpt(context),
        );

        let text = generate_text(&self.service, prompt, 1500, 0.7).await?;

        let subtasks = parse_json_payload::<Vec<Subtask>>(&text)
            .filter(|subtasks| !subtasks.is_empty())
            .unwrap_or_else(|| {
                debug!(task_id = %task.id, "Decomposition output unparseable, using umbrella subtask");
                vec![Subtask::umbrella(task)]
            });

        Ok(subtasks)
    }

    async fn plan(
        &self,
        task: &Task,
        subtasks: &[Subtask],
    ) -> Result<CoordinationPlan, AgentError> {
        let prompt = format!(
            "Create an execution plan for the following task and its subtasks.\n\n\
             Main task: {}\n\
             Subtasks: {}\n\n\
             Answer with a JSON object containing:\n\
             - execution_order: overall ordering strategy\n\
             - parallel_groups: groups of subtasks that can run in parallel\n\
             - resource_allocation: how to split resources\n\
             - timeline: rough schedule\n\
             - checkpoints: list of progress checkpoints",
            task.title,
            serde_json::to_string(subtasks).unwrap_or_else(|_| "[]".to_string()),
        );

        let text = generate_text(&self.service, prompt, 1000, 0.5).await?;

        Ok(parse_json_payload::<CoordinationPlan>(&text).unwrap_or_else(|| {
            debug!(task_id = %task.id, "Plan output unparseable, using sequential default");
            CoordinationPlan::default()
        }))
    }
}

#[async_trait]
impl RoleAgent for CoordinatorAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Coordinator
    }

    async fn execute(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<StageOutput, AgentError> {
        info!(task_id = %task.id, title = %task.title, "Coordinator decomposing task");

        let subtasks = self.decompose(task, context).await?;
        let plan = self.plan(task, &subtasks).await?;

        Ok(StageOutput::Coordination(CoordinationOutput {
            subtasks,
            plan,
            status: "coordinated".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_providers::{MockProvider, ServiceSettings};

    #[tokio::test]
    async fn test_parses_scripted_decomposition() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        provider.push_response(
            r#"[{"title":"Collect data","description":"Pull the numbers","priority":2,
                "estimated_duration":15,"required_skills":["sql"],"dependencies":[]}]"#,
        );
        provider.push_response(
            r#"{"execution_order":"sequential","parallel_groups":[],
                "resource_allocation":"single","timeline":"today","checkpoints":["end"]}"#,
        );

        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = CoordinatorAgent::new(Arc::new(service));

        let task = Task::new("Report", "Quarterly report");
        let output = agent.execute(&task, &Map::new()).await.unwrap();

        let StageOutput::Coordination(coordination) = output else {
            panic!("wrong stage output");
        };
        assert_eq!(coordination.subtasks.len(), 1);
        assert_eq!(coordination.subtasks[0].title, "Collect data");
        assert_eq!(coordination.plan.timeline, "today");
        assert_eq!(coordination.status, "coordinated");
    }

    #[tokio::test]
    async fn test_falls_back_on_unparseable_output() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        // Default mock replies are prose, not JSON.
        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = CoordinatorAgent::new(Arc::new(service));

        let task = Task::new("Report", "Quarterly report").with_priority(3);
        let output = agent.execute(&task, &Map::new()).await.unwrap();

        let StageOutput::Coordination(coordination) = output else {
            panic!("wrong stage output");
        };
        assert_eq!(coordination.subtasks.len(), 1);
        assert!(coordination.subtasks[0].title.contains("Report"));
        assert_eq!(coordination.subtasks[0].priority, 3);
        assert_eq!(coordination.plan.execution_order, "sequential");
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_stage() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        provider.push_failure("backend exploded");

        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = CoordinatorAgent::new(Arc::new(service));

        let task = Task::new("Report", "Quarterly report");
        let result = agent.execute(&task, &Map::new()).await;

        assert!(matches!(result, Err(AgentError::Generation(_))));
    }
}
