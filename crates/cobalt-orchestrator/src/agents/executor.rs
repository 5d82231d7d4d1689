//! Executor agent: performs the actual work of the task.

use crate::error::AgentError;
use crate::task::Task;
use crate::{AgentRole, RoleAgent};
use async_trait::async_trait;
use cobalt_providers::GenerationService;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use super::{StageOutput, context_excerpt, generate_text};

/// The kind-specific payload the executor produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPayload {
    /// Generated source code.
    Code {
        /// The generated code, commentary included.
        code: String,
        /// Target language.
        language: String,
        /// Stage status marker.
        status: String,
    },
    /// Created content.
    Content {
        /// The content text.
        content: String,
        /// Kind of content (document, email, ...).
        content_type: String,
        /// Writing style.
        style: String,
        /// Stage status marker.
        status: String,
    },
    /// Output of a general task.
    General {
        /// The model's report.
        output: String,
        /// Stage status marker.
        status: String,
    },
}

/// Output of the execution stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// The dispatched task type.
    pub task_type: String,
    /// The kind-specific payload.
    pub payload: ExecutionPayload,
}

/// Executor agent - dispatches on the task type declared in the context.
pub struct ExecutorAgent {
    service: Arc<GenerationService>,
}

impl ExecutorAgent {
    /// Creates an executor bound to the given generation service.
    #[must_use]
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }

    async fn generate_code(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<ExecutionPayload, AgentError> {
        let language = str_from(context, "language").unwrap_or("python").to_string();
        let requirements =
            str_from(context, "requirements").unwrap_or(&task.description).to_string();

        let prompt = format!(
            "Generate {language} code for the following requirements.\n\n\
             Requirements: {requirements}\n\
             Language: {language}\n\n\
             Include the code itself, explanatory comments, and a short\n\
             usage example.",
        );

        let code = generate_text(&self.service, prompt, 2000, 0.3).await?;
        Ok(ExecutionPayload::Code { code, language, status: "generated".to_string() })
    }

    async fn create_content(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<ExecutionPayload, AgentError> {
        let content_type = str_from(context, "content_type").unwrap_or("document").to_string();
        let style = str_from(context, "style").unwrap_or("professional").to_string();

        let prompt = format!(
            "Create a {content_type} with the following specification.\n\n\
             Title: {}\n\
             Content: {}\n\
             Style: {style}\n\n\
             Produce high-quality, readable content.",
            task.title, task.description,
        );

        let content = generate_text(&self.service, prompt, 1500, 0.7).await?;
        Ok(ExecutionPayload::Content {
            content,
            content_type,
            style,
            status: "created".to_string(),
        })
    }

    async fn execute_general(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<ExecutionPayload, AgentError> {
        let prompt = format!(
            "Carry out the following task.\n\n\
             Task: {}\n\
             Description: {}\n\
             Context: {}\n\n\
             Work through the task and report the result.",
            task.title,
            task.description,
            context_excerpt(context),
        );

        let output = generate_text(&self.service, prompt, 1000, 0.6).await?;
        Ok(ExecutionPayload::General { output, status: "executed".to_string() })
    }
}

#[async_trait]
impl RoleAgent for ExecutorAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Executor
    }

    async fn execute(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<StageOutput, AgentError> {
        let task_type = str_from(context, "task_type").unwrap_or("general").to_string();
        info!(task_id = %task.id, task_type = %task_type, "Executor running task");

        let payload = match task_type.as_str() {
            "code_generation" => self.generate_code(task, context).await?,
            "content_creation" => self.create_content(task, context).await?,
            _ => self.execute_general(task, context).await?,
        };

        Ok(StageOutput::Execution(ExecutionOutput { task_type, payload }))
    }
}

fn str_from<'a>(context: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}
