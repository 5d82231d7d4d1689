//! Reviewer agent: quality assessment of the execution output.

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

fn default_score() -> u8 {
    7
}

fn fallback_issues() -> Vec<String> {
    vec!["Review parsing failed".to_string()]
}

fn fallback_suggestions() -> Vec<String> {
    vec!["Manual review recommended".to_string()]
}

/// Review of generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReview {
    /// Code quality score, 1-10.
    #[serde(default = "default_score")]
    pub code_quality: u8,
    /// Readability score, 1-10.
    #[serde(default = "default_score")]
    pub readability: u8,
    /// Security score, 1-10.
    #[serde(default = "default_score")]
    pub security: u8,
    /// Performance score, 1-10.
    #[serde(default = "default_score")]
    pub performance: u8,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Suggested improvements.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Overall score, 1-10.
    #[serde(default = "default_score")]
    pub overall_score: u8,
}

impl Default for CodeReview {
    fn default() -> Self {
        Self {
            code_quality: default_score(),
            readability: default_score(),
            security: default_score(),
            performance: default_score(),
            issues: fallback_issues(),
            suggestions: fallback_suggestions(),
            overall_score: default_score(),
        }
    }
}

/// Review of created content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReview {
    /// Clarity score, 1-10.
    #[serde(default = "default_score")]
    pub clarity: u8,
    /// Accuracy score, 1-10.
    #[serde(default = "default_score")]
    pub accuracy: u8,
    /// Completeness score, 1-10.
    #[serde(default = "default_score")]
    pub completeness: u8,
    /// Engagement score, 1-10.
    #[serde(default = "default_score")]
    pub engagement: u8,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Suggested improvements.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Overall score, 1-10.
    #[serde(default = "default_score")]
    pub overall_score: u8,
}

impl Default for ContentReview {
    fn default() -> Self {
        Self {
            clarity: default_score(),
            accuracy: default_score(),
            completeness: default_score(),
            engagement: default_score(),
            issues: fallback_issues(),
            suggestions: fallback_suggestions(),
            overall_score: default_score(),
        }
    }
}

/// General quality review of a work result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReview {
    /// Completeness score, 1-10.
    #[serde(default = "default_score")]
    pub completeness: u8,
    /// Accuracy score, 1-10.
    #[serde(default = "default_score")]
    pub accuracy: u8,
    /// Efficiency score, 1-10.
    #[serde(default = "default_score")]
    pub efficiency: u8,
    /// Reliability score, 1-10.
    #[serde(default = "default_score")]
    pub reliability: u8,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Suggested improvements.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Overall score, 1-10.
    #[serde(default = "default_score")]
    pub overall_score: u8,
}

impl Default for QualityReview {
    fn default() -> Self {
        Self {
            completeness: default_score(),
            accuracy: default_score(),
            efficiency: default_score(),
            reliability: default_score(),
            issues: fallback_issues(),
            suggestions: fallback_suggestions(),
            overall_score: default_score(),
        }
    }
}

/// The kind-specific review payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReviewPayload {
    /// A code review.
    Code(CodeReview),
    /// A content review.
    Content(ContentReview),
    /// A general quality review.
    Quality(QualityReview),
}

/// Output of the review stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutput {
    /// The dispatched review type.
    pub review_type: String,
    /// The review itself.
    pub review: ReviewPayload,
}

/// Reviewer agent - dispatches on the review type declared in the context.
pub struct ReviewerAgent {
    service: Arc<GenerationService>,
}

impl ReviewerAgent {
    /// Creates a reviewer bound to the given generation service.
    #[must_use]
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }

    /// The result under review: the execution stage's output when present,
    /// else an explicitly provided target.
    fn review_target(context: &Map<String, Value>) -> Value {
        context
            .get("execution")
            .or_else(|| context.get("target_result"))
            .cloned()
            .unwrap_or(Value::Null)
    }

    async fn review_code(&self, target: &Value) -> Result<ReviewPayload, AgentError> {
        let code = target
            .get("payload")
            .and_then(|payload| payload.get("code"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let language = target
            .get("payload")
            .and_then(|payload| payload.get("language"))
            .and_then(Value::as_str)
            .unwrap_or("python");

        let prompt = format!(
            "Review the following {language} code.\n\n\
             ```{language}\n{code}\n```\n\n\
             Answer with a JSON object containing:\n\
             - code_quality: 1-10\n\
             - readability: 1-10\n\
             - security: 1-10\n\
             - performance: 1-10\n\
             - issues: list of problems\n\
             - suggestions: list of improvements\n\
             - overall_score: 1-10",
        );

        let text = generate_text(&self.service, prompt, 1200, 0.4).await?;
        Ok(ReviewPayload::Code(parse_json_payload(&text).unwrap_or_else(|| {
            debug!("Code review output unparseable, using neutral scores");
            CodeReview::default()
        })))
    }

    async fn review_content(&self, target: &Value) -> Result<ReviewPayload, AgentError> {
        let content = target
            .get("payload")
            .and_then(|payload| payload.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content_type = target
            .get("payload")
            .and_then(|payload| payload.get("content_type"))
            .and_then(Value::as_str)
            .unwrap_or("document");

        let prompt = format!(
            "Review the following {content_type}.\n\n\
             {content}\n\n\
             Answer with a JSON object containing:\n\
             - clarity: 1-10\n\
             - accuracy: 1-10\n\
             - completeness: 1-10\n\
             - engagement: 1-10\n\
             - issues: list of problems\n\
             - suggestions: list of improvements\n\
             - overall_score: 1-10",
        );

        let text = generate_text(&self.service, prompt, 1000, 0.5).await?;
        Ok(ReviewPayload::Content(parse_json_payload(&text).unwrap_or_else(|| {
            debug!("Content review output unparseable, using neutral scores");
            ContentReview::default()
        })))
    }

    async fn review_quality(
        &self,
        target: &Value,
        context: &Map<String, Value>,
    ) -> Result<ReviewPayload, AgentError> {
        let prompt = format!(
            "Review the quality of the following work result.\n\n\
             Result: {}\n\
             Context: {}\n\n\
             Answer with a JSON object containing:\n\
             - completeness: 1-10\n\
             - accuracy: 1-10\n\
             - efficiency: 1-10\n\
             - reliability: 1-10\n\
             - issues: list of problems\n\
             - suggestions: list of improvements\n\
             - overall_score: 1-10",
            serde_json::to_string(target).unwrap_or_else(|_| "null".to_string()),
            context_excerpt(context),
        );

        let text = generate_text(&self.service, prompt, 1000, 0.5).await?;
        Ok(ReviewPayload::Quality(parse_json_payload(&text).unwrap_or_else(|| {
            debug!("Quality review output unparseable, using neutral scores");
            QualityReview::default()
        })))
    }
}

#[async_trait]
impl RoleAgent for ReviewerAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Reviewer
    }

    async fn execute(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<StageOutput, AgentError> {
        let review_type = context
            .get("review_type")
            .and_then(Value::as_str)
            .unwrap_or("quality")
            .to_string();
        info!(task_id = %task.id, review_type = %review_type, "Reviewer assessing result");

        let target = Self::review_target(context);
        let review = match review_type.as_str() {
            "code" => self.review_code(&target).await?,
            "content" => self.review_content(&target).await?,
            _ => self.review_quality(&target, context).await?,
        };

        Ok(StageOutput::Review(ReviewOutput { review_type, review }))
    }
}
