//! The four role agents of the pipeline.
//!
//! Each role is stateless: it reads the task and the accumulated stage
//! context, issues one or more generation calls, and returns a typed stage
//! output. Unparseable model output is recovered locally with a typed
//! fallback; only generation-level failures abort a stage.

pub mod analyzer;
pub mod coordinator;
pub mod executor;
pub mod reviewer;

pub use analyzer::{AnalysisOutput, AnalyzerAgent, RequirementsAnalysis, Risk};
pub use coordinator::{CoordinationOutput, CoordinationPlan, CoordinatorAgent, Subtask};
pub use executor::{ExecutionOutput, ExecutionPayload, ExecutorAgent};
pub use reviewer::{
    CodeReview, ContentReview, QualityReview, ReviewOutput, ReviewPayload, ReviewerAgent,
};

use crate::error::AgentError;
use crate::task::Stage;
use cobalt_abstraction::{GenerationConfig, GenerationRequest};
use cobalt_providers::GenerationService;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// The typed output one stage produces.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StageOutput {
    /// Coordinator output.
    Coordination(CoordinationOutput),
    /// Analyzer output.
    Analysis(AnalysisOutput),
    /// Executor output.
    Execution(ExecutionOutput),
    /// Reviewer output.
    Review(ReviewOutput),
}

impl StageOutput {
    /// The stage this output belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Coordination(_) => Stage::Coordination,
            Self::Analysis(_) => Stage::Analysis,
            Self::Execution(_) => Stage::Execution,
            Self::Review(_) => Stage::Review,
        }
    }
}

/// Issues one generation call and maps an error-bearing response to a
/// stage-level failure.
pub(crate) async fn generate_text(
    service: &GenerationService,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
) -> Result<String, AgentError> {
    let config = GenerationConfig { max_tokens, temperature, ..GenerationConfig::default() };
    let request = GenerationRequest::new(prompt).with_config(config);

    let response = service.generate(&request).await;
    if response.is_error() {
        return Err(AgentError::Generation(
            response.error.unwrap_or_else(|| "unknown generation failure".to_string()),
        ));
    }
    Ok(response.text)
}

/// Renders the stage context for inclusion in a prompt.
pub(crate) fn context_excerpt(context: &Map<String, Value>) -> String {
    serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string())
}

/// Parses a JSON payload out of model output, tolerating markdown fences
/// and surrounding prose. Returns `None` when nothing parseable is found;
/// callers substitute a typed fallback.
pub(crate) fn parse_json_payload<T: DeserializeOwned>(text: &str) -> Option<T> {
    let cleaned = strip_code_fences(text);
    let candidate = extract_json(cleaned)?;
    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Model output did not parse as the expected JSON shape");
            None
        }
    }
}

/// Strips a leading/trailing markdown code fence if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence's language tag line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Slices the outermost JSON object or array out of surrounding prose.
fn extract_json(text: &str) -> Option<&str> {
    let object = text.find('{').map(|start| (start, '}'));
    let array = text.find('[').map(|start| (start, ']'));

    let (start, closer) = match (object, array) {
        (Some(o), Some(a)) => {
            if o.0 < a.0 {
                o
            } else {
                a
            }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    let end = text.rfind(closer)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Option<Sample> = parse_json_payload(r#"{"value": 3}"#);
        assert_eq!(parsed, Some(Sample { value: 3 }));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"value\": 7}\n```";
        let parsed: Option<Sample> = parse_json_payload(text);
        assert_eq!(parsed, Some(Sample { value: 7 }));
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let text = "Here is the result:\n{\"value\": 9}\nLet me know if you need more.";
        let parsed: Option<Sample> = parse_json_payload(text);
        assert_eq!(parsed, Some(Sample { value: 9 }));
    }

    #[test]
    fn test_parse_array_payload() {
        let parsed: Option<Vec<Sample>> =
            parse_json_payload("noise [ {\"value\": 1}, {\"value\": 2} ] noise");
        assert_eq!(parsed.map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        let parsed: Option<Sample> = parse_json_payload("no structure here at all");
        assert_eq!(parsed, None);

        let parsed: Option<Sample> = parse_json_payload("{\"value\": \"not a number\"}");
        assert_eq!(parsed, None);
    }
}
