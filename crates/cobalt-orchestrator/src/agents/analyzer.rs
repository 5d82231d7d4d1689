//! Analyzer agent: requirements analysis, risk assessment, recommendations.

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

const MAX_RECOMMENDATIONS: usize = 10;

/// Structured requirements analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementsAnalysis {
    /// What the result must do.
    #[serde(default)]
    pub functional_requirements: Vec<String>,
    /// Qualities the result must have.
    #[serde(default)]
    pub non_functional_requirements: Vec<String>,
    /// Hard constraints.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Assumptions the analysis rests on.
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// How success is judged.
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl Default for RequirementsAnalysis {
    fn default() -> Self {
        Self {
            functional_requirements: vec!["Basic task execution".to_string()],
            non_functional_requirements: vec![
                "Reliability".to_string(),
                "Performance".to_string(),
            ],
            constraints: vec!["Time".to_string(), "Resources".to_string()],
            assumptions: vec!["Standard environment".to_string()],
            success_criteria: vec!["Task completion".to_string()],
        }
    }
}

fn default_probability() -> f32 {
    0.5
}

fn default_impact() -> u8 {
    3
}

/// One identified risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    /// The risk category.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// What could go wrong.
    #[serde(default)]
    pub description: String,
    /// Probability in `0.0..=1.0`.
    #[serde(default = "default_probability")]
    pub probability: f32,
    /// Impact from 1 to 5.
    #[serde(default = "default_impact")]
    pub impact: u8,
    /// How to mitigate it.
    #[serde(default)]
    pub mitigation: String,
}

impl Risk {
    /// The fallback when risk output cannot be parsed.
    fn unknown() -> Self {
        Self {
            kind: "unknown".to_string(),
            description: "Risk assessment failed".to_string(),
            probability: default_probability(),
            impact: default_impact(),
            mitigation: "Monitor closely".to_string(),
        }
    }
}

/// Output of the analysis stage.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    /// The requirements analysis.
    pub analysis: RequirementsAnalysis,
    /// Identified risks.
    pub risks: Vec<Risk>,
    /// Actionable recommendations.
    pub recommendations: Vec<String>,
}

/// Analyzer agent - evaluates the task before execution.
pub struct AnalyzerAgent {
    service: Arc<GenerationService>,
}

impl AnalyzerAgent {
    /// Creates an analyzer bound to the given generation service.
    #[must_use]
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }

    async fn analyze_requirements(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<RequirementsAnalysis, AgentError> {
        let prompt = format!(
            "Analyze the requirements of the following task.\n\n\
             Task: {}\n\
             Description: {}\n\
             Context: {}\n\n\
             Answer with a JSON object containing:\n\
             - functional_requirements\n\
             - non_functional_requirements\n\
             - constraints\n\
             - assumptions\n\
             - success_criteria",
            task.title,
            task.description,
            context_excerpt(context),
        );

        let text = generate_text(&self.service, prompt, 1200, 0.6).await?;

        Ok(parse_json_payload::<RequirementsAnalysis>(&text).unwrap_or_else(|| {
            debug!(task_id = %task.id, "Requirements output unparseable, using defaults");
            RequirementsAnalysis::default()
        }))
    }

    async fn assess_risks(&self, task: &Task) -> Result<Vec<Risk>, AgentError> {
        let prompt = format!(
            "Assess the risks of the following task.\n\n\
             Task: {}\n\
             Description: {}\n\n\
             Answer with a JSON array where each element has:\n\
             - type: risk category\n\
             - description: what could go wrong\n\
             - probability: probability from 0.0 to 1.0\n\
             - impact: impact from 1 to 5\n\
             - mitigation: how to reduce the risk",
            task.title, task.description,
        );

        let text = generate_text(&self.service, prompt, 1000, 0.7).await?;

        let risks = parse_json_payload::<Vec<Risk>>(&text)
            .filter(|risks| !risks.is_empty())
            .unwrap_or_else(|| {
                debug!(task_id = %task.id, "Risk output unparseable, using unknown risk");
                vec![Risk::unknown()]
            });

        Ok(risks)
    }

    async fn recommend(
        &self,
        task: &Task,
        analysis: &RequirementsAnalysis,
        risks: &[Risk],
    ) -> Result<Vec<String>, AgentError> {
        let prompt = format!(
            "Based on the analysis and risks below, produce concrete,\n\
             actionable recommendations, one per line.\n\n\
             Task: {}\n\
             Analysis: {}\n\
             Risks: {}",
            task.title,
            serde_json::to_string(analysis).unwrap_or_else(|_| "{}".to_string()),
            serde_json::to_string(risks).unwrap_or_else(|_| "[]".to_string()),
        );

        let text = generate_text(&self.service, prompt, 800, 0.7).await?;

        // Plain line-split extraction; headings are dropped.
        let recommendations = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .take(MAX_RECOMMENDATIONS)
            .collect();

        Ok(recommendations)
    }
}

#[async_trait]
impl RoleAgent for AnalyzerAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Analyzer
    }

    async fn execute(
        &self,
        task: &Task,
        context: &Map<String, Value>,
    ) -> Result<StageOutput, AgentError> {
        info!(task_id = %task.id, title = %task.title, "Analyzer evaluating task");

        let analysis = self.analyze_requirements(task, context).await?;
        let risks = self.assess_risks(task).await?;
        let recommendations = self.recommend(task, &analysis, &risks).await?;

        Ok(StageOutput::Analysis(AnalysisOutput { analysis, risks, recommendations }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_providers::{MockProvider, ServiceSettings};

    #[tokio::test]
    async fn test_parses_scripted_analysis() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        provider.push_response(
            r#"{"functional_requirements":["Parse input"],"non_functional_requirements":["Fast"],
                "constraints":["One day"],"assumptions":["Clean data"],"success_criteria":["Done"]}"#,
        );
        provider.push_response(
            r#"[{"type":"schedule","description":"May slip","probability":0.2,"impact":2,
                "mitigation":"Start early"}]"#,
        );
        provider.push_response("Do the thing\n# heading\nCheck the result");

        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = AnalyzerAgent::new(Arc::new(service));

        let task = Task::new("Analyze", "Some work");
        let output = agent.execute(&task, &Map::new()).await.unwrap();

        let StageOutput::Analysis(analysis) = output else {
            panic!("wrong stage output");
        };
        assert_eq!(analysis.analysis.functional_requirements, vec!["Parse input"]);
        assert_eq!(analysis.risks[0].kind, "schedule");
        assert_eq!(analysis.recommendations, vec!["Do the thing", "Check the result"]);
    }

    #[tokio::test]
    async fn test_falls_back_on_unparseable_output() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = AnalyzerAgent::new(Arc::new(service));

        let task = Task::new("Analyze", "Some work");
        let output = agent.execute(&task, &Map::new()).await.unwrap();

        let StageOutput::Analysis(analysis) = output else {
            panic!("wrong stage output");
        };
        assert_eq!(analysis.analysis, RequirementsAnalysis::default());
        assert_eq!(analysis.risks[0].kind, "unknown");
        // Default mock prose still yields line-split recommendations.
        assert!(!analysis.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_stage() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        provider.push_response(r#"{"functional_requirements":["x"]}"#);
        provider.push_failure("rate limited");

        let service = GenerationService::new(ServiceSettings::default());
        service.register_provider("mock", Arc::new(provider)).await;
        let agent = AnalyzerAgent::new(Arc::new(service));

        let task = Task::new("Analyze", "Some work");
        let result = agent.execute(&task, &Map::new()).await;

        assert!(matches!(result, Err(AgentError::Generation(_))));
    }
}
