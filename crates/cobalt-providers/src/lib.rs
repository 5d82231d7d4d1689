//! Provider implementations for Cobalt.
//!
//! This crate provides concrete implementations of the `Provider` trait and
//! the `GenerationService` that routes requests between them.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and development
//! - **Ollama**: Local models via Ollama (no API key, local execution)

pub mod config;
pub mod ollama;
pub mod registry;
pub mod retry;
pub mod service;

use async_trait::async_trait;
use cobalt_abstraction::{
    GenerationRequest, GenerationResponse, ModelCapability, ModelInfo, ModelType, Provider,
    TextStream,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

pub use config::{ModelEntry, ProviderSettings, ServiceSettings};
pub use ollama::OllamaProvider;
pub use registry::{ModelRegistry, RegistryEntry};
pub use retry::RetryPolicy;
pub use service::{GenerationService, ProviderStatus, ServiceStatus};

/// One scripted reply for the mock provider.
#[derive(Debug, Clone)]
enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// A mock implementation of the `Provider` trait for testing and
/// demonstration.
///
/// Replies can be scripted with [`MockProvider::push_response`] and
/// [`MockProvider::push_failure`]; without a script every call answers with
/// a canned echo of the prompt.
pub struct MockProvider {
    name: String,
    models: Vec<ModelInfo>,
    healthy: AtomicBool,
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicU32,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("models", &self.models.len())
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockProvider {
    /// Creates a new `MockProvider` with the given name and no models.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: Vec::new(),
            healthy: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Adds a model to the mock catalog.
    #[must_use]
    pub fn with_model(mut self, info: ModelInfo) -> Self {
        self.models.push(info);
        self
    }

    /// Adds an available general-purpose model with the given score.
    #[must_use]
    pub fn with_available_model(self, name: impl Into<String>, score: f32) -> Self {
        self.with_model(mock_model_info(name, true, score))
    }

    /// Adds an unavailable model with the given score.
    #[must_use]
    pub fn with_unavailable_model(self, name: impl Into<String>, score: f32) -> Self {
        self.with_model(mock_model_info(name, false, score))
    }

    /// Sets the initial health state.
    #[must_use]
    pub fn with_healthy(self, healthy: bool) -> Self {
        self.healthy.store(healthy, Ordering::Relaxed);
        self
    }

    /// Flips the health state at runtime.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Queues a successful reply returned by the next generate call.
    pub fn push_response(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .push_back(ScriptedReply::Text(text.into()));
    }

    /// Queues a failed reply returned by the next generate call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .push_back(ScriptedReply::Failure(message.into()));
    }

    /// Number of generate/stream calls made so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    fn next_reply(&self, prompt: &str) -> ScriptedReply {
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::Text(format!("Mock response for: {prompt}")))
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResponse {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!(provider = %self.name, prompt_len = request.prompt.len(), "MockProvider generating");

        let model_name = request
            .model_name
            .clone()
            .or_else(|| self.models.first().map(|m| m.name.clone()))
            .unwrap_or_else(|| "mock-model".to_string());

        match self.next_reply(&request.prompt) {
            ScriptedReply::Text(text) => {
                let token_count = count_tokens(&text);
                GenerationResponse::success(text, model_name, Duration::from_millis(1), token_count)
            }
            ScriptedReply::Failure(message) => {
                GenerationResponse::failure(model_name, Duration::from_millis(1), message)
            }
        }
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> TextStream {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let fragments: Vec<String> = match self.next_reply(&request.prompt) {
            ScriptedReply::Text(text) => {
                text.split_inclusive(' ').map(str::to_string).collect()
            }
            ScriptedReply::Failure(message) => vec![format!("[error] {message}")],
        };
        Box::pin(futures::stream::iter(fragments))
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    async fn model_info(&self, model_name: &str) -> Option<ModelInfo> {
        self.models.iter().find(|m| m.name == model_name).cloned()
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

fn mock_model_info(name: impl Into<String>, is_available: bool, score: f32) -> ModelInfo {
    let name = name.into();
    ModelInfo {
        display_name: name.clone(),
        name,
        model_type: ModelType::General,
        capabilities: vec![
            ModelCapability::TextGeneration,
            ModelCapability::QuestionAnswering,
        ],
        max_tokens: 4096,
        context_length: 8192,
        parameter_size: "7B".to_string(),
        memory_requirement: "6GB".to_string(),
        description: "Mock model".to_string(),
        is_available,
        performance_score: score,
    }
}

/// Count tokens in a string (simplified: word count).
///
/// For a real implementation, this would use a proper tokenizer.
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_provider_default_reply() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        let response = provider.generate(&GenerationRequest::new("hello")).await;

        assert!(!response.is_error());
        assert!(response.text.contains("hello"));
        assert_eq!(response.model_name, "llama2");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_replies() {
        let provider = MockProvider::new("mock").with_available_model("llama2", 0.5);
        provider.push_response("first");
        provider.push_failure("backend down");

        let first = provider.generate(&GenerationRequest::new("a")).await;
        assert_eq!(first.text, "first");

        let second = provider.generate(&GenerationRequest::new("b")).await;
        assert!(second.is_error());
        assert_eq!(second.error.as_deref(), Some("backend down"));
    }

    #[tokio::test]
    async fn test_mock_provider_stream_fragments() {
        let provider = MockProvider::new("mock");
        provider.push_response("one two three");

        let stream = provider.generate_stream(&GenerationRequest::new("x")).await;
        let fragments: Vec<String> = stream.collect().await;

        assert_eq!(fragments.concat(), "one two three");
        assert!(fragments.len() > 1);
    }

    #[tokio::test]
    async fn test_mock_provider_health_toggle() {
        let provider = MockProvider::new("mock");
        assert!(provider.is_healthy().await);
        provider.set_healthy(false);
        assert!(!provider.is_healthy().await);
    }
}
