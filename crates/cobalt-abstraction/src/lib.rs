//! Provider abstraction layer for Cobalt.
//!
//! This module defines the core trait and value types for talking to
//! interchangeable model backends.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Represents an error that can occur when talking to a model backend.
///
/// Generation errors are never propagated past a provider as `Err`; they are
/// folded into [`GenerationResponse::failure`]. This type exists for the
/// provider internals (retry classification) and for constructor failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderError {
    /// The request could not be sent (connection refused, DNS, TLS).
    #[error("Request Error: {0}")]
    Request(String),

    /// The request timed out before the backend answered.
    #[error("Request Timeout: {0}")]
    Timeout(String),

    /// The backend answered with a non-success HTTP status.
    #[error("Backend Error ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Response body or a short description of the failure.
        message: String,
    },

    /// The response body could not be parsed.
    #[error("Serialization Error: {0}")]
    Serialization(String),

    /// No model could be resolved for the request.
    #[error("No Available Model: {0}")]
    NoModel(String),

    /// No registered provider can serve the request.
    #[error("No Available Provider: {0}")]
    NoProvider(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts, connection failures, and 5xx responses are transient;
    /// everything else (4xx, parse failures, routing failures) is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Backend { status, .. } => *status >= 500,
            Self::Serialization(_) | Self::NoModel(_) | Self::NoProvider(_) => false,
        }
    }
}

/// Broad classification of what a model is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// General-purpose tasks.
    General,
    /// Code generation and analysis.
    Code,
    /// Conversational use.
    Chat,
    /// Instruction following.
    Instruction,
    /// Embedding vector generation.
    Embedding,
}

/// A capability tag used for routing requests to models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapability {
    /// Free-form text generation.
    TextGeneration,
    /// Source code generation.
    CodeGeneration,
    /// Question answering.
    QuestionAnswering,
    /// Summarization.
    Summarization,
    /// Translation.
    Translation,
    /// Embedding vector generation.
    Embedding,
    /// Structured function/tool calling.
    FunctionCalling,
}

/// Catalog information about one model a provider can serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Logical model name (e.g., "deepseek-coder").
    pub name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// What the model is built for.
    pub model_type: ModelType,
    /// Capability tags used for routing.
    pub capabilities: Vec<ModelCapability>,
    /// Maximum number of tokens the model will generate.
    pub max_tokens: u32,
    /// Context window length in tokens.
    pub context_length: u32,
    /// Parameter count label (e.g., "7B").
    pub parameter_size: String,
    /// Approximate memory required to load the model (e.g., "8GB").
    pub memory_requirement: String,
    /// Short description.
    pub description: String,
    /// Whether the model was confirmed reachable within the last
    /// health-check interval.
    pub is_available: bool,
    /// Relative quality score in `0.0..=1.0`, used for automatic selection.
    pub performance_score: f32,
}

impl ModelInfo {
    /// Whether the model advertises the given capability.
    #[must_use]
    pub fn has_capability(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Parameters controlling a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sequences that stop generation.
    pub stop_sequences: Vec<String>,
    /// Optional seed for reproducible sampling.
    pub seed: Option<u64>,
    /// Whether the caller wants a streamed response.
    pub stream: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_tokens: 1000,
            stop_sequences: Vec::new(),
            seed: None,
            stream: false,
        }
    }
}

/// One generation request. Immutable value, one per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The input prompt.
    pub prompt: String,
    /// Explicit logical model name, or `None` for automatic selection.
    pub model_name: Option<String>,
    /// Generation parameters.
    pub config: GenerationConfig,
    /// Caller-supplied metadata, passed through untouched.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Creates a request for the given prompt with default parameters and
    /// automatic model selection.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_name: None,
            config: GenerationConfig::default(),
            metadata: HashMap::new(),
        }
    }

    /// Pins the request to an explicit logical model name.
    #[must_use]
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Sets the generation parameters.
    #[must_use]
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model finished naturally or hit a stop sequence.
    Stop,
    /// The token budget was exhausted.
    Length,
    /// Generation failed; the response carries an error.
    Error,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The outcome of one generation call. Always returned; errors are encoded
/// as data, never thrown.
///
/// Invariant: either `error` is set and `finish_reason == Error`, or `text`
/// is non-empty and `finish_reason != Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text. Empty on failure.
    pub text: String,
    /// The physical model name that served the request.
    pub model_name: String,
    /// Wall-clock time the call took, retries included.
    pub generation_time: Duration,
    /// Token count reported by the backend, or an estimate from text length.
    pub token_count: u32,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Human-readable error when `finish_reason == Error`.
    pub error: Option<String>,
}

impl GenerationResponse {
    /// Builds a successful response.
    #[must_use]
    pub fn success(
        text: impl Into<String>,
        model_name: impl Into<String>,
        generation_time: Duration,
        token_count: u32,
    ) -> Self {
        Self {
            text: text.into(),
            model_name: model_name.into(),
            generation_time,
            token_count,
            finish_reason: FinishReason::Stop,
            error: None,
        }
    }

    /// Builds a failed response carrying the error as data.
    #[must_use]
    pub fn failure(
        model_name: impl Into<String>,
        generation_time: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            text: String::new(),
            model_name: model_name.into(),
            generation_time,
            token_count: 0,
            finish_reason: FinishReason::Error,
            error: Some(error.into()),
        }
    }

    /// Whether the call failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.finish_reason == FinishReason::Error
    }
}

/// A lazy, finite, non-restartable sequence of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// A trait for talking to one model backend.
///
/// All providers must be `Send + Sync` to allow concurrent use across threads.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider's registered name (e.g., "ollama").
    fn name(&self) -> &str;

    /// Generates text for the given request.
    ///
    /// Never returns an error: transient failures are retried internally and
    /// any remaining failure is folded into the response.
    async fn generate(&self, request: &GenerationRequest) -> GenerationResponse;

    /// Generates text as a stream of fragments.
    ///
    /// The stream ends on the backend's completion signal. On error it yields
    /// one diagnostic fragment, then stops.
    async fn generate_stream(&self, request: &GenerationRequest) -> TextStream;

    /// Lists the models this provider knows about, with availability
    /// reconciled against the live catalog.
    async fn list_models(&self) -> Vec<ModelInfo>;

    /// Looks up catalog information for one logical model name.
    async fn model_info(&self, model_name: &str) -> Option<ModelInfo>;

    /// Probes the backend. `true` means it answered the catalog endpoint.
    async fn is_healthy(&self) -> bool;
}
