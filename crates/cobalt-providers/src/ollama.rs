//! Ollama provider implementation.
//!
//! This module provides an implementation of the `Provider` trait for
//! Ollama's local API. It owns the retry/backoff schedule, the TTL-cached
//! live catalog, and the logical-to-physical model name resolution.

use crate::config::{ModelEntry, ProviderSettings};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use cobalt_abstraction::{
    FinishReason, GenerationConfig, GenerationRequest, GenerationResponse, ModelCapability,
    ModelInfo, ModelType, Provider, ProviderError, TextStream,
};
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// How long a fetched live catalog stays valid.
const CATALOG_TTL: Duration = Duration::from_secs(300);

/// Timeout for the lightweight health/catalog probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed preference order used when no configured pattern matches.
const PREFERRED_MODELS: &[&str] = &["deepseek-coder", "llama2", "mistral", "codellama"];

/// Ollama provider implementation.
pub struct OllamaProvider {
    /// The base URL for the Ollama API (default: "http://localhost:11434").
    base_url: String,
    /// Base per-attempt timeout; grows per retry attempt.
    timeout: Duration,
    /// Retry schedule for transient failures.
    retry: RetryPolicy,
    /// Per-model routing entries keyed by logical name.
    models: HashMap<String, ModelEntry>,
    /// HTTP client for making requests.
    client: Client,
    /// TTL-cached live catalog; single-writer refresh, many readers.
    catalog: RwLock<Option<CatalogCache>>,
    /// How long a fetched catalog stays valid.
    catalog_ttl: Duration,
}

#[derive(Debug, Clone)]
struct CatalogCache {
    models: Vec<String>,
    fetched_at: Instant,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("model_entries", &self.models.len())
            .finish_non_exhaustive()
    }
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` from the given settings.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the HTTP client cannot be created.
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout(),
            retry: RetryPolicy::default(),
            models: settings.models.clone(),
            client,
            catalog: RwLock::new(None),
            catalog_ttl: CATALOG_TTL,
        })
    }

    /// Creates a new `OllamaProvider` with a custom base URL and defaults
    /// everywhere else.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: ProviderSettings::default().timeout(),
            retry: RetryPolicy::default(),
            models: HashMap::new(),
            client: Client::builder().build().unwrap_or_else(|_| Client::new()),
            catalog: RwLock::new(None),
            catalog_ttl: CATALOG_TTL,
        }
    }

    /// Replaces the retry schedule.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides how long the live catalog stays cached.
    #[must_use]
    pub fn with_catalog_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_ttl = ttl;
        self
    }

    /// Static definitions of the models this provider knows how to route to.
    fn model_definitions() -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: "deepseek-coder".to_string(),
                display_name: "DeepSeek Coder".to_string(),
                model_type: ModelType::Code,
                capabilities: vec![
                    ModelCapability::CodeGeneration,
                    ModelCapability::TextGeneration,
                    ModelCapability::QuestionAnswering,
                ],
                max_tokens: 4096,
                context_length: 16384,
                parameter_size: "6.7B".to_string(),
                memory_requirement: "8GB".to_string(),
                description: "High-performance open model specialized for code generation"
                    .to_string(),
                is_available: false,
                performance_score: 0.85,
            },
            ModelInfo {
                name: "llama2".to_string(),
                display_name: "Llama 2".to_string(),
                model_type: ModelType::General,
                capabilities: vec![
                    ModelCapability::TextGeneration,
                    ModelCapability::QuestionAnswering,
                    ModelCapability::Summarization,
                ],
                max_tokens: 4096,
                context_length: 8192,
                parameter_size: "7B".to_string(),
                memory_requirement: "6GB".to_string(),
                description: "Meta's general-purpose LLM".to_string(),
                is_available: false,
                performance_score: 0.75,
            },
            ModelInfo {
                name: "mistral".to_string(),
                display_name: "Mistral".to_string(),
                model_type: ModelType::General,
                capabilities: vec![
                    ModelCapability::TextGeneration,
                    ModelCapability::QuestionAnswering,
                ],
                max_tokens: 4096,
                context_length: 8192,
                parameter_size: "7B".to_string(),
                memory_requirement: "6GB".to_string(),
                description: "Compact high-performance LLM".to_string(),
                is_available: false,
                performance_score: 0.80,
            },
            ModelInfo {
                name: "codellama".to_string(),
                display_name: "Code Llama".to_string(),
                model_type: ModelType::Code,
                capabilities: vec![
                    ModelCapability::CodeGeneration,
                    ModelCapability::TextGeneration,
                ],
                max_tokens: 4096,
                context_length: 16384,
                parameter_size: "7B".to_string(),
                memory_requirement: "8GB".to_string(),
                description: "Meta's code generation model".to_string(),
                is_available: false,
                performance_score: 0.78,
            },
        ]
    }

    /// Physical model names currently served by the backend, TTL-cached.
    ///
    /// Returns an empty list when the backend cannot be reached; the error
    /// is logged, not raised.
    pub async fn available_models(&self) -> Vec<String> {
        {
            let cache = self.catalog.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < self.catalog_ttl {
                    return entry.models.clone();
                }
            }
        }

        // Single writer refreshes; re-check under the write lock so
        // concurrent callers don't fetch twice.
        let mut cache = self.catalog.write().await;
        if let Some(entry) = cache.as_ref() {
            if entry.fetched_at.elapsed() < self.catalog_ttl {
                return entry.models.clone();
            }
        }

        match self.fetch_catalog().await {
            Ok(models) => {
                debug!(count = models.len(), "Refreshed Ollama model catalog");
                *cache = Some(CatalogCache { models: models.clone(), fetched_at: Instant::now() });
                models
            }
            Err(e) => {
                error!(error = %e, base_url = %self.base_url, "Failed to fetch model catalog");
                Vec::new()
            }
        }
    }

    async fn fetch_catalog(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message =
                response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Backend { status: status.as_u16(), message });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Serialization(format!("Failed to parse catalog: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Maps a logical model name to a physical catalog entry via the
    /// configured substring patterns, skipping embedding-only models.
    async fn find_physical_model(&self, logical: &str) -> Option<String> {
        let catalog = self.available_models().await;
        if catalog.is_empty() {
            return None;
        }

        let patterns = self
            .models
            .get(logical)
            .filter(|entry| !entry.patterns.is_empty())
            .map_or_else(|| vec![logical.to_string()], |entry| entry.patterns.clone());

        for pattern in &patterns {
            let pattern = pattern.to_lowercase();
            for physical in &catalog {
                if is_embedding_model(physical) {
                    continue;
                }
                if physical.to_lowercase().contains(&pattern) {
                    return Some(physical.clone());
                }
            }
        }

        None
    }

    /// Picks the best model automatically: configured entries by priority,
    /// then the fixed preference order, then the first non-embedding entry.
    async fn select_best_model(&self) -> Option<String> {
        let mut enabled: Vec<(&String, u32)> = self
            .models
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, entry)| (name, entry.priority))
            .collect();
        enabled.sort_by_key(|(_, priority)| *priority);

        for (logical, _) in enabled {
            if let Some(physical) = self.find_physical_model(logical).await {
                debug!(logical = %logical, physical = %physical, "Selected configured model");
                return Some(physical);
            }
        }

        for logical in PREFERRED_MODELS {
            if let Some(physical) = self.find_physical_model(logical).await {
                debug!(logical = %logical, physical = %physical, "Selected preferred model");
                return Some(physical);
            }
        }

        let catalog = self.available_models().await;
        let fallback = catalog.into_iter().find(|name| !is_embedding_model(name));
        if let Some(ref physical) = fallback {
            warn!(physical = %physical, "Falling back to first available model");
        }
        fallback
    }

    /// Resolves the physical model for a request. Explicit names that match
    /// nothing in the catalog are passed through so the backend can report
    /// them, matching the non-streaming error path.
    async fn resolve_model(&self, explicit: Option<&str>) -> Option<String> {
        match explicit {
            Some(name) => Some(
                self.find_physical_model(name)
                    .await
                    .unwrap_or_else(|| name.to_string()),
            ),
            None => self.select_best_model().await,
        }
    }

    /// POSTs `body` with the retry schedule, returning the first successful
    /// response. Only retryable failures are re-attempted.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut attempt = 0;
        loop {
            let timeout = self.retry.timeout_for(self.timeout, attempt);
            let result = self.client.post(url).timeout(timeout).json(body).send().await;

            let failure = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let message =
                        response.text().await.unwrap_or_else(|_| "unknown error".to_string());
                    ProviderError::Backend { status: status.as_u16(), message }
                }
                Err(e) if e.is_timeout() => ProviderError::Timeout(e.to_string()),
                Err(e) => ProviderError::Request(e.to_string()),
            };

            if failure.is_retryable() && attempt + 1 < self.retry.attempts() {
                warn!(
                    attempt = attempt + 1,
                    total = self.retry.attempts(),
                    error = %failure,
                    "Ollama request failed, retrying"
                );
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
                attempt += 1;
                continue;
            }

            return Err(failure);
        }
    }
}

// Ollama API request/response structures
#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl From<&GenerationConfig> for OllamaOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            num_predict: config.max_tokens,
            stop: config.stop_sequences.clone(),
            seed: config.seed,
        }
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    response: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

fn generate_body(model: &str, request: &GenerationRequest, stream: bool) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "prompt": request.prompt,
        "stream": stream,
        "options": OllamaOptions::from(&request.config),
    })
}

fn is_embedding_model(name: &str) -> bool {
    name.to_lowercase().contains("embed")
}

/// Estimates a token count from text when the backend omits one.
///
/// ASCII text averages roughly four characters per token; wider characters
/// count one each.
fn estimate_token_count(text: &str) -> u32 {
    let ascii = text.chars().filter(char::is_ascii).count();
    let wide = text.chars().count() - ascii;
    (ascii / 4 + wide) as u32
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResponse {
        let started = Instant::now();

        debug!(
            model = ?request.model_name,
            prompt_len = request.prompt.len(),
            "OllamaProvider generating text"
        );

        let Some(model_name) = self.resolve_model(request.model_name.as_deref()).await else {
            return GenerationResponse::failure(
                request.model_name.clone().unwrap_or_else(|| "unknown".to_string()),
                started.elapsed(),
                "no model available",
            );
        };

        let url = format!("{}/api/generate", self.base_url);
        let body = generate_body(&model_name, request, false);

        let response = match self.post_with_retry(&url, &body).await {
            Ok(response) => response,
            Err(e) => {
                error!(model = %model_name, error = %e, "Ollama generation failed");
                return GenerationResponse::failure(model_name, started.elapsed(), e.to_string());
            }
        };

        let parsed: OllamaResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "Failed to parse Ollama response");
                return GenerationResponse::failure(
                    model_name,
                    started.elapsed(),
                    format!("Failed to parse response: {}", e),
                );
            }
        };

        if let Some(message) = parsed.error {
            return GenerationResponse::failure(model_name, started.elapsed(), message);
        }

        let mut text = parsed.response;
        if text.trim().is_empty() {
            warn!(model = %model_name, "Received empty response body");
            text = "[empty response received]".to_string();
        }

        let token_count = parsed.eval_count.unwrap_or_else(|| estimate_token_count(&text));
        let mut result =
            GenerationResponse::success(text, model_name, started.elapsed(), token_count);
        if !parsed.done {
            result.finish_reason = FinishReason::Length;
        }
        result
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> TextStream {
        debug!(
            model = ?request.model_name,
            prompt_len = request.prompt.len(),
            "OllamaProvider streaming text"
        );

        let Some(model_name) = self.resolve_model(request.model_name.as_deref()).await else {
            return diagnostic_stream("no model available");
        };

        let url = format!("{}/api/generate", self.base_url);
        let body = generate_body(&model_name, request, true);

        match self.post_with_retry(&url, &body).await {
            Ok(response) => Box::pin(NdjsonStream::new(response)),
            Err(e) => {
                error!(model = %model_name, error = %e, "Ollama streaming request failed");
                diagnostic_stream(&e.to_string())
            }
        }
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        let mut definitions = Self::model_definitions();
        for info in &mut definitions {
            info.is_available = self.find_physical_model(&info.name).await.is_some();
        }
        definitions
    }

    async fn model_info(&self, model_name: &str) -> Option<ModelInfo> {
        self.list_models().await.into_iter().find(|info| info.name == model_name)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn diagnostic_stream(message: &str) -> TextStream {
    let fragment = format!("[error] {}", message);
    Box::pin(futures::stream::iter(vec![fragment]))
}

// Streaming response parser for Ollama's newline-delimited JSON format.
struct NdjsonStream {
    stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

impl NdjsonStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Consumes complete lines from the buffer into pending fragments.
    /// Returns `true` once the terminal chunk has been seen.
    fn drain_buffer(&mut self) -> bool {
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim().to_string();
            self.buffer.drain(..=newline);
            if line.is_empty() {
                continue;
            }
            if self.consume_line(&line) {
                return true;
            }
        }
        false
    }

    fn consume_line(&mut self, line: &str) -> bool {
        match serde_json::from_str::<StreamChunk>(line) {
            Ok(chunk) => {
                if let Some(message) = chunk.error {
                    self.pending.push_back(format!("[error] {}", message));
                    return true;
                }
                if let Some(fragment) = chunk.response {
                    if !fragment.is_empty() {
                        self.pending.push_back(fragment);
                    }
                }
                chunk.done
            }
            Err(e) => {
                // Malformed lines are skipped, matching the backend's own
                // keep-alive noise.
                debug!(error = %e, "Skipping malformed stream line");
                false
            }
        }
    }
}

impl Stream for NdjsonStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Poll::Ready(Some(fragment));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    match String::from_utf8(bytes.to_vec()) {
                        Ok(chunk) => self.buffer.push_str(&chunk),
                        Err(e) => {
                            self.done = true;
                            self.pending
                                .push_back(format!("[error] invalid utf-8 in stream: {}", e));
                            continue;
                        }
                    }
                    if self.drain_buffer() {
                        self.done = true;
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    self.pending.push_back(format!("[error] stream error: {}", e));
                }
                Poll::Ready(None) => {
                    // Flush any trailing line without a newline terminator.
                    let trailing = self.buffer.trim().to_string();
                    self.buffer.clear();
                    if !trailing.is_empty() {
                        self.consume_line(&trailing);
                    }
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
