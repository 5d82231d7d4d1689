//! Generation service: the single entry point hiding provider choice.
//!
//! The service owns the provider registry and the background health sweep.
//! Routing failures are reported as error-bearing responses, never raised.

use crate::config::ServiceSettings;
use crate::registry::ModelRegistry;
use cobalt_abstraction::{
    GenerationConfig, GenerationRequest, GenerationResponse, ModelInfo, Provider, TextStream,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};
use tokio::time;
use tracing::{debug, info, warn};

/// Upper bound for a single health probe so one hung backend cannot stall
/// the sweep or a status call.
const STATUS_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Health and catalog counts for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Whether the last probe succeeded.
    pub healthy: bool,
    /// Total models in the provider's catalog.
    pub total_models: usize,
    /// Models confirmed available.
    pub available_models: usize,
    /// Names of the available models.
    pub models: Vec<String>,
    /// Probe failure description, if any.
    pub error: Option<String>,
}

/// Aggregated service status across all providers.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Per-provider status keyed by registered name.
    pub providers: HashMap<String, ProviderStatus>,
    /// Total models across providers.
    pub total_models: usize,
    /// Available models across providers.
    pub available_models: usize,
    /// `false` as soon as any provider is unhealthy.
    pub service_healthy: bool,
}

/// Routes generation requests to the right provider.
pub struct GenerationService {
    /// Registered providers keyed by name. Safe to mutate while generate()
    /// calls are in flight.
    providers: Arc<RwLock<HashMap<String, Arc<dyn Provider>>>>,
    /// Service settings (health interval, default generation parameters).
    settings: ServiceSettings,
    /// Shutdown signal sender for the health sweep.
    shutdown_tx: Option<mpsc::UnboundedSender<()>>,
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("running", &self.shutdown_tx.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl GenerationService {
    /// Creates a new service with the given settings and no providers.
    #[must_use]
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            settings,
            shutdown_tx: None,
        }
    }

    /// Parameters a caller should apply when it has no opinion of its own.
    #[must_use]
    pub fn default_config(&self) -> &GenerationConfig {
        &self.settings.default_config
    }

    /// Registers a provider under the given name.
    ///
    /// # Returns
    /// Returns `true` if the provider was newly registered, `false` if it
    /// replaced an existing one.
    pub async fn register_provider(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> bool {
        let name = name.into();
        debug!(provider = %name, "Registering provider");

        let mut providers = self.providers.write().await;
        let was_new = !providers.contains_key(&name);
        providers.insert(name.clone(), provider);

        if was_new {
            info!(provider = %name, "Provider registered");
        } else {
            warn!(provider = %name, "Provider replaced in registry");
        }

        was_new
    }

    /// Unregisters a provider.
    ///
    /// # Returns
    /// Returns `true` if the provider was found and removed.
    pub async fn unregister_provider(&self, name: &str) -> bool {
        let mut providers = self.providers.write().await;
        let removed = providers.remove(name).is_some();

        if removed {
            info!(provider = %name, "Provider unregistered");
        } else {
            warn!(provider = %name, "Attempted to unregister unknown provider");
        }

        removed
    }

    /// Retrieves a registered provider by name.
    pub async fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.read().await.get(name).cloned()
    }

    /// Number of registered providers.
    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }

    async fn provider_snapshot(&self) -> Vec<(String, Arc<dyn Provider>)> {
        self.providers
            .read()
            .await
            .iter()
            .map(|(name, provider)| (name.clone(), Arc::clone(provider)))
            .collect()
    }

    /// Picks the serving provider and physical request for one call.
    async fn route(
        &self,
        request: &GenerationRequest,
    ) -> Result<(Arc<dyn Provider>, GenerationRequest), String> {
        let snapshot = self.provider_snapshot().await;
        let registry = ModelRegistry::snapshot(&snapshot).await;

        let (provider_name, model_name) = if let Some(name) = request.model_name.as_deref() {
            match registry.find_provider_for_model(name) {
                Some(provider) => (provider.to_string(), name.to_string()),
                None => {
                    return Err(format!("no available provider serves model '{}'", name));
                }
            }
        } else {
            match registry.best_available() {
                Some(entry) => (entry.provider.clone(), entry.info.name.clone()),
                None => return Err("no available provider".to_string()),
            }
        };

        let provider = snapshot
            .iter()
            .find(|(name, _)| *name == provider_name)
            .map(|(_, provider)| Arc::clone(provider))
            .ok_or_else(|| format!("provider '{}' disappeared during routing", provider_name))?;

        debug!(provider = %provider_name, model = %model_name, "Routed generation request");

        let mut routed = request.clone();
        routed.model_name = Some(model_name);
        Ok((provider, routed))
    }

    /// Generates text, selecting the provider automatically unless the
    /// request pins a model.
    ///
    /// Routing failure is an expected outcome reported in the response, not
    /// a crash.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResponse {
        let started = Instant::now();

        match self.route(request).await {
            Ok((provider, routed)) => provider.generate(&routed).await,
            Err(reason) => {
                warn!(reason = %reason, "Generation request could not be routed");
                GenerationResponse::failure(
                    request.model_name.clone().unwrap_or_else(|| "unknown".to_string()),
                    started.elapsed(),
                    reason,
                )
            }
        }
    }

    /// Streaming variant of [`Self::generate`], delegated to the chosen
    /// provider.
    pub async fn generate_stream(&self, request: &GenerationRequest) -> TextStream {
        match self.route(request).await {
            Ok((provider, routed)) => provider.generate_stream(&routed).await,
            Err(reason) => {
                warn!(reason = %reason, "Streaming request could not be routed");
                Box::pin(futures::stream::iter(vec![format!("[error] {}", reason)]))
            }
        }
    }

    /// Every model every registered provider knows about.
    pub async fn list_all_models(&self) -> Vec<ModelInfo> {
        let snapshot = self.provider_snapshot().await;
        let mut all = Vec::new();
        for (_, provider) in &snapshot {
            all.extend(provider.list_models().await);
        }
        all
    }

    /// Catalog information for one logical model name, searched across
    /// providers.
    pub async fn model_info(&self, model_name: &str) -> Option<ModelInfo> {
        let snapshot = self.provider_snapshot().await;
        for (_, provider) in &snapshot {
            if let Some(info) = provider.model_info(model_name).await {
                return Some(info);
            }
        }
        None
    }

    /// Per-provider health and model counts, aggregated into one boolean.
    ///
    /// A provider whose probe fails or hangs is reported unhealthy without
    /// affecting the others.
    pub async fn service_status(&self) -> ServiceStatus {
        let snapshot = self.provider_snapshot().await;
        let mut status = ServiceStatus {
            providers: HashMap::new(),
            total_models: 0,
            available_models: 0,
            service_healthy: true,
        };

        for (name, provider) in &snapshot {
            let (healthy, probe_error) =
                match time::timeout(STATUS_PROBE_TIMEOUT, provider.is_healthy()).await {
                    Ok(result) => (result, None),
                    Err(_) => {
                        warn!(provider = %name, "Health probe timed out");
                        (false, Some("health probe timed out".to_string()))
                    }
                };

            let models = provider.list_models().await;
            let available: Vec<String> =
                models.iter().filter(|m| m.is_available).map(|m| m.name.clone()).collect();

            status.total_models += models.len();
            status.available_models += available.len();
            if !healthy {
                status.service_healthy = false;
            }

            status.providers.insert(
                name.clone(),
                ProviderStatus {
                    healthy,
                    total_models: models.len(),
                    available_models: available.len(),
                    models: available,
                    error: probe_error,
                },
            );
        }

        status
    }

    /// Starts the background health sweep.
    ///
    /// # Returns
    /// Returns `Ok(())` if started successfully, or an error if already
    /// running.
    pub fn start(&mut self) -> Result<(), String> {
        if self.shutdown_tx.is_some() {
            return Err("Generation service is already running".to_string());
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
        self.shutdown_tx = Some(shutdown_tx);

        let providers = Arc::clone(&self.providers);
        let interval = self.settings.health_check_interval();

        tokio::spawn(async move {
            info!("Generation service health sweep started");

            loop {
                tokio::select! {
                    result = shutdown_rx.recv() => {
                        match result {
                            Some(()) => info!("Health sweep shutdown signal received"),
                            None => info!("Health sweep shutdown channel closed"),
                        }
                        break;
                    }
                    () = time::sleep(interval) => {
                        let snapshot: Vec<(String, Arc<dyn Provider>)> = providers
                            .read()
                            .await
                            .iter()
                            .map(|(name, provider)| (name.clone(), Arc::clone(provider)))
                            .collect();

                        for (name, provider) in snapshot {
                            match time::timeout(STATUS_PROBE_TIMEOUT, provider.is_healthy()).await {
                                Ok(true) => {
                                    debug!(provider = %name, "Provider healthy");
                                }
                                Ok(false) => {
                                    warn!(provider = %name, "Provider failed health check");
                                }
                                Err(_) => {
                                    warn!(provider = %name, "Provider health probe timed out");
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Stops the background health sweep.
    ///
    /// # Returns
    /// Returns `Ok(())` if stopped successfully, or an error if not running.
    pub fn stop(&mut self) -> Result<(), String> {
        match self.shutdown_tx.take() {
            Some(tx) => {
                let _ = tx.send(());
                info!("Generation service health sweep stopped");
                Ok(())
            }
            None => Err("Generation service is not running".to_string()),
        }
    }

    /// Whether the health sweep is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Default for GenerationService {
    fn default() -> Self {
        Self::new(ServiceSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_register_and_unregister_provider() {
        let service = GenerationService::default();
        assert_eq!(service.provider_count().await, 0);

        let was_new = service
            .register_provider("ollama", Arc::new(MockProvider::new("ollama")))
            .await;
        assert!(was_new);
        assert_eq!(service.provider_count().await, 1);

        let was_new = service
            .register_provider("ollama", Arc::new(MockProvider::new("ollama")))
            .await;
        assert!(!was_new);

        assert!(service.unregister_provider("ollama").await);
        assert!(!service.unregister_provider("ollama").await);
        assert_eq!(service.provider_count().await, 0);
    }

    #[tokio::test]
    async fn test_generate_without_providers_reports_no_provider() {
        let service = GenerationService::default();
        let response = service.generate(&GenerationRequest::new("hello")).await;

        assert!(response.is_error());
        assert_eq!(response.error.as_deref(), Some("no available provider"));
    }

    #[tokio::test]
    async fn test_generate_routes_to_best_available_model() {
        let service = GenerationService::default();
        service
            .register_provider(
                "alpha",
                Arc::new(MockProvider::new("alpha").with_unavailable_model("llama2", 0.9)),
            )
            .await;
        service
            .register_provider(
                "beta",
                Arc::new(MockProvider::new("beta").with_available_model("mistral", 0.6)),
            )
            .await;

        let response = service.generate(&GenerationRequest::new("hello")).await;

        assert!(!response.is_error());
        assert_eq!(response.model_name, "mistral");
    }

    #[tokio::test]
    async fn test_generate_with_explicit_model_routes_to_serving_provider() {
        let service = GenerationService::default();
        service
            .register_provider(
                "alpha",
                Arc::new(MockProvider::new("alpha").with_available_model("llama2", 0.9)),
            )
            .await;
        service
            .register_provider(
                "beta",
                Arc::new(MockProvider::new("beta").with_available_model("mistral", 0.6)),
            )
            .await;

        let response =
            service.generate(&GenerationRequest::new("hello").with_model("llama2")).await;

        assert!(!response.is_error());
        assert_eq!(response.model_name, "llama2");
    }

    #[tokio::test]
    async fn test_generate_with_unknown_explicit_model() {
        let service = GenerationService::default();
        service
            .register_provider(
                "alpha",
                Arc::new(MockProvider::new("alpha").with_available_model("llama2", 0.9)),
            )
            .await;

        let response =
            service.generate(&GenerationRequest::new("hello").with_model("gpt-x")).await;

        assert!(response.is_error());
        assert!(response.error.as_deref().unwrap().contains("gpt-x"));
    }

    #[tokio::test]
    async fn test_generate_stream_without_providers_yields_diagnostic() {
        let service = GenerationService::default();
        let stream = service.generate_stream(&GenerationRequest::new("hello")).await;
        let fragments: Vec<String> = stream.collect().await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].starts_with("[error]"));
    }

    #[tokio::test]
    async fn test_service_status_aggregates_health() {
        let service = GenerationService::default();
        service
            .register_provider(
                "healthy",
                Arc::new(MockProvider::new("healthy").with_available_model("llama2", 0.5)),
            )
            .await;
        service
            .register_provider(
                "broken",
                Arc::new(
                    MockProvider::new("broken")
                        .with_available_model("mistral", 0.5)
                        .with_healthy(false),
                ),
            )
            .await;

        let status = service.service_status().await;

        assert!(!status.service_healthy);
        assert!(status.providers["healthy"].healthy);
        assert!(!status.providers["broken"].healthy);
        assert_eq!(status.total_models, 2);
        assert_eq!(status.available_models, 2);
    }

    #[tokio::test]
    async fn test_service_status_with_no_providers_is_healthy() {
        let service = GenerationService::default();
        let status = service.service_status().await;
        assert!(status.service_healthy);
        assert_eq!(status.total_models, 0);
    }

    #[tokio::test]
    async fn test_start_and_stop_health_sweep() {
        let mut service = GenerationService::default();
        assert!(!service.is_running());

        assert!(service.start().is_ok());
        assert!(service.is_running());
        assert!(service.start().is_err());

        assert!(service.stop().is_ok());
        assert!(!service.is_running());
        assert!(service.stop().is_err());
    }

    #[tokio::test]
    async fn test_health_sweep_survives_unhealthy_provider() {
        use std::time::Duration;

        let settings = ServiceSettings {
            health_check_interval_secs: 0,
            ..ServiceSettings::default()
        };
        let mut service = GenerationService::new(settings);
        service
            .register_provider(
                "broken",
                Arc::new(
                    MockProvider::new("broken")
                        .with_available_model("llama2", 0.5)
                        .with_healthy(false),
                ),
            )
            .await;

        service.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Several failed sweeps later the service still routes requests and
        // reports the provider as unhealthy.
        let response = service.generate(&GenerationRequest::new("hi")).await;
        assert!(!response.is_error());
        assert!(!service.service_status().await.service_healthy);

        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_list_all_models_and_model_info() {
        let service = GenerationService::default();
        service
            .register_provider(
                "alpha",
                Arc::new(MockProvider::new("alpha").with_available_model("llama2", 0.5)),
            )
            .await;
        service
            .register_provider(
                "beta",
                Arc::new(MockProvider::new("beta").with_available_model("mistral", 0.8)),
            )
            .await;

        let models = service.list_all_models().await;
        assert_eq!(models.len(), 2);

        let info = service.model_info("mistral").await.unwrap();
        assert_eq!(info.name, "mistral");
        assert!(service.model_info("nonexistent").await.is_none());
    }
}
