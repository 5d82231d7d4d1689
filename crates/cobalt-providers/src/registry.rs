//! Model registry aggregating catalogs across providers.
//!
//! A registry is a point-in-time snapshot: the service builds one per routing
//! decision so registration changes mid-flight never invalidate a lookup.

use cobalt_abstraction::{ModelCapability, ModelInfo, Provider};
use std::sync::Arc;
use tracing::debug;

/// One model as served by one provider.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// The registered provider name.
    pub provider: String,
    /// The model's catalog information.
    pub info: ModelInfo,
}

/// A snapshot of every model every registered provider can serve.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl ModelRegistry {
    /// Builds a snapshot by querying each provider's catalog.
    pub async fn snapshot(providers: &[(String, Arc<dyn Provider>)]) -> Self {
        let mut entries = Vec::new();
        for (name, provider) in providers {
            for info in provider.list_models().await {
                entries.push(RegistryEntry { provider: name.clone(), info });
            }
        }
        debug!(models = entries.len(), providers = providers.len(), "Built registry snapshot");
        Self { entries }
    }

    /// All entries in the snapshot.
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Total number of models across providers.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of models confirmed available.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.entries.iter().filter(|e| e.info.is_available).count()
    }

    /// Finds the provider serving the given logical model name.
    #[must_use]
    pub fn find_provider_for_model(&self, model_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.info.name == model_name)
            .map(|e| e.provider.as_str())
    }

    /// The available model with the highest performance score across all
    /// providers.
    #[must_use]
    pub fn best_available(&self) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .filter(|e| e.info.is_available)
            .max_by(|a, b| {
                a.info
                    .performance_score
                    .partial_cmp(&b.info.performance_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Selects a model by capability: the preferred name when it qualifies,
    /// otherwise the highest-scoring available model with the capability.
    #[must_use]
    pub fn select_for_capability(
        &self,
        capability: ModelCapability,
        preferred: Option<&str>,
    ) -> Option<&RegistryEntry> {
        let mut candidates: Vec<&RegistryEntry> = self
            .entries
            .iter()
            .filter(|e| e.info.is_available && e.info.has_capability(capability))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        if let Some(name) = preferred {
            if let Some(entry) = candidates.iter().find(|e| e.info.name == name) {
                return Some(entry);
            }
        }

        candidates.sort_by(|a, b| {
            b.info
                .performance_score
                .partial_cmp(&a.info.performance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    async fn snapshot_of(providers: Vec<MockProvider>) -> ModelRegistry {
        let providers: Vec<(String, Arc<dyn Provider>)> = providers
            .into_iter()
            .map(|p| (p.name().to_string(), Arc::new(p) as Arc<dyn Provider>))
            .collect();
        ModelRegistry::snapshot(&providers).await
    }

    #[tokio::test]
    async fn test_snapshot_aggregates_across_providers() {
        let registry = snapshot_of(vec![
            MockProvider::new("alpha").with_available_model("llama2", 0.5),
            MockProvider::new("beta").with_available_model("mistral", 0.8),
        ])
        .await;

        assert_eq!(registry.total_count(), 2);
        assert_eq!(registry.available_count(), 2);
        assert_eq!(registry.find_provider_for_model("mistral"), Some("beta"));
        assert_eq!(registry.find_provider_for_model("nonexistent"), None);
    }

    #[tokio::test]
    async fn test_best_available_prefers_highest_score() {
        let registry = snapshot_of(vec![
            MockProvider::new("alpha").with_available_model("llama2", 0.5),
            MockProvider::new("beta").with_available_model("mistral", 0.8),
        ])
        .await;

        let best = registry.best_available().unwrap();
        assert_eq!(best.provider, "beta");
        assert_eq!(best.info.name, "mistral");
    }

    #[tokio::test]
    async fn test_best_available_skips_unavailable_models() {
        let registry = snapshot_of(vec![
            MockProvider::new("alpha").with_unavailable_model("llama2", 0.9),
            MockProvider::new("beta").with_available_model("mistral", 0.4),
        ])
        .await;

        let best = registry.best_available().unwrap();
        assert_eq!(best.provider, "beta");
    }

    #[tokio::test]
    async fn test_best_available_empty_registry() {
        let registry = snapshot_of(vec![]).await;
        assert!(registry.best_available().is_none());
    }

    #[tokio::test]
    async fn test_select_for_capability() {
        let registry = snapshot_of(vec![
            MockProvider::new("alpha").with_available_model("llama2", 0.5),
            MockProvider::new("beta").with_available_model("mistral", 0.8),
        ])
        .await;

        let entry = registry
            .select_for_capability(ModelCapability::TextGeneration, None)
            .unwrap();
        assert_eq!(entry.info.name, "mistral");

        let preferred = registry
            .select_for_capability(ModelCapability::TextGeneration, Some("llama2"))
            .unwrap();
        assert_eq!(preferred.info.name, "llama2");

        assert!(registry.select_for_capability(ModelCapability::Embedding, None).is_none());
    }
}
