//! Configuration consumed by the provider layer.
//!
//! These structs are deserialized by the embedding application and injected
//! into constructors; nothing in this crate loads files.

use cobalt_abstraction::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_priority() -> u32 {
    999
}

fn default_enabled() -> bool {
    true
}

fn default_health_check_interval_secs() -> u64 {
    60
}

/// Routing configuration for one logical model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Substring patterns matched against the live catalog. Defaults to the
    /// logical name itself when empty.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Selection priority; lower wins.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Whether automatic selection may pick this model.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ModelEntry {
    fn default() -> Self {
        Self { patterns: Vec::new(), priority: default_priority(), enabled: true }
    }
}

/// Settings for one provider client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the backend (e.g., "http://localhost:11434").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base per-attempt timeout in seconds; grows per retry attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-model routing entries keyed by logical name.
    #[serde(default)]
    pub models: HashMap<String, ModelEntry>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            models: HashMap::new(),
        }
    }
}

impl ProviderSettings {
    /// Base per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Seconds between health sweeps.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// Parameters applied when a request does not override them.
    #[serde(default)]
    pub default_config: GenerationConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            default_config: GenerationConfig::default(),
        }
    }
}

impl ServiceSettings {
    /// Interval between health sweeps as a [`Duration`].
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_settings_defaults() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.models.is_empty());
    }

    #[test]
    fn test_provider_settings_from_toml() {
        let settings: ProviderSettings = toml::from_str(
            r#"
            base_url = "http://10.0.0.5:11434"
            timeout_secs = 60

            [models.deepseek-coder]
            patterns = ["deepseek-coder", "deepseek"]
            priority = 1

            [models.llama2]
            priority = 2
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.base_url, "http://10.0.0.5:11434");
        assert_eq!(settings.timeout_secs, 60);
        let entry = &settings.models["deepseek-coder"];
        assert_eq!(entry.patterns, vec!["deepseek-coder", "deepseek"]);
        assert_eq!(entry.priority, 1);
        assert!(entry.enabled);
        assert!(!settings.models["llama2"].enabled);
    }

    #[test]
    fn test_service_settings_defaults() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.health_check_interval(), Duration::from_secs(60));
        assert_eq!(settings.default_config.max_tokens, 1000);
    }
}
