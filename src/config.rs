//! Configuration management module
//!
//! `HealConfig` is read from YAML (every field optional) and then adjusted by
//! `SOULHEAL_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use action_flow::{HealerSettings, RetryOptions};
use action_locator::CachePolicy;
use llm_backend::BackendConfig;
use serde::{Deserialize, Serialize};

use crate::errors::SoulHealError;

pub const ENV_CACHE_PATH: &str = "SOULHEAL_CACHE_PATH";
pub const ENV_REGISTRY_DIR: &str = "SOULHEAL_REGISTRY_DIR";
pub const ENV_AI_URL: &str = "SOULHEAL_AI_URL";
pub const ENV_AI_MODEL: &str = "SOULHEAL_AI_MODEL";
pub const ENV_AI_ENABLED: &str = "SOULHEAL_AI_ENABLED";
pub const ENV_MAX_RETRIES: &str = "SOULHEAL_MAX_RETRIES";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HealConfig {
    /// JSON strategy cache file
    pub cache_path: PathBuf,
    /// Directory holding one YAML registry per page
    pub registry_dir: PathBuf,
    pub cache: CacheConfig,
    pub healing: HealingConfig,
    pub retry: RetryConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub reinforcement: u8,
    pub max_priority: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HealingConfig {
    pub max_attempts: u32,
    pub rescan_enabled: bool,
    pub wait_on_action_failure: bool,
    pub action_wait_ms: u64,
    pub inventory_limit: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub healing_enabled: bool,
    pub settle_delay_ms: u64,
}

/// Selector suggestion backend (Ollama-compatible HTTP API)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub generate_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".soulheal/strategy-cache.json"),
            registry_dir: PathBuf::from(".soulheal/registries"),
            cache: CacheConfig::default(),
            healing: HealingConfig::default(),
            retry: RetryConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            reinforcement: policy.reinforcement,
            max_priority: policy.max_priority,
        }
    }
}

impl Default for HealingConfig {
    fn default() -> Self {
        let settings = HealerSettings::default();
        Self {
            max_attempts: settings.max_attempts,
            rescan_enabled: settings.rescan_enabled,
            wait_on_action_failure: settings.wait_on_action_failure,
            action_wait_ms: settings.action_wait_ms,
            inventory_limit: settings.inventory_limit,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let options = RetryOptions::default();
        Self {
            max_retries: options.max_retries,
            healing_enabled: options.healing_enabled,
            settle_delay_ms: options.settle_delay.as_millis() as u64,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        let backend = BackendConfig::default();
        Self {
            enabled: false,
            base_url: backend.base_url,
            model: backend.model,
            generate_timeout_secs: backend.generate_timeout.as_secs(),
            health_timeout_secs: backend.health_timeout.as_secs(),
            max_retries: backend.max_retries,
            backoff_base_ms: backend.backoff_base.as_millis() as u64,
        }
    }
}

impl HealConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, SoulHealError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Apply `SOULHEAL_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), SoulHealError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SoulHealError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = value(ENV_CACHE_PATH) {
            self.cache_path = PathBuf::from(path.trim());
        }
        if let Some(dir) = value(ENV_REGISTRY_DIR) {
            self.registry_dir = PathBuf::from(dir.trim());
        }
        if let Some(url) = value(ENV_AI_URL) {
            self.ai.base_url = url.trim().to_string();
        }
        if let Some(model) = value(ENV_AI_MODEL) {
            self.ai.model = model.trim().to_string();
        }
        if let Some(raw) = value(ENV_AI_ENABLED) {
            self.ai.enabled = parse_flag(&raw).ok_or_else(|| SoulHealError::InvalidEnv {
                key: ENV_AI_ENABLED.to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = value(ENV_MAX_RETRIES) {
            self.retry.max_retries =
                raw.trim().parse().map_err(|_| SoulHealError::InvalidEnv {
                    key: ENV_MAX_RETRIES.to_string(),
                    value: raw.clone(),
                })?;
        }
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            reinforcement: self.cache.reinforcement,
            max_priority: self.cache.max_priority.min(100),
        }
    }

    pub fn healer_settings(&self) -> HealerSettings {
        HealerSettings {
            max_attempts: self.healing.max_attempts,
            rescan_enabled: self.healing.rescan_enabled,
            wait_on_action_failure: self.healing.wait_on_action_failure,
            action_wait_ms: self.healing.action_wait_ms,
            inventory_limit: self.healing.inventory_limit,
        }
    }

    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.retry.max_retries,
            healing_enabled: self.retry.healing_enabled,
            settle_delay: Duration::from_millis(self.retry.settle_delay_ms),
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.ai.base_url.clone(),
            model: self.ai.model.clone(),
            generate_timeout: Duration::from_secs(self.ai.generate_timeout_secs),
            health_timeout: Duration::from_secs(self.ai.health_timeout_secs),
            max_retries: self.ai.max_retries,
            backoff_base: Duration::from_millis(self.ai.backoff_base_ms),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_component_defaults() {
        let config = HealConfig::default();
        assert_eq!(config.healer_settings(), HealerSettings::default());
        assert_eq!(config.retry_options(), RetryOptions::default());
        assert_eq!(config.cache_policy(), CachePolicy::default());
        assert_eq!(config.backend_config().generate_timeout, Duration::from_secs(120));
        assert_eq!(config.backend_config().health_timeout, Duration::from_secs(5));
        assert!(!config.ai.enabled);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = HealConfig::from_yaml_str(
            "registry_dir: pages\nhealing:\n  max_attempts: 4\nai:\n  enabled: true\n  model: qwen2\n",
        )
        .unwrap();
        assert_eq!(config.registry_dir, PathBuf::from("pages"));
        assert_eq!(config.healing.max_attempts, 4);
        assert!(config.healing.rescan_enabled);
        assert!(config.ai.enabled);
        assert_eq!(config.ai.model, "qwen2");
        assert_eq!(config.ai.base_url, AiConfig::default().base_url);
        assert_eq!(HealConfig::from_yaml_str("  ").unwrap(), HealConfig::default());
        assert!(HealConfig::from_yaml_str("healing: [").is_err());
    }

    #[test]
    fn overrides_apply_and_validate() {
        let vars: HashMap<&str, &str> = [
            (ENV_CACHE_PATH, "/tmp/cache.json"),
            (ENV_AI_ENABLED, "yes"),
            (ENV_MAX_RETRIES, "5"),
            (ENV_AI_MODEL, "  "),
        ]
        .into_iter()
        .collect();
        let mut config = HealConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.cache_path, PathBuf::from("/tmp/cache.json"));
        assert!(config.ai.enabled);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.ai.model, AiConfig::default().model);

        let err = config
            .apply_overrides(|key| (key == ENV_MAX_RETRIES).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, SoulHealError::InvalidEnv { .. }));
    }
}
