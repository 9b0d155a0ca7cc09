//! Wires configuration into a resolver, a healer and a retry executor.

use std::sync::Arc;

use action_flow::{HealingOrchestrator, RetryExecutor, RetryOptions, SelfHealer};
use action_locator::{
    CacheStats, DefaultElementResolver, DefaultStrategyGenerator, StrategyCache, StrategyGenerator,
};
use llm_backend::{LlmError, OllamaClient, TextGenerator};
use perceiver_structural::DocumentPort;
use selector_registry::{FileRegistryStore, RegistryStore};
use tracing::{debug, info};

use crate::config::HealConfig;
use crate::errors::SoulHealError;

/// Long-lived pieces shared by every scenario of a run
pub struct HealSession {
    config: HealConfig,
    cache: Arc<StrategyCache>,
    store: Arc<dyn RegistryStore>,
    backend: Option<Arc<dyn TextGenerator>>,
}

impl HealSession {
    /// Load the strategy cache and connect the suggestion backend if enabled
    pub fn open(config: HealConfig) -> Result<Self, SoulHealError> {
        let cache = StrategyCache::with_persistence(&config.cache_path)?
            .with_policy(config.cache_policy());
        let backend: Option<Arc<dyn TextGenerator>> = if config.ai.enabled {
            let client = OllamaClient::new(config.backend_config())?;
            info!(url = %config.ai.base_url, model = %config.ai.model, "suggestion backend enabled");
            Some(Arc::new(client))
        } else {
            None
        };
        let store: Arc<dyn RegistryStore> = Arc::new(FileRegistryStore::new(&config.registry_dir));
        debug!(
            cache = %config.cache_path.display(),
            cached = cache.len(),
            registries = %config.registry_dir.display(),
            "heal session opened"
        );
        Ok(Self {
            config,
            cache: Arc::new(cache),
            store,
            backend,
        })
    }

    /// Replace the suggestion backend
    pub fn with_backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the registry store
    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &HealConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.cache
    }

    pub fn store(&self) -> Arc<dyn RegistryStore> {
        self.store.clone()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn generator(&self) -> Arc<dyn StrategyGenerator> {
        let generator = match &self.backend {
            Some(backend) => DefaultStrategyGenerator::new().with_backend(backend.clone()),
            None => DefaultStrategyGenerator::new(),
        };
        Arc::new(generator)
    }

    pub fn resolver(&self) -> Arc<DefaultElementResolver> {
        Arc::new(DefaultElementResolver::new(self.cache.clone(), self.generator()))
    }

    /// Healer for one page; a document enables re-scans and re-resolution
    pub fn orchestrator(&self, document: Option<Arc<dyn DocumentPort>>) -> HealingOrchestrator {
        let mut orchestrator =
            HealingOrchestrator::new(self.store.clone(), self.config.healer_settings());
        if let Some(document) = document {
            orchestrator = orchestrator.with_document(document).with_resolver(self.resolver());
        }
        if let Some(backend) = &self.backend {
            orchestrator = orchestrator.with_backend(backend.clone());
        }
        orchestrator
    }

    pub fn executor(&self, document: Option<Arc<dyn DocumentPort>>) -> RetryExecutor {
        let healer: Arc<dyn SelfHealer> = Arc::new(self.orchestrator(document));
        RetryExecutor::new(healer)
    }

    pub fn retry_options(&self) -> RetryOptions {
        self.config.retry_options()
    }

    /// Check the suggestion backend; `None` when it is disabled
    pub async fn backend_health(&self) -> Option<Result<(), LlmError>> {
        let backend = self.backend.as_ref()?;
        Some(backend.health().await)
    }
}
