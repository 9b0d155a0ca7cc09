//! Healing orchestrator
//!
//! Decides how to recover from a failed step. In order: refuse once the
//! scenario's heal budget is spent, optionally answer action failures with a
//! plain wait, re-scan the live page once per scenario and regenerate its
//! registry, and finally look for a single replacement selector (description
//! re-resolution, backend suggestion, keyword heuristics) and patch the failed
//! registry entry with it. Internal failures never escape; they become a
//! non-recoverable plan.

use std::fmt;
use std::sync::Arc;

use action_locator::ElementResolver;
use async_trait::async_trait;
use llm_backend::{GenerateOptions, TextGenerator};
use perceiver_structural::{
    DocumentPort, MarkupAnalyzer, PageAnalyzer, PageCatalog, PerceiverError,
};
use selector_registry::{RegistryError, RegistryStore, SelectorRegistry};
use tracing::{debug, info, warn};

use crate::classifier::ErrorKind;
use crate::context::ScenarioContext;
use crate::errors::HealError;
use crate::heuristics::heuristic_match;
use crate::suggest::{healing_prompt, parse_selector_reply};
use crate::types::{HealerSettings, HealingContext, RecoveryPlan};

/// Self-healer trait
#[async_trait]
pub trait SelfHealer: Send + Sync {
    /// Produce a recovery plan for one failure; never fails
    async fn heal(&self, scenario: &mut ScenarioContext, context: &HealingContext) -> RecoveryPlan;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateSource {
    Resolver,
    Backend,
    Heuristics,
}

impl CandidateSource {
    const ORDER: [CandidateSource; 3] = [
        CandidateSource::Resolver,
        CandidateSource::Backend,
        CandidateSource::Heuristics,
    ];
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CandidateSource::Resolver => "resolver",
            CandidateSource::Backend => "backend",
            CandidateSource::Heuristics => "heuristics",
        })
    }
}

/// Default healer
pub struct HealingOrchestrator {
    store: Arc<dyn RegistryStore>,
    analyzer: Arc<dyn PageAnalyzer>,
    document: Option<Arc<dyn DocumentPort>>,
    backend: Option<Arc<dyn TextGenerator>>,
    resolver: Option<Arc<dyn ElementResolver>>,
    settings: HealerSettings,
}

impl HealingOrchestrator {
    /// Create an orchestrator with the markup analyzer and no live document
    pub fn new(store: Arc<dyn RegistryStore>, settings: HealerSettings) -> Self {
        Self {
            store,
            analyzer: Arc::new(MarkupAnalyzer::new()),
            document: None,
            backend: None,
            resolver: None,
            settings,
        }
    }

    pub fn with_document(mut self, document: Arc<dyn DocumentPort>) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn PageAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn settings(&self) -> &HealerSettings {
        &self.settings
    }

    /// Re-scan the live page and overwrite its registry.
    ///
    /// Returns `None` without touching anything when the page was already
    /// regenerated in this scenario. The page only counts as regenerated once
    /// the new registry is saved.
    pub async fn rescan_page(
        &self,
        scenario: &mut ScenarioContext,
        page: &str,
    ) -> Result<Option<SelectorRegistry>, HealError> {
        let document = self.document.as_ref().ok_or_else(|| {
            PerceiverError::DocumentUnavailable("no live document attached".to_string())
        })?;
        if scenario.was_regenerated(page) {
            debug!(page, "page already regenerated in this scenario");
            return Ok(None);
        }
        let markup = document.markup().await?;
        let catalog = self.analyzer.analyze(&markup)?;
        if catalog.is_empty() {
            return Err(HealError::EmptyCatalog(page.to_string()));
        }
        let registry = SelectorRegistry::from_catalog(page, &catalog);
        self.store.save(&registry).await?;
        scenario.mark_regenerated(page);
        info!(page, entries = registry.len(), "page registry regenerated");
        Ok(Some(registry))
    }

    async fn try_heal(
        &self,
        scenario: &mut ScenarioContext,
        context: &HealingContext,
    ) -> Result<RecoveryPlan, HealError> {
        if context.attempt_count > self.settings.max_attempts {
            return Err(HealError::Exhausted {
                attempts: context.attempt_count,
                max: self.settings.max_attempts,
            });
        }

        if self.settings.wait_on_action_failure && context.error_kind == ErrorKind::ActionFailed {
            return Ok(RecoveryPlan::wait(
                self.settings.action_wait_ms,
                "action failed; waiting for the page to settle",
            ));
        }

        if self.document.is_some() && self.settings.rescan_enabled {
            match self.rescan_page(scenario, &context.page_name).await {
                Ok(Some(registry)) => {
                    return Ok(RecoveryPlan::rescanned(format!(
                        "re-scanned page '{}' and regenerated {} registry entries",
                        context.page_name,
                        registry.len()
                    )));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        error = %err,
                        page = %context.page_name,
                        "page re-scan failed; trying a replacement selector"
                    );
                }
            }
        }

        self.heal_selector(context).await
    }

    async fn heal_selector(&self, context: &HealingContext) -> Result<RecoveryPlan, HealError> {
        let page = context.page_name.as_str();
        let name = context.failed_element_ref.as_deref().ok_or_else(|| {
            HealError::MissingTarget(format!("step '{}' names no element", context.step_text))
        })?;
        let mut registry = self
            .store
            .load(page)
            .await?
            .ok_or_else(|| HealError::MissingTarget(format!("no registry for page '{page}'")))?;
        let current = registry
            .get(name)
            .map(|entry| entry.selector.clone())
            .ok_or_else(|| RegistryError::UnknownEntry {
                page: page.to_string(),
                name: name.to_string(),
            })?;

        let catalog = self.current_catalog(context).await;
        for source in CandidateSource::ORDER {
            let Some((selector, reason)) = self.candidate(source, context, &catalog).await else {
                continue;
            };
            if selector == current {
                debug!(%source, selector = %selector, "candidate equals the failing selector");
                continue;
            }
            match registry.patch(name, &selector) {
                Ok(_) => {}
                Err(err) if err.is_rejected_patch() => {
                    warn!(%source, error = %err, "rejected replacement selector");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
            self.store.save(&registry).await?;
            info!(page, entry = name, selector = %selector, %source, "registry entry healed");
            return Ok(RecoveryPlan::updated(
                selector,
                format!("{reason}; patched '{name}' (was {current})"),
            ));
        }

        Ok(RecoveryPlan::give_up(format!(
            "no replacement selector found for '{name}'"
        )))
    }

    async fn candidate(
        &self,
        source: CandidateSource,
        context: &HealingContext,
        catalog: &PageCatalog,
    ) -> Option<(String, String)> {
        match source {
            CandidateSource::Resolver => {
                let resolver = self.resolver.as_ref()?;
                let document = self.document.as_ref()?;
                let description = context.description.as_ref()?;
                match resolver
                    .resolve(document.as_ref(), description, &context.step_text)
                    .await
                {
                    Ok(resolved) => Some((
                        resolved.strategy.selector,
                        format!("re-resolved description via {} strategy", resolved.strategy.kind),
                    )),
                    Err(err) => {
                        debug!(error = %err, "description did not re-resolve");
                        None
                    }
                }
            }
            CandidateSource::Backend => {
                let backend = self.backend.as_ref()?;
                let inventory = catalog.inventory_summary(self.settings.inventory_limit);
                let prompt = healing_prompt(context, &inventory);
                let options = GenerateOptions::deterministic().with_max_tokens(128);
                match backend.generate(&prompt, &options).await {
                    Ok(reply) => {
                        let selector = parse_selector_reply(&reply);
                        if selector.is_none() {
                            debug!(reply = %reply, "backend reply carries no usable selector");
                        }
                        selector.map(|selector| (selector, format!("suggested by {}", backend.model())))
                    }
                    Err(err) => {
                        warn!(error = %HealError::from(err), "selector suggestion failed; using heuristics");
                        None
                    }
                }
            }
            CandidateSource::Heuristics => heuristic_match(&context.step_text, catalog).map(|hit| {
                (
                    hit.element.locator.selector.clone(),
                    format!("heuristic: {}", hit.rule),
                )
            }),
        }
    }

    /// Catalog of the page as it is now; empty when no markup can be had
    async fn current_catalog(&self, context: &HealingContext) -> PageCatalog {
        let markup = match (&context.markup, &self.document) {
            (Some(markup), _) => Ok(markup.clone()),
            (None, Some(document)) => document.markup().await,
            (None, None) => Err(PerceiverError::DocumentUnavailable(
                "no markup captured".to_string(),
            )),
        };
        match markup.and_then(|markup| self.analyzer.analyze(&markup)) {
            Ok(catalog) => catalog,
            Err(err) => {
                debug!(error = %err, "no page inventory for healing");
                PageCatalog::default()
            }
        }
    }
}

#[async_trait]
impl SelfHealer for HealingOrchestrator {
    async fn heal(&self, scenario: &mut ScenarioContext, context: &HealingContext) -> RecoveryPlan {
        info!(
            page = %context.page_name,
            element = context.failed_element_ref.as_deref().unwrap_or("-"),
            kind = %context.error_kind,
            attempt = context.attempt_count,
            "healing requested"
        );
        match self.try_heal(scenario, context).await {
            Ok(plan) => {
                info!(
                    action = %plan.action,
                    can_recover = plan.can_recover,
                    rationale = %plan.rationale,
                    "healing decided"
                );
                plan
            }
            Err(err) => {
                warn!(error = %err, page = %context.page_name, "healing failed");
                RecoveryPlan::give_up(err.to_string())
            }
        }
    }
}
