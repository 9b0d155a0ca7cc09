//! Element resolver: cached strategies first, generated strategies second

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use perceiver_structural::{DocumentPort, ElementHandle};
use tracing::{debug, info};

use crate::cache::StrategyCache;
use crate::errors::LocatorError;
use crate::fingerprint::Fingerprint;
use crate::strategies::StrategyGenerator;
use crate::types::{ElementDescription, LocatorStrategy, ResolvedElement};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve a description to exactly one visible element
    async fn resolve(
        &self,
        document: &dyn DocumentPort,
        description: &ElementDescription,
        context: &str,
    ) -> Result<ResolvedElement, LocatorError>;
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    cache: Arc<StrategyCache>,
    generator: Arc<dyn StrategyGenerator>,
}

impl DefaultElementResolver {
    /// Create a new resolver over a shared cache
    pub fn new(cache: Arc<StrategyCache>, generator: Arc<dyn StrategyGenerator>) -> Self {
        Self { cache, generator }
    }

    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.cache
    }

    /// Try one strategy; success means exactly one match and that match is visible
    async fn attempt(
        &self,
        document: &dyn DocumentPort,
        strategy: &LocatorStrategy,
    ) -> Result<ElementHandle, LocatorError> {
        let mut matches = document
            .query(&strategy.locator())
            .await
            .map_err(|err| LocatorError::strategy(strategy.kind.name(), err.to_string()))?;
        if matches.len() != 1 {
            return Err(LocatorError::strategy(
                strategy.kind.name(),
                format!("{} elements matched", matches.len()),
            ));
        }
        let handle = matches.remove(0);
        let visible = document
            .is_visible(&handle)
            .await
            .map_err(|err| LocatorError::strategy(strategy.kind.name(), err.to_string()))?;
        if !visible {
            return Err(LocatorError::strategy(strategy.kind.name(), "element is hidden"));
        }
        Ok(handle)
    }

    /// Walk `strategies` in order, returning the first winner
    async fn first_match(
        &self,
        document: &dyn DocumentPort,
        strategies: &[LocatorStrategy],
        tried: &mut HashSet<String>,
    ) -> Option<(ElementHandle, LocatorStrategy)> {
        for strategy in strategies {
            if !tried.insert(strategy.selector.clone()) {
                continue;
            }
            match self.attempt(document, strategy).await {
                Ok(handle) => return Some((handle, strategy.clone())),
                Err(err) => debug!(
                    selector = %strategy.selector,
                    error = %err,
                    "strategy missed"
                ),
            }
        }
        None
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(
        &self,
        document: &dyn DocumentPort,
        description: &ElementDescription,
        context: &str,
    ) -> Result<ResolvedElement, LocatorError> {
        let fingerprint = Fingerprint::of(description);
        let mut tried = HashSet::new();

        let cached = if fingerprint.is_empty() {
            None
        } else {
            self.cache.get(&fingerprint)
        };
        if let Some(strategies) = &cached {
            if let Some((handle, strategy)) = self.first_match(document, strategies, &mut tried).await {
                self.cache.record_success(&fingerprint, &strategy.selector);
                info!(
                    fingerprint = %fingerprint,
                    selector = %strategy.selector,
                    "resolved from cache"
                );
                return Ok(ResolvedElement {
                    handle,
                    strategy,
                    fingerprint: fingerprint.to_string(),
                    from_cache: true,
                    attempts: tried.len(),
                });
            }
            self.cache.record_failure(&fingerprint);
            debug!(fingerprint = %fingerprint, "cached strategies exhausted");
        }

        let generated = self.generator.generate(description, context).await;
        if let Some((handle, strategy)) = self.first_match(document, &generated, &mut tried).await {
            if !fingerprint.is_empty() {
                if cached.is_some() {
                    self.cache.merge(&fingerprint, generated);
                    self.cache.record_success(&fingerprint, &strategy.selector);
                } else {
                    self.cache.put(&fingerprint, generated);
                }
            }
            info!(
                description = %description,
                kind = %strategy.kind,
                selector = %strategy.selector,
                "resolved element"
            );
            return Ok(ResolvedElement {
                handle,
                strategy,
                fingerprint: fingerprint.to_string(),
                from_cache: false,
                attempts: tried.len(),
            });
        }

        Err(LocatorError::ElementNotFound {
            description: description.to_string(),
            attempts: tried.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::DefaultStrategyGenerator;
    use crate::types::StrategyKind;
    use parking_lot::Mutex;
    use perceiver_structural::{Locator, PageSnapshot, PerceiverError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LOGIN: &str = r#"<html><body>
        <form>
          <input id="email" type="email" placeholder="Email address">
          <input type="password" placeholder="Password">
          <button id="submit" type="submit">Submit</button>
          <button type="button" style="display:none">Submit</button>
        </form>
    </body></html>"#;

    /// Wraps the default generator and counts calls
    struct CountingGenerator {
        inner: DefaultStrategyGenerator,
        calls: AtomicUsize,
    }

    impl CountingGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: DefaultStrategyGenerator::new(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StrategyGenerator for CountingGenerator {
        async fn generate(&self, description: &ElementDescription, context: &str) -> Vec<LocatorStrategy> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.generate(description, context).await
        }
    }

    /// Returns a fixed list and remembers nothing
    struct FixedGenerator(Mutex<Vec<LocatorStrategy>>);

    #[async_trait]
    impl StrategyGenerator for FixedGenerator {
        async fn generate(&self, _: &ElementDescription, _: &str) -> Vec<LocatorStrategy> {
            self.0.lock().clone()
        }
    }

    #[tokio::test]
    async fn generated_success_is_cached_then_reused() {
        let page = PageSnapshot::from_markup(LOGIN);
        let cache = Arc::new(StrategyCache::in_memory());
        let generator = CountingGenerator::new();
        let resolver = DefaultElementResolver::new(cache.clone(), generator.clone());
        let submit = ElementDescription::new().with_text("Submit");

        let first = resolver.resolve(&page, &submit, "login").await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.strategy.selector, "#submit");
        assert_eq!(first.handle.tag, "button");
        assert_eq!(cache.len(), 1);

        let second = resolver.resolve(&page, &submit, "login").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.attempts, 1);
        assert_eq!(second.handle, first.handle);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entry(&Fingerprint::of(&submit)).unwrap().success_count, 2);
    }

    #[tokio::test]
    async fn hidden_and_ambiguous_matches_are_skipped() {
        let page = PageSnapshot::from_markup(LOGIN);
        let generator = Arc::new(FixedGenerator(Mutex::new(vec![
            LocatorStrategy::new(StrategyKind::TypeCss, "input", "two inputs"),
            LocatorStrategy::new(StrategyKind::Role, "button[type=\"button\"]", "hidden"),
            LocatorStrategy::new(StrategyKind::Id, "//broken[", "malformed css"),
            LocatorStrategy::new(StrategyKind::Placeholder, "[placeholder=\"Password\"]", "ok"),
        ])));
        let resolver = DefaultElementResolver::new(Arc::new(StrategyCache::in_memory()), generator);
        let resolved = resolver
            .resolve(&page, &ElementDescription::new().with_placeholder("Password"), "")
            .await
            .unwrap();
        assert_eq!(resolved.strategy.kind, StrategyKind::Placeholder);
        assert_eq!(resolved.attempts, 4);
    }

    #[tokio::test]
    async fn exhausted_strategies_raise_not_found() {
        let page = PageSnapshot::from_markup(LOGIN);
        let cache = Arc::new(StrategyCache::in_memory());
        let resolver = DefaultElementResolver::new(cache.clone(), CountingGenerator::new());
        let missing = ElementDescription::new().with_text("Delete account");
        let err = resolver.resolve(&page, &missing, "settings").await.unwrap_err();
        match err {
            LocatorError::ElementNotFound { description, attempts } => {
                assert!(description.contains("Delete account"));
                assert!(attempts >= 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn stale_cache_falls_back_to_generation() {
        let page = PageSnapshot::from_markup(LOGIN);
        let cache = Arc::new(StrategyCache::in_memory());
        let submit = ElementDescription::new().with_text("Submit");
        let key = Fingerprint::of(&submit);
        cache.put(
            &key,
            vec![LocatorStrategy::new(StrategyKind::Id, "#old-submit", "renamed").with_priority(60)],
        );
        let generator = CountingGenerator::new();
        let resolver = DefaultElementResolver::new(cache.clone(), generator.clone());

        let resolved = resolver.resolve(&page, &submit, "login").await.unwrap();
        assert!(!resolved.from_cache);
        assert_eq!(resolved.strategy.selector, "#submit");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let entry = cache.entry(&key).unwrap();
        assert_eq!(entry.failure_count, 1);
        assert_eq!(entry.strategies[0].selector, "#submit");
        assert!(entry.strategies.iter().any(|s| s.selector == "#old-submit"));
    }

    /// Records every selector queried before delegating to a snapshot
    struct RecordingDocument {
        page: PageSnapshot,
        queried: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentPort for RecordingDocument {
        async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PerceiverError> {
            self.queried.lock().push(locator.selector.clone());
            self.page.query(locator).await
        }

        async fn is_visible(&self, element: &ElementHandle) -> Result<bool, PerceiverError> {
            self.page.is_visible(element).await
        }

        async fn markup(&self) -> Result<String, PerceiverError> {
            self.page.markup().await
        }
    }

    #[tokio::test]
    async fn every_cached_strategy_is_tried_by_priority_before_generation() {
        let document = RecordingDocument {
            page: PageSnapshot::from_markup(LOGIN),
            queried: Mutex::new(Vec::new()),
        };
        let cache = Arc::new(StrategyCache::in_memory());
        let submit = ElementDescription::new().with_text("Submit");
        let key = Fingerprint::of(&submit);
        cache.put(
            &key,
            vec![
                LocatorStrategy::new(StrategyKind::Id, "#stale-low", "old").with_priority(40),
                LocatorStrategy::new(StrategyKind::Id, "#stale-high", "old").with_priority(90),
                LocatorStrategy::new(StrategyKind::TypeCss, "[name=\"stale\"]", "old")
                    .with_priority(70),
            ],
        );
        let generator = Arc::new(FixedGenerator(Mutex::new(vec![
            LocatorStrategy::new(StrategyKind::Id, "#still-missing", "generated"),
            LocatorStrategy::new(StrategyKind::Id, "#submit", "generated"),
        ])));
        let resolver = DefaultElementResolver::new(cache.clone(), generator);

        let resolved = resolver.resolve(&document, &submit, "login").await.unwrap();
        assert!(!resolved.from_cache);
        assert_eq!(resolved.strategy.selector, "#submit");
        assert_eq!(
            *document.queried.lock(),
            vec![
                "#stale-high".to_string(),
                "[name=\"stale\"]".to_string(),
                "#stale-low".to_string(),
                "#still-missing".to_string(),
                "#submit".to_string(),
            ]
        );
        assert_eq!(cache.entry(&key).unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn empty_description_bypasses_cache() {
        let page = PageSnapshot::from_markup("<html><body><main>only</main></body></html>");
        let cache = Arc::new(StrategyCache::in_memory());
        let resolver = DefaultElementResolver::new(cache.clone(), CountingGenerator::new());
        let resolved = resolver
            .resolve(&page, &ElementDescription::new(), "")
            .await
            .unwrap();
        assert_eq!(resolved.handle.tag, "main");
        assert!(resolved.fingerprint.is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn empty_description_resolves_inside_bodiless_fragment() {
        let page = PageSnapshot::from_markup(r#"<div class="toast">Saved</div>"#);
        let resolver = DefaultElementResolver::new(
            Arc::new(StrategyCache::in_memory()),
            CountingGenerator::new(),
        );
        let resolved = resolver
            .resolve(&page, &ElementDescription::new(), "")
            .await
            .unwrap();
        assert_eq!(resolved.handle.tag, "div");
        assert_eq!(resolved.strategy.selector, crate::strategies::FRAGMENT_SELECTOR);
        assert_eq!(resolved.attempts, 2);
    }
}
