use std::sync::Arc;

use action_locator::{
    DefaultElementResolver, DefaultStrategyGenerator, ElementDescription, ElementResolver,
    Fingerprint, StrategyCache,
};
use llm_backend::StaticTextGenerator;
use perceiver_structural::PageSnapshot;

const CHECKOUT: &str = r#"<html><body>
  <h1>Checkout</h1>
  <input name="card" aria-label="Card number" placeholder="1234 5678">
  <button class="btn primary" type="submit">Pay now</button>
  <a href="/cart">Back to cart</a>
</body></html>"#;

#[test]
fn learned_strategies_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strategy-cache.json");
    let page = PageSnapshot::from_markup(CHECKOUT);
    let card = ElementDescription::new().with_aria_label("Card number");

    let first = tokio_test::block_on(async {
        let cache = Arc::new(StrategyCache::with_persistence(&path).unwrap());
        let resolver = DefaultElementResolver::new(cache, Arc::new(DefaultStrategyGenerator::new()));
        resolver.resolve(&page, &card, "checkout").await.unwrap()
    });
    assert!(!first.from_cache);
    assert_eq!(first.handle.tag, "input");

    let second = tokio_test::block_on(async {
        let cache = Arc::new(StrategyCache::with_persistence(&path).unwrap());
        assert!(cache.contains(&Fingerprint::of(&card)));
        let resolver = DefaultElementResolver::new(cache, Arc::new(DefaultStrategyGenerator::new()));
        resolver.resolve(&page, &card, "checkout").await.unwrap()
    });
    assert!(second.from_cache);
    assert_eq!(second.handle, first.handle);
}

#[test]
fn ai_suggestion_is_the_last_resort() {
    let page = PageSnapshot::from_markup(CHECKOUT);
    let backend = Arc::new(StaticTextGenerator::always("`//a[@href='/cart']`"));
    let generator = DefaultStrategyGenerator::new().with_backend(backend.clone());
    let resolver = DefaultElementResolver::new(Arc::new(StrategyCache::in_memory()), Arc::new(generator));

    // the link text is not what the description says, so only the backend can find it
    let back = ElementDescription::new().with_text("Return to basket");
    let resolved = tokio_test::block_on(resolver.resolve(&page, &back, "checkout")).unwrap();
    assert_eq!(resolved.handle.tag, "a");
    assert_eq!(resolved.strategy.kind.name(), "ai-suggested");
    assert_eq!(backend.prompts().len(), 1);
}

#[test]
fn composite_strategy_finds_classed_button() {
    let page = PageSnapshot::from_markup(CHECKOUT);
    let resolver = DefaultElementResolver::new(
        Arc::new(StrategyCache::in_memory()),
        Arc::new(DefaultStrategyGenerator::new()),
    );
    let pay = ElementDescription::new().with_text("Pay now").with_type("submit");
    let resolved = tokio_test::block_on(resolver.resolve(&page, &pay, "checkout")).unwrap();
    assert_eq!(resolved.handle.tag, "button");
    assert_eq!(resolved.handle.text.as_deref(), Some("Pay now"));
}
