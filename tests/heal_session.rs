use std::path::Path;
use std::sync::Arc;

use soulheal::backend::StaticTextGenerator;
use soulheal::flow::{GuardedStep, ScenarioContext};
use soulheal::locator::{ElementDescription, ElementResolver};
use soulheal::perceiver::{DocumentPort, ElementCategory, ElementHandle, Locator, PageSnapshot};
use soulheal::registry::{RegistryEntry, RegistryStore, SelectorRegistry};
use soulheal::{HealConfig, HealSession};
use tempfile::tempdir;

const PAGE: &str = "login";

const LOGIN_PAGE: &str = r#"<html><body>
  <h1>Welcome back</h1>
  <form>
    <input id="email" type="email" placeholder="Email">
    <input id="password" type="password">
    <button id="login" type="submit">Log in</button>
  </form>
</body></html>"#;

fn config_in(dir: &Path) -> HealConfig {
    let mut config = HealConfig::default();
    config.cache_path = dir.join("cache.json");
    config.registry_dir = dir.join("registries");
    config.retry.settle_delay_ms = 0;
    config
}

async fn save_stale_registry(session: &HealSession, selector: &str) {
    let mut registry = SelectorRegistry::new(PAGE);
    registry.insert(
        "loginButton",
        RegistryEntry::new(Locator::css(selector), ElementCategory::Button),
    );
    session.store().save(&registry).await.unwrap();
}

/// Look a registry entry up and require exactly one match, the way a step would
async fn locate(
    store: Arc<dyn RegistryStore>,
    document: Arc<PageSnapshot>,
    name: &'static str,
) -> Result<ElementHandle, String> {
    let registry = store
        .load(PAGE)
        .await
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "no registry".to_string())?;
    let entry = registry
        .get(name)
        .ok_or_else(|| format!("no such element '{name}'"))?;
    let matches = document
        .query(&entry.locator())
        .await
        .map_err(|err| err.to_string())?;
    match matches.as_slice() {
        [one] => Ok(one.clone()),
        _ => Err(format!("element not found: {}", entry.selector)),
    }
}

#[tokio::test]
async fn stale_registry_is_rescanned_between_attempts() {
    let dir = tempdir().unwrap();
    let session = HealSession::open(config_in(dir.path())).unwrap();
    save_stale_registry(&session, "#login-old").await;

    let document = Arc::new(PageSnapshot::from_markup(LOGIN_PAGE));
    let port: Arc<dyn DocumentPort> = document.clone();
    let executor = session.executor(Some(port));
    let step =
        GuardedStep::new("I click the login button", PAGE).with_element_ref("loginButton");
    let mut scenario = ScenarioContext::new("login works");
    let store = session.store();

    let handle = executor
        .execute_with_healing(&mut scenario, &step, &session.retry_options(), || {
            locate(store.clone(), document.clone(), "loginButton")
        })
        .await
        .unwrap();

    assert_eq!(handle.tag, "button");
    assert!(scenario.was_regenerated(PAGE));
    assert_eq!(scenario.heal_requests(), 1);
    let registry = store.load(PAGE).await.unwrap().unwrap();
    assert_eq!(registry.get("loginButton").unwrap().selector, "#login");
    assert!(registry.get("emailInput").is_some());
}

#[tokio::test]
async fn suggested_selector_patches_registry_without_live_document() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(StaticTextGenerator::always("SELECTOR: #login"));
    let session = HealSession::open(config_in(dir.path()))
        .unwrap()
        .with_backend(backend.clone());
    save_stale_registry(&session, "#sign-in").await;

    let document = Arc::new(PageSnapshot::from_markup(LOGIN_PAGE));
    let executor = session.executor(None);
    let step = GuardedStep::new("I click the login button", PAGE)
        .with_element_ref("loginButton")
        .with_markup(LOGIN_PAGE);
    let mut scenario = ScenarioContext::new("login works");
    let store = session.store();

    let handle = executor
        .execute_with_healing(&mut scenario, &step, &session.retry_options(), || {
            locate(store.clone(), document.clone(), "loginButton")
        })
        .await
        .unwrap();

    assert_eq!(handle.text.as_deref(), Some("Log in"));
    assert!(!scenario.was_regenerated(PAGE));
    assert_eq!(backend.prompts().len(), 1);
    assert!(backend.prompts()[0].contains("I click the login button"));
    let registry = store.load(PAGE).await.unwrap().unwrap();
    assert_eq!(registry.get("loginButton").unwrap().selector, "#login");
}

#[tokio::test]
async fn unrecoverable_failure_surfaces_original_error() {
    let dir = tempdir().unwrap();
    let session = HealSession::open(config_in(dir.path())).unwrap();
    let executor = session.executor(None);
    let step = GuardedStep::new("the heading says Goodbye", PAGE);
    let mut scenario = ScenarioContext::new("farewell");
    let mut calls = 0u32;

    let failure = executor
        .execute_with_healing(&mut scenario, &step, &session.retry_options(), || {
            calls += 1;
            async { Err::<(), _>("expected heading to contain 'Goodbye'".to_string()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls, 1);
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.error, "expected heading to contain 'Goodbye'");
    assert!(failure.rationale.unwrap().contains("names no element"));
}

#[tokio::test]
async fn resolved_strategies_survive_a_new_session() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let document = PageSnapshot::from_markup(LOGIN_PAGE);
    let description = ElementDescription::new()
        .with_text("Log in")
        .with_type("submit");

    let first = HealSession::open(config.clone()).unwrap();
    let resolved = first
        .resolver()
        .resolve(&document, &description, "login form")
        .await
        .unwrap();
    assert!(!resolved.from_cache);
    assert_eq!(first.stats().total_cached, 1);
    drop(first);

    let second = HealSession::open(config).unwrap();
    assert_eq!(second.cache().len(), 1);
    let again = second
        .resolver()
        .resolve(&document, &description, "login form")
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(again.handle, resolved.handle);
    assert_eq!(second.stats().successful_strategies, 2);
}
