//! Strategy generation
//!
//! Turns an [`ElementDescription`] into a ranked list of candidate selectors.
//! Tiers, each present only when the attribute it needs is present:
//! 1. id (100) and data-testid (95) from a slug of text, aria-label or placeholder
//! 2. aria-label (90), placeholder (85), role (80)
//! 3. exact-text XPath (75, short text only), type CSS (70)
//! 4. composite attribute XPath (65), partial-text XPath (60)
//! 5. backend-suggested selector (50, optional)

use std::sync::Arc;

use async_trait::async_trait;
use llm_backend::{GenerateOptions, TextGenerator};
use perceiver_structural::query::{css_string, is_css_identifier, xpath_literal};
use tracing::{debug, warn};

use crate::types::{normalize_strategies, ElementDescription, LocatorStrategy, StrategyKind};

/// Text at or above this length gets no exact-text strategy
const MAX_EXACT_TEXT_CHARS: usize = 50;

/// Characters of normalized text kept for the partial-text strategy
const FUZZY_PREFIX_CHARS: usize = 20;

/// Selector used when the description carries nothing to match on
pub const UNIVERSAL_SELECTOR: &str = "//body//*";

/// Second fallback for captured fragments that have no `<body>`
pub const FRAGMENT_SELECTOR: &str = "//*";

/// Priority of the universal fallback, below every real tier
pub const UNIVERSAL_PRIORITY: u8 = 1;

const BUTTON_LIKE_TYPES: &[&str] = &["submit", "button", "reset", "image"];

/// Strategy generator trait
#[async_trait]
pub trait StrategyGenerator: Send + Sync {
    /// Ranked, non-empty strategy list for a description; never fails
    async fn generate(&self, description: &ElementDescription, context: &str)
        -> Vec<LocatorStrategy>;
}

/// Default generator: deterministic tiers plus an optional backend suggestion
#[derive(Default)]
pub struct DefaultStrategyGenerator {
    backend: Option<Arc<dyn TextGenerator>>,
}

impl DefaultStrategyGenerator {
    /// Create a generator without a suggestion backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the suggestion tier
    pub fn with_backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.backend = Some(backend);
        self
    }

    async fn suggest(&self, description: &ElementDescription, context: &str) -> Option<LocatorStrategy> {
        let backend = self.backend.as_ref()?;
        let prompt = suggestion_prompt(description, context);
        let options = GenerateOptions::deterministic().with_max_tokens(64);
        match backend.generate(&prompt, &options).await {
            Ok(reply) => {
                let selector = accept_suggestion(&reply);
                if selector.is_none() {
                    debug!(reply = %reply, "discarding backend reply that is not a selector");
                }
                selector.map(|selector| {
                    LocatorStrategy::new(
                        StrategyKind::AiSuggested,
                        selector,
                        format!("suggested by {}", backend.model()),
                    )
                })
            }
            Err(err) => {
                warn!(error = %err, "selector suggestion failed");
                None
            }
        }
    }
}

#[async_trait]
impl StrategyGenerator for DefaultStrategyGenerator {
    async fn generate(
        &self,
        description: &ElementDescription,
        context: &str,
    ) -> Vec<LocatorStrategy> {
        let mut strategies = deterministic_strategies(description);
        if let Some(suggested) = self.suggest(description, context).await {
            strategies.push(suggested);
        }
        if description.is_empty() {
            strategies.extend(universal_fallbacks());
        }
        let strategies = normalize_strategies(strategies);
        debug!(
            description = %description,
            count = strategies.len(),
            "generated locator strategies"
        );
        strategies
    }
}

/// Every attribute-driven tier for a description, in priority order
pub fn deterministic_strategies(description: &ElementDescription) -> Vec<LocatorStrategy> {
    let mut out = Vec::new();

    let slug_source = description
        .text()
        .or(description.aria_label())
        .or(description.placeholder());
    if let Some(slug) = slug_source.map(slugify).filter(|slug| !slug.is_empty()) {
        let id_selector = if is_css_identifier(&slug) {
            format!("#{slug}")
        } else {
            format!("[id={}]", css_string(&slug))
        };
        out.push(LocatorStrategy::new(
            StrategyKind::Id,
            id_selector,
            format!("id derived from \"{slug}\""),
        ));
        out.push(LocatorStrategy::new(
            StrategyKind::Testid,
            format!("[data-testid={}]", css_string(&slug)),
            format!("test id derived from \"{slug}\""),
        ));
    }

    if let Some(label) = description.aria_label() {
        out.push(LocatorStrategy::new(
            StrategyKind::Aria,
            format!("[aria-label={}]", css_string(label)),
            "aria-label match",
        ));
    }
    if let Some(placeholder) = description.placeholder() {
        out.push(LocatorStrategy::new(
            StrategyKind::Placeholder,
            format!("[placeholder={}]", css_string(placeholder)),
            "placeholder match",
        ));
    }
    if let Some(role) = description.role() {
        out.push(LocatorStrategy::new(
            StrategyKind::Role,
            format!("[role={}]", css_string(role)),
            "role match",
        ));
    }

    let text = description.text().map(normalize_space);
    if let Some(text) = text.as_deref() {
        if text.chars().count() < MAX_EXACT_TEXT_CHARS {
            out.push(LocatorStrategy::new(
                StrategyKind::TextXpath,
                format!("//*[normalize-space(text())={}]", xpath_literal(text)),
                "exact text match",
            ));
        }
    }

    if let Some(kind) = description.element_type() {
        let kind = kind.to_ascii_lowercase();
        let selector = if BUTTON_LIKE_TYPES.contains(&kind.as_str()) {
            format!("[type={}]", css_string(&kind))
        } else {
            format!("input[type={}]", css_string(&kind))
        };
        out.push(LocatorStrategy::new(StrategyKind::TypeCss, selector, "type match"));
    }

    if let Some(selector) = composite_selector(description) {
        out.push(LocatorStrategy::new(
            StrategyKind::Composite,
            selector,
            "all described attributes together",
        ));
    }

    if let Some(text) = text.as_deref() {
        let prefix: String = text.chars().take(FUZZY_PREFIX_CHARS).collect();
        let prefix = prefix.trim_end();
        if !prefix.is_empty() {
            out.push(LocatorStrategy::new(
                StrategyKind::FuzzyXpath,
                format!(
                    "//*[contains(normalize-space(text()), {})]",
                    xpath_literal(prefix)
                ),
                format!("partial text match on \"{prefix}\""),
            ));
        }
    }

    out
}

/// XPath ANDing every present attribute; needs two or more, or a class name
fn composite_selector(description: &ElementDescription) -> Option<String> {
    let mut predicates = Vec::new();
    if let Some(label) = description.aria_label() {
        predicates.push(format!("@aria-label={}", xpath_literal(label)));
    }
    if let Some(placeholder) = description.placeholder() {
        predicates.push(format!("@placeholder={}", xpath_literal(placeholder)));
    }
    if let Some(role) = description.role() {
        predicates.push(format!("@role={}", xpath_literal(role)));
    }
    if let Some(kind) = description.element_type() {
        predicates.push(format!("@type={}", xpath_literal(&kind.to_ascii_lowercase())));
    }
    if let Some(text) = description.text() {
        predicates.push(format!(
            "normalize-space(text())={}",
            xpath_literal(&normalize_space(text))
        ));
    }
    let classes: Vec<&str> = description
        .class_name()
        .map(|value| value.split_whitespace().collect())
        .unwrap_or_default();
    let attribute_count = predicates.len();
    for class in &classes {
        predicates.push(format!(
            "contains(concat(' ', normalize-space(@class), ' '), {})",
            xpath_literal(&format!(" {class} "))
        ));
    }

    if attribute_count < 2 && classes.is_empty() {
        return None;
    }
    Some(format!("//*[{}]", predicates.join(" and ")))
}

fn universal_fallbacks() -> [LocatorStrategy; 2] {
    [
        LocatorStrategy::new(
            StrategyKind::Composite,
            UNIVERSAL_SELECTOR,
            "universal fallback for an empty description",
        )
        .with_priority(UNIVERSAL_PRIORITY),
        LocatorStrategy::new(
            StrategyKind::Composite,
            FRAGMENT_SELECTOR,
            "universal fallback for a bodiless fragment",
        )
        .with_priority(UNIVERSAL_PRIORITY),
    ]
}

/// Prompt asking the backend for one selector
pub fn suggestion_prompt(description: &ElementDescription, context: &str) -> String {
    format!(
        "Suggest one CSS or XPath selector for a web page element.\n\
         Context: {context}\n\
         Element: {description}\n\
         Reply with the selector only, on a single line."
    )
}

/// First line of the reply when it looks like a selector (`/`, `.` or `[` prefix)
pub fn accept_suggestion(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|line| !line.is_empty())?;
    let line = line.trim_matches('`').trim();
    line.starts_with(|ch| matches!(ch, '/' | '.' | '['))
        .then(|| line.to_string())
}

/// Lowercase, ASCII alphanumeric runs joined by `-`
pub fn slugify(value: &str) -> String {
    value
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_backend::{LlmError, StaticTextGenerator};

    fn kinds(strategies: &[LocatorStrategy]) -> Vec<StrategyKind> {
        strategies.iter().map(|s| s.kind).collect()
    }

    fn assert_sorted(strategies: &[LocatorStrategy]) {
        assert!(!strategies.is_empty());
        assert!(strategies
            .windows(2)
            .all(|pair| pair[0].priority >= pair[1].priority));
    }

    #[tokio::test]
    async fn text_only_yields_id_then_testid() {
        let generator = DefaultStrategyGenerator::new();
        let strategies = generator
            .generate(&ElementDescription::new().with_text("Submit"), "checkout")
            .await;
        assert_eq!(strategies[0].selector, "#submit");
        assert_eq!(strategies[1].selector, r#"[data-testid="submit"]"#);
        assert_eq!(
            kinds(&strategies),
            [
                StrategyKind::Id,
                StrategyKind::Testid,
                StrategyKind::TextXpath,
                StrategyKind::FuzzyXpath
            ]
        );
        assert_sorted(&strategies);
    }

    #[tokio::test]
    async fn empty_description_still_yields_a_strategy() {
        let strategies = DefaultStrategyGenerator::new()
            .generate(&ElementDescription::new(), "anything")
            .await;
        let selectors: Vec<&str> = strategies.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(selectors, vec![UNIVERSAL_SELECTOR, FRAGMENT_SELECTOR]);
        assert!(strategies.iter().all(|s| s.priority == UNIVERSAL_PRIORITY));
    }

    #[tokio::test]
    async fn every_tier_present_and_sorted() {
        let description = ElementDescription::new()
            .with_text("Sign in")
            .with_placeholder("Email")
            .with_aria_label("Sign in now")
            .with_type("submit")
            .with_role("button")
            .with_class_name("btn primary");
        let strategies = DefaultStrategyGenerator::new()
            .with_backend(Arc::new(StaticTextGenerator::always("//form//button")))
            .generate(&description, "login page")
            .await;
        assert_eq!(
            kinds(&strategies),
            [
                StrategyKind::Id,
                StrategyKind::Testid,
                StrategyKind::Aria,
                StrategyKind::Placeholder,
                StrategyKind::Role,
                StrategyKind::TextXpath,
                StrategyKind::TypeCss,
                StrategyKind::Composite,
                StrategyKind::FuzzyXpath,
                StrategyKind::AiSuggested
            ]
        );
        assert_eq!(strategies[0].selector, "#sign-in");
        assert_eq!(strategies[6].selector, r#"[type="submit"]"#);
        assert!(strategies[7].selector.contains(" and "));
        assert!(strategies[7].selector.contains("' btn '"));
        assert_sorted(&strategies);
    }

    #[test]
    fn long_text_skips_exact_match() {
        let long = "This is a rather long paragraph of text that goes past fifty characters";
        let strategies = deterministic_strategies(&ElementDescription::new().with_text(long));
        assert!(!kinds(&strategies).contains(&StrategyKind::TextXpath));
        let fuzzy = strategies
            .iter()
            .find(|s| s.kind == StrategyKind::FuzzyXpath)
            .unwrap();
        assert!(fuzzy.selector.contains("'This is a rather lon'"));
    }

    #[test]
    fn type_css_depends_on_type() {
        let email = deterministic_strategies(&ElementDescription::new().with_type("email"));
        assert_eq!(email[0].selector, r#"input[type="email"]"#);
        assert_eq!(email.len(), 1);
    }

    #[test]
    fn composite_needs_two_attributes_or_a_class() {
        assert!(composite_selector(&ElementDescription::new().with_role("tab")).is_none());
        let class_only = composite_selector(&ElementDescription::new().with_class_name("nav"));
        assert_eq!(
            class_only.as_deref(),
            Some("//*[contains(concat(' ', normalize-space(@class), ' '), ' nav ')]")
        );
    }

    #[test]
    fn quotes_in_text_are_escaped() {
        let strategies =
            deterministic_strategies(&ElementDescription::new().with_text("Don't \"stop\""));
        let exact = strategies
            .iter()
            .find(|s| s.kind == StrategyKind::TextXpath)
            .unwrap();
        assert!(exact.selector.contains("concat("));
        assert_eq!(strategies[0].selector, "#don-t-stop");
    }

    #[tokio::test]
    async fn unusable_or_failed_suggestions_are_dropped() {
        let description = ElementDescription::new().with_role("search");
        let prose = DefaultStrategyGenerator::new()
            .with_backend(Arc::new(StaticTextGenerator::always("Try the search box")))
            .generate(&description, "home")
            .await;
        assert!(!kinds(&prose).contains(&StrategyKind::AiSuggested));

        let failing = DefaultStrategyGenerator::new()
            .with_backend(Arc::new(
                StaticTextGenerator::new().then_fail(LlmError::Timeout("slow".into())),
            ))
            .generate(&description, "home")
            .await;
        assert_eq!(kinds(&failing), [StrategyKind::Role]);
    }

    #[test]
    fn accepts_selector_shaped_replies_only() {
        assert_eq!(accept_suggestion("\n `.btn-primary` \n"), Some(".btn-primary".into()));
        assert_eq!(accept_suggestion("[name=q]"), Some("[name=q]".into()));
        assert_eq!(accept_suggestion("button.primary"), None);
        assert_eq!(accept_suggestion(""), None);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Sign in!"), "sign-in");
        assert_eq!(slugify("  Add   to cart "), "add-to-cart");
        assert_eq!(slugify("???"), "");
    }
}
