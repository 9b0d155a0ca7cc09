//! Core types for locator system

use std::fmt;

use perceiver_structural::{ElementHandle, Locator, QueryMode};
use serde::{Deserialize, Serialize};

/// Attribute-based, fuzzy description of a target element
///
/// Blank attribute values are treated as absent everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescription {
    /// Visible text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Placeholder attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// aria-label attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    /// type attribute
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,

    /// ARIA role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Class attribute (one or more class names)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl ElementDescription {
    /// Create an empty description
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_aria_label(mut self, aria_label: impl Into<String>) -> Self {
        self.aria_label = Some(aria_label.into());
        self
    }

    pub fn with_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        present(&self.text)
    }

    pub fn placeholder(&self) -> Option<&str> {
        present(&self.placeholder)
    }

    pub fn aria_label(&self) -> Option<&str> {
        present(&self.aria_label)
    }

    pub fn element_type(&self) -> Option<&str> {
        present(&self.element_type)
    }

    pub fn role(&self) -> Option<&str> {
        present(&self.role)
    }

    pub fn class_name(&self) -> Option<&str> {
        present(&self.class_name)
    }

    /// Present fields as `(tag, value)` pairs in a fixed order
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("text", self.text()),
            ("placeholder", self.placeholder()),
            ("aria", self.aria_label()),
            ("type", self.element_type()),
            ("role", self.role()),
            ("class", self.class_name()),
        ]
        .into_iter()
        .filter_map(|(tag, value)| value.map(|value| (tag, value)))
        .collect()
    }

    /// Check if no attribute is present
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

impl fmt::Display for ElementDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields();
        if fields.is_empty() {
            return f.write_str("(empty description)");
        }
        let parts: Vec<String> = fields
            .into_iter()
            .map(|(tag, value)| format!("{tag}={value:?}"))
            .collect();
        f.write_str(&parts.join(" "))
    }
}

/// Strategy kind, ordered by decreasing base priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Id,
    Testid,
    Aria,
    Placeholder,
    Role,
    TextXpath,
    TypeCss,
    Composite,
    FuzzyXpath,
    AiSuggested,
}

impl StrategyKind {
    /// Get kind name as string
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Id => "id",
            StrategyKind::Testid => "testid",
            StrategyKind::Aria => "aria",
            StrategyKind::Placeholder => "placeholder",
            StrategyKind::Role => "role",
            StrategyKind::TextXpath => "text-xpath",
            StrategyKind::TypeCss => "type-css",
            StrategyKind::Composite => "composite",
            StrategyKind::FuzzyXpath => "fuzzy-xpath",
            StrategyKind::AiSuggested => "ai-suggested",
        }
    }

    /// Priority a freshly generated strategy of this kind starts with
    pub fn base_priority(&self) -> u8 {
        match self {
            StrategyKind::Id => 100,
            StrategyKind::Testid => 95,
            StrategyKind::Aria => 90,
            StrategyKind::Placeholder => 85,
            StrategyKind::Role => 80,
            StrategyKind::TextXpath => 75,
            StrategyKind::TypeCss => 70,
            StrategyKind::Composite => 65,
            StrategyKind::FuzzyXpath => 60,
            StrategyKind::AiSuggested => 50,
        }
    }

    /// Query dialect for a selector of this kind
    ///
    /// AI suggestions are the one kind without a fixed dialect; their accepted
    /// prefix decides it.
    pub fn query_mode(&self, selector: &str) -> QueryMode {
        match self {
            StrategyKind::TextXpath | StrategyKind::Composite | StrategyKind::FuzzyXpath => {
                QueryMode::XPath
            }
            StrategyKind::AiSuggested if selector.trim_start().starts_with('/') => QueryMode::XPath,
            _ => QueryMode::Css,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One concrete candidate selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub kind: StrategyKind,
    pub selector: String,
    /// 0-100; only reinforcement changes it after creation
    pub priority: u8,
    pub rationale: String,
}

impl LocatorStrategy {
    /// Create a strategy at its kind's base priority
    pub fn new(kind: StrategyKind, selector: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            priority: kind.base_priority(),
            rationale: rationale.into(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(100);
        self
    }

    /// Selector plus the dialect it is evaluated in
    pub fn locator(&self) -> Locator {
        Locator {
            mode: self.kind.query_mode(&self.selector),
            selector: self.selector.clone(),
        }
    }
}

/// Sort by descending priority (stable) and drop repeated selectors, keeping the first
pub fn normalize_strategies(mut strategies: Vec<LocatorStrategy>) -> Vec<LocatorStrategy> {
    strategies.sort_by(|a, b| b.priority.cmp(&a.priority));
    let mut seen = std::collections::HashSet::new();
    strategies.retain(|strategy| seen.insert(strategy.selector.clone()));
    strategies
}

/// Successful resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedElement {
    /// Resolved element
    pub handle: ElementHandle,

    /// Strategy that matched
    pub strategy: LocatorStrategy,

    /// Cache key the resolution was recorded under (empty when uncached)
    pub fingerprint: String,

    /// Whether the winning strategy came from the cache
    pub from_cache: bool,

    /// Number of strategies evaluated, including the winner
    pub attempts: usize,
}
