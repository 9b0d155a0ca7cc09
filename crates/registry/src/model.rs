use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use perceiver_structural::{ElementCategory, Locator, PageCatalog, QueryMode};
use serde::{Deserialize, Serialize};

use crate::errors::RegistryError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub selector: String,
    pub query: QueryMode,
    pub category: ElementCategory,
}

impl RegistryEntry {
    pub fn new(locator: Locator, category: ElementCategory) -> Self {
        Self {
            selector: locator.selector,
            query: locator.mode,
            category,
        }
    }

    pub fn locator(&self) -> Locator {
        Locator {
            mode: self.query,
            selector: self.selector.clone(),
        }
    }
}

/// Dialect implied by a selector that arrives without one, such as an AI suggestion.
pub fn infer_mode(selector: &str) -> QueryMode {
    let trimmed = selector.trim_start();
    if trimmed.starts_with('/') || trimmed.starts_with("(/") {
        QueryMode::XPath
    } else {
        QueryMode::Css
    }
}

/// Named selectors for one logical page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectorRegistry {
    pub page: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<String, RegistryEntry>,
}

impl SelectorRegistry {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            generated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Builds a registry naming every catalog element after its most descriptive attribute.
    pub fn from_catalog(page: impl Into<String>, catalog: &PageCatalog) -> Self {
        let mut registry = Self::new(page);
        for element in &catalog.elements {
            let base = [
                element.id.as_deref(),
                element.name.as_deref(),
                element.test_id.as_deref(),
                element.aria_label.as_deref(),
                element.placeholder.as_deref(),
                element.text.as_deref(),
            ]
            .into_iter()
            .flatten()
            .map(camel_case)
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| element.category.name().to_string());

            let name = registry.unique_name(with_suffix(base, element.category));
            registry.entries.insert(
                name,
                RegistryEntry::new(element.locator.clone(), element.category),
            );
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: RegistryEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn by_category(
        &self,
        category: ElementCategory,
    ) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.category == category)
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the selector of an existing entry. A rejected patch leaves the entry untouched.
    pub fn patch(&mut self, name: &str, selector: &str) -> Result<&RegistryEntry, RegistryError> {
        let page = self.page.clone();
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownEntry {
                page,
                name: name.to_string(),
            })?;
        let selector = validate_selector(selector)
            .map_err(|reason| RegistryError::invalid_patch(name, selector, reason))?;
        entry.query = infer_mode(selector);
        entry.selector = selector.to_string();
        Ok(entry)
    }

    fn unique_name(&self, base: String) -> String {
        if !self.entries.contains_key(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.entries.contains_key(candidate))
            .unwrap_or(base)
    }
}

/// Structural sanity check for selector text headed into a registry.
pub fn validate_selector(selector: &str) -> Result<&str, String> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err("empty selector".to_string());
    }
    if trimmed.chars().any(char::is_control) {
        return Err("selector contains control characters".to_string());
    }

    let mut quote: Option<char> = None;
    let mut open: Vec<char> = Vec::new();
    let mut escaped = false;
    for ch in trimmed.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && q == '"' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' | '(' => open.push(ch),
            ']' | ')' => {
                let expected = if ch == ']' { '[' } else { '(' };
                if open.pop() != Some(expected) {
                    return Err(format!("unbalanced '{ch}'"));
                }
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    if let Some(unclosed) = open.last() {
        return Err(format!("unclosed '{unclosed}'"));
    }
    Ok(trimmed)
}

fn camel_case(raw: &str) -> String {
    let words: Vec<String> = raw
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .take(4)
        .map(str::to_ascii_lowercase)
        .collect();
    let mut out = String::new();
    for (index, word) in words.iter().enumerate() {
        if index == 0 {
            out.push_str(word);
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    if out.starts_with(|ch: char| ch.is_ascii_digit()) {
        out.insert_str(0, "el");
    }
    out
}

fn suffix_for(category: ElementCategory) -> &'static str {
    match category {
        ElementCategory::Input | ElementCategory::Password => "Input",
        ElementCategory::Toggle => "Toggle",
        ElementCategory::Select => "Select",
        ElementCategory::Button => "Button",
        ElementCategory::Link => "Link",
        ElementCategory::Heading => "Heading",
        ElementCategory::Success | ElementCategory::Error => "Message",
        ElementCategory::Other => "Element",
    }
}

fn with_suffix(base: String, category: ElementCategory) -> String {
    let suffix = suffix_for(category);
    if base
        .to_ascii_lowercase()
        .ends_with(&suffix.to_ascii_lowercase())
    {
        base
    } else {
        format!("{base}{suffix}")
    }
}
