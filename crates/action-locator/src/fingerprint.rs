//! Cache keys derived from element descriptions.
//!
//! Each present field becomes `<tag>-<value>`, where the value is lowercased,
//! stripped of non-word characters, whitespace-collapsed to `_` and cut to 50
//! characters. Sanitized values never contain `-`, so every `-` in a key marks
//! a field tag and two different descriptions cannot produce the same key
//! unless they agree on the first 50 sanitized characters of every field.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ElementDescription;

const MAX_FIELD_CHARS: usize = 50;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(description: &ElementDescription) -> Self {
        let parts: Vec<String> = description
            .fields()
            .into_iter()
            .filter_map(|(tag, value)| {
                let value = sanitize(value);
                (!value.is_empty()).then(|| format!("{tag}-{value}"))
            })
            .collect();
        Fingerprint(parts.join("_"))
    }

    /// A bare string used directly as a description.
    pub fn from_raw(raw: &str) -> Self {
        Fingerprint(sanitize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty fingerprints are never cached.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn sanitize(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), "_");
    collapsed.chars().take(MAX_FIELD_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_values() {
        assert_eq!(sanitize("  Sign   In! "), "sign_in");
        assert_eq!(sanitize("E-mail (work)"), "email_work");
        assert_eq!(sanitize(&"x".repeat(80)).len(), 50);
        assert_eq!(sanitize("?!"), "");
    }

    #[test]
    fn equal_descriptions_share_a_fingerprint() {
        let a = ElementDescription::new().with_text("Submit").with_type("submit");
        let b = ElementDescription::new().with_type("submit").with_text("  SUBMIT ");
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
        assert_eq!(Fingerprint::of(&a).as_str(), "text-submit_type-submit");
    }

    #[test]
    fn distinct_descriptions_never_collide() {
        let corpus = vec![
            ElementDescription::new().with_text("a"),
            ElementDescription::new().with_placeholder("a"),
            ElementDescription::new().with_aria_label("a"),
            ElementDescription::new().with_text("a b"),
            ElementDescription::new().with_text("a").with_role("b"),
            ElementDescription::new().with_text("a_role"),
            ElementDescription::new().with_text("a").with_type("b"),
            ElementDescription::new().with_text("a").with_class_name("b"),
            ElementDescription::new().with_role("a").with_type("b"),
            ElementDescription::new().with_role("b").with_type("a"),
            ElementDescription::new().with_text("Log in"),
            ElementDescription::new().with_text("Login"),
        ];
        let mut seen = std::collections::HashMap::new();
        for description in &corpus {
            let key = Fingerprint::of(description);
            assert!(!key.is_empty());
            assert!(
                seen.insert(key.clone(), description).is_none(),
                "collision on {key}"
            );
        }
        assert_eq!(seen.len(), corpus.len());
    }

    #[test]
    fn empty_description_has_empty_fingerprint() {
        assert!(Fingerprint::of(&ElementDescription::new()).is_empty());
        assert!(Fingerprint::of(&ElementDescription::new().with_text("!!!")).is_empty());
        assert_eq!(Fingerprint::from_raw("Login Button").as_str(), "login_button");
    }
}
