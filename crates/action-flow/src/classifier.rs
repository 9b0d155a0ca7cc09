//! Failure classification from raw error text

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SelectorNotFound,
    AssertionFailed,
    ActionFailed,
    Unknown,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::SelectorNotFound => "selector_not_found",
            ErrorKind::AssertionFailed => "assertion_failed",
            ErrorKind::ActionFailed => "action_failed",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Checked in order; the first group with a matching needle wins.
const RULES: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::SelectorNotFound,
        &["not found", "no such element", "stale element", "detached from dom"],
    ),
    (
        ErrorKind::AssertionFailed,
        &["assertion", "expected", "to contain", "tobedisplayed"],
    ),
    (
        ErrorKind::ActionFailed,
        &["click", "setvalue", "cannot perform", "not clickable"],
    ),
];

/// Map an error message to a failure kind
pub fn classify(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}
