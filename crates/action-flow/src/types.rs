//! Core types for healing and guarded execution

use std::fmt;
use std::time::Duration;

use action_locator::ElementDescription;
use serde::{Deserialize, Serialize};

use crate::classifier::ErrorKind;

/// Everything the healer knows about one failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingContext {
    /// Step text, e.g. "I click the login button"
    pub step_text: String,

    /// Logical page whose registry the step used
    pub page_name: String,

    /// Registry entry the step referenced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_element_ref: Option<String>,

    pub error_message: String,

    pub error_kind: ErrorKind,

    /// 1-based count of heals requested in the current scenario
    pub attempt_count: u32,

    /// Description of the target, when the step had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<ElementDescription>,

    /// Captured markup for sessions without a live document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

/// Recovery action chosen by the healer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    UpdateSelector,
    RescanPage,
    RetryWithWait,
    None,
}

impl RecoveryAction {
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryAction::UpdateSelector => "updateSelector",
            RecoveryAction::RescanPage => "rescanPage",
            RecoveryAction::RetryWithWait => "retryWithWait",
            RecoveryAction::None => "none",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Healer verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPlan {
    pub can_recover: bool,
    pub action: RecoveryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
    pub rationale: String,
}

impl RecoveryPlan {
    /// Not recoverable
    pub fn give_up(rationale: impl Into<String>) -> Self {
        Self {
            can_recover: false,
            action: RecoveryAction::None,
            proposed_selector: None,
            wait_ms: None,
            rationale: rationale.into(),
        }
    }

    pub fn rescanned(rationale: impl Into<String>) -> Self {
        Self {
            can_recover: true,
            action: RecoveryAction::RescanPage,
            proposed_selector: None,
            wait_ms: None,
            rationale: rationale.into(),
        }
    }

    pub fn updated(selector: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            can_recover: true,
            action: RecoveryAction::UpdateSelector,
            proposed_selector: Some(selector.into()),
            wait_ms: None,
            rationale: rationale.into(),
        }
    }

    pub fn wait(wait_ms: u64, rationale: impl Into<String>) -> Self {
        Self {
            can_recover: true,
            action: RecoveryAction::RetryWithWait,
            proposed_selector: None,
            wait_ms: Some(wait_ms),
            rationale: rationale.into(),
        }
    }
}

/// Orchestrator knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealerSettings {
    /// Heals allowed per scenario before giving up
    pub max_attempts: u32,
    /// Allow whole-page re-scans when a live document is attached
    pub rescan_enabled: bool,
    /// Answer `action_failed` with a plain wait instead of a re-scan
    pub wait_on_action_failure: bool,
    /// Wait used for `retryWithWait`
    pub action_wait_ms: u64,
    /// Elements listed in the suggestion prompt
    pub inventory_limit: usize,
}

impl Default for HealerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            rescan_enabled: true,
            wait_on_action_failure: false,
            action_wait_ms: 2_000,
            inventory_limit: 20,
        }
    }
}

/// Retry executor options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub healing_enabled: bool,
    /// Pause after a successful heal when the plan names no wait of its own
    pub settle_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            healing_enabled: true,
            settle_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_healing(mut self, enabled: bool) -> Self {
        self.healing_enabled = enabled;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// What a guarded operation is doing, used to build healing contexts
#[derive(Debug, Clone, Default)]
pub struct GuardedStep {
    pub step_text: String,
    pub page_name: String,
    pub element_ref: Option<String>,
    pub description: Option<ElementDescription>,
    pub markup: Option<String>,
}

impl GuardedStep {
    /// Create a step on a page
    pub fn new(step_text: impl Into<String>, page_name: impl Into<String>) -> Self {
        Self {
            step_text: step_text.into(),
            page_name: page_name.into(),
            ..Self::default()
        }
    }

    pub fn with_element_ref(mut self, name: impl Into<String>) -> Self {
        self.element_ref = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: ElementDescription) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    /// Healing context for one failure of this step
    pub fn healing_context(
        &self,
        error_message: impl Into<String>,
        error_kind: ErrorKind,
        attempt_count: u32,
    ) -> HealingContext {
        HealingContext {
            step_text: self.step_text.clone(),
            page_name: self.page_name.clone(),
            failed_element_ref: self.element_ref.clone(),
            error_message: error_message.into(),
            error_kind,
            attempt_count,
            description: self.description.clone(),
            markup: self.markup.clone(),
        }
    }
}

/// Guarded operation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardState {
    Attempting,
    Healing,
    Settling,
    Done,
    Failed,
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardState::Done | GuardState::Failed)
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardState::Attempting => "ATTEMPTING",
            GuardState::Healing => "HEALING",
            GuardState::Settling => "SETTLING",
            GuardState::Done => "DONE",
            GuardState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_wire_format_is_camel_case() {
        let plan = RecoveryPlan::updated("#login", "heuristic button match");
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["canRecover"], true);
        assert_eq!(json["action"], "updateSelector");
        assert_eq!(json["proposedSelector"], "#login");
        assert!(json.get("waitMs").is_none());
        assert_eq!(RecoveryPlan::give_up("x").action, RecoveryAction::None);
    }

    #[test]
    fn step_builds_context() {
        let step = GuardedStep::new("I click the login button", "login")
            .with_element_ref("loginButton")
            .with_markup("<button>Log in</button>");
        let context = step.healing_context("not found", ErrorKind::SelectorNotFound, 1);
        assert_eq!(context.failed_element_ref.as_deref(), Some("loginButton"));
        assert_eq!(context.attempt_count, 1);
        assert!(context.markup.is_some());
        assert!(context.description.is_none());
    }

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(GuardState::Done.is_terminal());
        assert!(GuardState::Failed.is_terminal());
        assert!(!GuardState::Settling.is_terminal());
        assert_eq!(GuardState::Healing.to_string(), "HEALING");
    }
}
