//! Guarded execution with bounded retries and healing between attempts

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::context::ScenarioContext;
use crate::errors::ExecutionFailure;
use crate::healer::SelfHealer;
use crate::types::{GuardState, GuardedStep, RetryOptions};

/// Retry executor
pub struct RetryExecutor {
    healer: Arc<dyn SelfHealer>,
}

impl RetryExecutor {
    /// Create a new executor around a healer
    pub fn new(healer: Arc<dyn SelfHealer>) -> Self {
        Self { healer }
    }

    /// Run `work` up to `max_retries + 1` times, healing between failures.
    ///
    /// The final attempt never heals and never waits. When a heal says the
    /// failure cannot be recovered the loop stops immediately. The error
    /// returned is always the operation's own last error.
    pub async fn execute_with_healing<T, E, F, Fut>(
        &self,
        scenario: &mut ScenarioContext,
        step: &GuardedStep,
        options: &RetryOptions,
        mut work: F,
    ) -> Result<T, ExecutionFailure<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let total_attempts = options.max_retries.saturating_add(1);
        let mut rationale: Option<String> = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(state = %GuardState::Attempting, attempt, step = %step.step_text, "running guarded step");
            let error = match work().await {
                Ok(value) => {
                    debug!(state = %GuardState::Done, attempt, "guarded step succeeded");
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= total_attempts {
                warn!(
                    state = %GuardState::Failed,
                    attempt,
                    error = %error,
                    "guarded step failed; no retries left"
                );
                return Err(ExecutionFailure::new(error, attempt, rationale));
            }

            if !options.healing_enabled {
                debug!(attempt, error = %error, "retrying without healing");
                continue;
            }

            let message = error.to_string();
            let kind = classify(&message);
            let heal_number = scenario.begin_heal();
            debug!(state = %GuardState::Healing, attempt, %kind, "healing guarded step");
            let context = step.healing_context(message, kind, heal_number);
            let plan = self.healer.heal(scenario, &context).await;
            rationale = Some(plan.rationale.clone());

            if !plan.can_recover {
                warn!(
                    state = %GuardState::Failed,
                    attempt,
                    error = %error,
                    rationale = %plan.rationale,
                    "guarded step failed; healing could not recover"
                );
                return Err(ExecutionFailure::new(error, attempt, rationale));
            }

            let delay = plan
                .wait_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(options.settle_delay);
            info!(
                state = %GuardState::Settling,
                action = %plan.action,
                delay_ms = delay.as_millis() as u64,
                "healed; retrying guarded step"
            );
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}
