//! Healing and guarded execution error types

use std::error::Error as StdError;
use std::fmt;

use llm_backend::LlmError;
use perceiver_structural::PerceiverError;
use selector_registry::RegistryError;
use thiserror::Error;

/// Healing errors. The orchestrator never surfaces these directly; they are
/// folded into a non-recoverable plan.
#[derive(Debug, Error)]
pub enum HealError {
    /// Healing attempt counter exceeded
    #[error("Healing attempts exceeded ({attempts} > {max})")]
    Exhausted { attempts: u32, max: u32 },

    /// Registry load, patch or save failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Document or analyzer failure
    #[error("Document error: {0}")]
    Document(#[from] PerceiverError),

    /// Suggestion backend failure
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    /// No registry entry to apply a selector to
    #[error("No registry entry to patch: {0}")]
    MissingTarget(String),

    /// Re-scan produced nothing worth registering
    #[error("Re-scan of page '{0}' found no addressable elements")]
    EmptyCatalog(String),
}

impl HealError {
    /// Check if a later heal in the same scenario could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            HealError::Exhausted { .. } | HealError::MissingTarget(_) => false,
            HealError::EmptyCatalog(_) => true,
            HealError::Backend(err) => err.is_transient(),
            HealError::Registry(err) => !err.is_rejected_patch(),
            HealError::Document(_) => true,
        }
    }
}

/// Original operation failure plus what the guard did about it
#[derive(Debug)]
pub struct ExecutionFailure<E> {
    /// Last error returned by the operation
    pub error: E,

    /// Number of times the operation ran
    pub attempts: u32,

    /// Why the last heal did not (or could not) fix the failure
    pub rationale: Option<String>,
}

impl<E> ExecutionFailure<E> {
    pub fn new(error: E, attempts: u32, rationale: Option<String>) -> Self {
        Self {
            error,
            attempts,
            rationale,
        }
    }

    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E: fmt::Display> fmt::Display for ExecutionFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)?;
        if let Some(rationale) = &self.rationale {
            write!(f, "; healing: {rationale}")?;
        }
        Ok(())
    }
}

impl<E> StdError for ExecutionFailure<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}
