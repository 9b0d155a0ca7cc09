//! Error types for locator system

use std::path::PathBuf;

use perceiver_structural::PerceiverError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Every cached and generated strategy failed
    #[error("Element not found: {description} ({attempts} strategies tried)")]
    ElementNotFound { description: String, attempts: usize },

    /// A single strategy did not produce exactly one visible element
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// Document access failed
    #[error("Document error: {0}")]
    Document(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Build a strategy-level failure
    pub fn strategy(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        LocatorError::StrategyFailed {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::Document(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 3,
            LocatorError::Document(_) => 2,
            LocatorError::ElementNotFound { .. } => 1,
            LocatorError::StrategyFailed { .. } => 0,
        }
    }
}

impl From<PerceiverError> for LocatorError {
    fn from(err: PerceiverError) -> Self {
        LocatorError::Document(err.to_string())
    }
}

/// Strategy cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but does not parse
    #[error("cache file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
