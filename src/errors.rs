//! Error types for session assembly and configuration

use action_locator::CacheError;
use llm_backend::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoulHealError {
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("strategy cache unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("suggestion backend misconfigured: {0}")]
    Backend(#[from] LlmError),
}
