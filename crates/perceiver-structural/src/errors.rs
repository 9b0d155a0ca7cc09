use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PerceiverError {
    #[error("document unavailable: {0}")]
    DocumentUnavailable(String),
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("unsupported selector '{selector}': {reason}")]
    UnsupportedSelector { selector: String, reason: String },
    #[error("stale element: {0}")]
    StaleElement(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiverError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(selector: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// Selector problems only affect the query that raised them.
    pub fn is_selector_error(&self) -> bool {
        matches!(
            self,
            PerceiverError::InvalidSelector { .. } | PerceiverError::UnsupportedSelector { .. }
        )
    }
}
