use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no registry entry '{name}' on page '{page}'")]
    UnknownEntry { page: String, name: String },
    #[error("rejected patch for '{name}' with selector '{selector}': {reason}")]
    InvalidPatch {
        name: String,
        selector: String,
        reason: String,
    },
    #[error("invalid page name '{0}'")]
    InvalidPage(String),
    #[error("registry io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("registry format error: {0}")]
    Format(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_patch(name: &str, selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPatch {
            name: name.to_string(),
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// The registry itself is fine; only the requested change was refused.
    pub fn is_rejected_patch(&self) -> bool {
        matches!(
            self,
            RegistryError::InvalidPatch { .. } | RegistryError::UnknownEntry { .. }
        )
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Format(err.to_string())
    }
}
