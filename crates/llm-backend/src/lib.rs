//! Text-generation backend used to suggest replacement selectors.

pub mod client;
pub mod config;
pub mod errors;
pub mod provider;
pub mod retry;

pub use client::OllamaClient;
pub use config::{BackendConfig, GenerateOptions};
pub use errors::LlmError;
pub use provider::{StaticTextGenerator, TextGenerator};
pub use retry::{backoff_delay, send_with_retry};
