use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::GenerateOptions;
use crate::errors::LlmError;

/// Abstraction over text-generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError>;

    /// Cheap reachability check.
    async fn health(&self) -> Result<(), LlmError>;

    fn model(&self) -> &str {
        "unknown"
    }
}

/// Deterministic generator for tests and offline runs. Replies are consumed in
/// order; once exhausted the fallback reply (if any) is repeated.
#[derive(Debug, Default)]
pub struct StaticTextGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl StaticTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn then_fail(self, error: LlmError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for StaticTextGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .ok_or_else(|| LlmError::InvalidResponse("no scripted reply".to_string()))
    }

    async fn health(&self) -> Result<(), LlmError> {
        Ok(())
    }

    fn model(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_replies_then_fallback() {
        let generator = StaticTextGenerator::always("SELECTOR: #fallback")
            .then_reply("first")
            .then_fail(LlmError::Timeout("slow".into()));
        let options = GenerateOptions::default();
        assert_eq!(generator.generate("a", &options).await.unwrap(), "first");
        assert!(generator.generate("b", &options).await.is_err());
        assert_eq!(
            generator.generate("c", &options).await.unwrap(),
            "SELECTOR: #fallback"
        );
        assert_eq!(generator.prompts(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_script_reports_invalid_response() {
        let generator = StaticTextGenerator::new();
        assert!(matches!(
            generator.generate("x", &GenerateOptions::default()).await,
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
