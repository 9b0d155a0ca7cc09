use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{BackendConfig, GenerateOptions};
use crate::errors::LlmError;
use crate::provider::TextGenerator;
use crate::retry::send_with_retry;

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    client: Client,
    config: BackendConfig,
}

impl OllamaClient {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfig("empty base url".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig("empty model name".to_string()));
        }
        let client = Client::builder()
            .timeout(config.generate_timeout)
            .build()
            .map_err(|err| LlmError::InvalidConfig(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions>,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        let url = self.config.endpoint("api/generate");
        let model_options = (options.temperature.is_some() || options.max_tokens.is_some()).then(|| {
            ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            }
        });
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            system: options.system.as_deref(),
            options: model_options,
        };

        let response = send_with_retry(
            &self.client,
            |client| client.post(&url).json(&body),
            self.config.max_retries,
            self.config.backoff_base,
            "generate",
        )
        .await?;

        let payload: GenerateResponse = response.json().await?;
        if let Some(error) = payload.error {
            warn!(model = %self.config.model, %error, "backend reported generation error");
            return Err(LlmError::InvalidResponse(error));
        }
        let text = payload
            .response
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))?;
        debug!(model = %self.config.model, chars = text.len(), "generation completed");
        Ok(text)
    }

    async fn health(&self) -> Result<(), LlmError> {
        let url = self.config.endpoint("api/tags");
        let timeout = self.config.health_timeout;
        send_with_retry(
            &self.client,
            |client| client.get(&url).timeout(timeout),
            0,
            self.config.backoff_base,
            "health",
        )
        .await
        .map(|_| ())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
