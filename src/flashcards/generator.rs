use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::FlashcardError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-2.0-flash",
                env_var: "GEMINI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-4o-mini",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-3-mini",
                env_var: "XAI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
        }
    }
}

/// Opaque generative-text capability: prompt in, text out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, FlashcardError>;
}

/// Generator speaking the OpenAI-compatible chat completions protocol
pub struct ChatCompletionsGenerator {
    client: Client,
    provider: Provider,
    model: String,
    api_key: String,
}

impl ChatCompletionsGenerator {
    pub fn new(
        provider: Provider,
        api_key: String,
        model: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let model = model.unwrap_or_else(|| provider.config().model.to_string());

        Ok(Self {
            client,
            provider,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, FlashcardError> {
        let config = self.provider.config();

        tracing::debug!(
            "Requesting completion from {} ({}), prompt is {} chars",
            self.provider.name(),
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": 0.7,
            }))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlashcardError::GenerationFailed(format!(
                "{} returned HTTP {}: {}",
                self.provider.name(),
                status,
                body
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(request_error)?;
        extract_content(&body)
    }
}

fn request_error(err: reqwest::Error) -> FlashcardError {
    if err.is_timeout() {
        FlashcardError::Timeout(err.to_string())
    } else {
        FlashcardError::GenerationFailed(err.to_string())
    }
}

fn extract_content(body: &serde_json::Value) -> Result<String, FlashcardError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            FlashcardError::GenerationFailed(format!("Invalid API response structure: {}", body))
        })
}
