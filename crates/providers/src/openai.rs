//! OpenAI chat-completions backend.
//!
//! Wraps the `POST /v1/chat/completions` endpoint using [`reqwest`]. The
//! vendor SDK is deliberately not used; the provider interface only needs a
//! message sequence in and a completion out.

use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::types::{ChatMessage, Completion, ProviderKind, TokenUsage};
use crate::{ChatProvider, ProviderError};

/// Default API endpoint; overridable for tests and proxies.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for the OpenAI chat API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

// Wire shapes for the slice of the response we consume.

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
    total_tokens: i32,
}

impl OpenAiProvider {
    /// Build a provider from its config entry.
    ///
    /// Fails when the credential is missing so the manager can log and skip
    /// this backend instead of shipping requests that can only 401.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "OPENAI_API_KEY is not set".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Point the provider at a different base URL (test servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiProvider {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response contained no choices".into())
            })?;

        Ok(Completion {
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt: u.prompt_tokens,
                completion: u.completion_tokens,
                total: u.total_tokens,
            }),
        })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}
