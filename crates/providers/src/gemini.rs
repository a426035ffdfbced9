//! Google Gemini backend.
//!
//! Wraps the `generateContent` REST endpoint using [`reqwest`]. Gemini has
//! no system role in `contents`; system messages are lifted into
//! `systemInstruction`, and assistant messages map to the `model` role.

use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::types::{ChatMessage, ChatRole, Completion, ProviderKind, TokenUsage};
use crate::{ChatProvider, ProviderError};

/// Default API endpoint; overridable for tests and proxies.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP client for the Gemini generateContent API.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

// Wire shapes for the slice of the response we consume.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
    total_token_count: Option<i32>,
}

impl GeminiProvider {
    /// Build a provider from its config entry; fails without a credential.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "GEMINI_API_KEY is not set".into(),
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

    /// Split the message sequence into Gemini's shape: an optional system
    /// instruction plus role-mapped `contents`.
    fn build_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "model",
                    _ => "user",
                };
                serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });
        if !system_text.is_empty() {
            body["systemInstruction"] =
                serde_json::json!({ "parts": [{ "text": system_text.join("\n\n") }] });
        }
        body
    }
}

#[async_trait::async_trait]
impl ChatProvider for GeminiProvider {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(&self.build_body(messages))
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

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.clone()))
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response contained no candidates".into())
            })?;

        let usage = parsed.usage_metadata.and_then(|u| {
            match (
                u.prompt_token_count,
                u.candidates_token_count,
                u.total_token_count,
            ) {
                (Some(prompt), Some(completion), Some(total)) => Some(TokenUsage {
                    prompt,
                    completion,
                    total,
                }),
                _ => None,
            }
        });

        Ok(Completion { content, usage })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(&ProviderConfig {
            model: "gemini-2.0-flash".into(),
            api_key: "test-key".into(),
            temperature: 0.7,
            max_tokens: 1024,
            enabled: true,
        })
        .unwrap()
    }

    #[test]
    fn system_messages_become_system_instruction() {
        let body = provider().build_body(&[
            ChatMessage::system("You are a tarot assistant."),
            ChatMessage::user("Hello"),
        ]);

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a tarot assistant."
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let body = provider().build_body(&[
            ChatMessage::user("Hi"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: "Hello there".into(),
            },
        ]);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let result = GeminiProvider::new(&ProviderConfig {
            model: "gemini-2.0-flash".into(),
            api_key: "".into(),
            temperature: 0.7,
            max_tokens: 1024,
            enabled: true,
        });
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }
}
