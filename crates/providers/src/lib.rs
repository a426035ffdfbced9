//! Uniform interface over interchangeable LLM backends.
//!
//! A [`ChatProvider`] turns an ordered message sequence into a completion.
//! Concrete implementations wrap the vendor HTTP APIs directly (OpenAI,
//! Gemini); the [`ProviderManager`] owns one instance per enabled backend
//! and resolves requests to the default or an explicit kind, with a single
//! fallback hop when the first choice is unavailable.

pub mod config;
pub mod gemini;
pub mod manager;
pub mod openai;
pub mod types;

pub use config::{ProviderConfig, ProvidersConfig};
pub use gemini::GeminiProvider;
pub use manager::{BoundProvider, ProviderManager};
pub use openai::OpenAiProvider;
pub use types::{ChatMessage, ChatRole, Completion, ProviderKind, TokenUsage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider cannot be constructed (missing credential, bad config).
    /// Fatal for that provider; the manager logs and skips it.
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure reaching the vendor.
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The vendor answered with a non-success status.
    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The vendor answered 200 but the body did not match the expected shape.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Neither the requested provider nor the configured fallback exists.
    #[error("No available AI provider")]
    NoAvailableProvider,
}

// ---------------------------------------------------------------------------
// The provider trait
// ---------------------------------------------------------------------------

/// A chat-completion backend.
///
/// Implementations are stateless beyond their HTTP client and safe to share
/// across tasks behind an `Arc`.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the ordered message sequence and return the completion.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Completion, ProviderError>;

    /// Which backend this is (for logging and test-result attribution).
    fn kind(&self) -> ProviderKind;
}
