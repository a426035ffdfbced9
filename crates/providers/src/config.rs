//! Provider configuration loaded from environment variables.

use crate::types::ProviderKind;
use crate::ProviderError;

/// Settings for one backend.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub enabled: bool,
}

/// Full provider layer configuration: which backend is the default, which
/// (if any) is the fallback, and per-backend settings.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub default_kind: ProviderKind,
    pub fallback_kind: Option<ProviderKind>,
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
}

impl ProvidersConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `AI_DEFAULT_PROVIDER`    | `openai`                   |
    /// | `AI_FALLBACK_PROVIDER`   | unset (no fallback)        |
    /// | `OPENAI_MODEL`           | `gpt-4o-mini`              |
    /// | `OPENAI_API_KEY`         | empty (provider disabled)  |
    /// | `OPENAI_TEMPERATURE`     | `0.7`                      |
    /// | `OPENAI_MAX_TOKENS`      | `2048`                     |
    /// | `OPENAI_ENABLED`         | `true`                     |
    /// | `GEMINI_*`               | same scheme, model `gemini-2.0-flash` |
    ///
    /// An unknown provider identifier is a fatal misconfiguration.
    pub fn from_env() -> Result<Self, ProviderError> {
        let default_kind = required_kind("AI_DEFAULT_PROVIDER", "openai")?;
        let fallback_kind = match std::env::var("AI_FALLBACK_PROVIDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                ProviderKind::parse(raw.trim()).ok_or_else(|| {
                    ProviderError::Configuration(format!(
                        "AI_FALLBACK_PROVIDER: unknown provider '{raw}'"
                    ))
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            default_kind,
            fallback_kind,
            openai: provider_config("OPENAI", "gpt-4o-mini"),
            gemini: provider_config("GEMINI", "gemini-2.0-flash"),
        })
    }

    /// The per-backend settings for one kind.
    pub fn for_kind(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

fn required_kind(var: &str, default: &str) -> Result<ProviderKind, ProviderError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.into());
    ProviderKind::parse(raw.trim())
        .ok_or_else(|| ProviderError::Configuration(format!("{var}: unknown provider '{raw}'")))
}

fn provider_config(prefix: &str, default_model: &str) -> ProviderConfig {
    let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();

    ProviderConfig {
        model: var("MODEL").unwrap_or_else(|| default_model.into()),
        api_key: var("API_KEY").unwrap_or_default(),
        temperature: var("TEMPERATURE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7),
        max_tokens: var("MAX_TOKENS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(2048),
        enabled: var("ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(true),
    }
}
