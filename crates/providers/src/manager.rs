//! Provider composition root.
//!
//! [`ProviderManager`] instantiates one concrete provider per enabled config
//! entry at startup and resolves lookups to the requested kind, the default,
//! or the configured fallback. Created once and shared via `Arc` across all
//! pipeline tasks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::types::{ChatMessage, Completion, ProviderKind};
use crate::{ChatProvider, GeminiProvider, OpenAiProvider, ProviderError};

// ---------------------------------------------------------------------------
// BoundProvider
// ---------------------------------------------------------------------------

/// A provider with a fixed system prompt bound to it.
///
/// Every [`invoke`](Self::invoke) prepends the system message to the caller's
/// sequence, so pipeline stages only ever supply user content.
pub struct BoundProvider {
    inner: Arc<dyn ChatProvider>,
    system_prompt: String,
}

impl BoundProvider {
    pub fn new(inner: Arc<dyn ChatProvider>, system_prompt: impl Into<String>) -> Self {
        Self {
            inner,
            system_prompt: system_prompt.into(),
        }
    }

    /// Invoke the underlying provider with the system prompt prepended.
    pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
        let mut full = Vec::with_capacity(messages.len() + 1);
        full.push(ChatMessage::system(self.system_prompt.clone()));
        full.extend_from_slice(messages);
        self.inner.invoke(&full).await
    }

    /// Backend kind of the wrapped provider.
    pub fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Holds the instantiated providers and the default/fallback routing.
pub struct ProviderManager {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
    default_kind: ProviderKind,
    fallback_kind: Option<ProviderKind>,
}

impl ProviderManager {
    /// Instantiate every enabled provider from the config.
    ///
    /// A provider that fails to construct (missing credential, bad settings)
    /// is logged and skipped so one bad backend does not prevent startup;
    /// requests for it will fall through to the fallback.
    pub fn new(config: &ProvidersConfig) -> Self {
        let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();

        for &kind in ProviderKind::ALL {
            let entry = config.for_kind(kind);
            if !entry.enabled {
                tracing::info!(provider = %kind, "Provider disabled by config");
                continue;
            }
            let built: Result<Arc<dyn ChatProvider>, ProviderError> = match kind {
                ProviderKind::OpenAi => OpenAiProvider::new(entry).map(|p| Arc::new(p) as _),
                ProviderKind::Gemini => GeminiProvider::new(entry).map(|p| Arc::new(p) as _),
            };
            match built {
                Ok(provider) => {
                    tracing::info!(provider = %kind, model = %entry.model, "Provider ready");
                    providers.insert(kind, provider);
                }
                Err(e) => {
                    tracing::warn!(provider = %kind, error = %e, "Provider failed to initialize, skipping");
                }
            }
        }

        Self {
            providers,
            default_kind: config.default_kind,
            fallback_kind: config.fallback_kind,
        }
    }

    /// Assemble a manager from pre-built providers (tests, embedding).
    pub fn with_providers(
        providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
        default_kind: ProviderKind,
        fallback_kind: Option<ProviderKind>,
    ) -> Self {
        Self {
            providers,
            default_kind,
            fallback_kind,
        }
    }

    /// Resolve a provider: the requested kind, or the default when omitted.
    ///
    /// When the resolved kind was never instantiated and a distinct fallback
    /// is configured, the fallback is tried exactly once. The single-hop
    /// guard keeps two mutually-fallback-configured backends from looping.
    pub fn get(&self, kind: Option<ProviderKind>) -> Result<Arc<dyn ChatProvider>, ProviderError> {
        let requested = kind.unwrap_or(self.default_kind);

        if let Some(provider) = self.providers.get(&requested) {
            return Ok(Arc::clone(provider));
        }

        if let Some(fallback) = self.fallback_kind {
            if fallback != requested {
                tracing::warn!(
                    requested = %requested,
                    fallback = %fallback,
                    "Provider unavailable, trying fallback"
                );
                if let Some(provider) = self.providers.get(&fallback) {
                    return Ok(Arc::clone(provider));
                }
            }
        }

        Err(ProviderError::NoAvailableProvider)
    }

    /// Resolve a provider and bind a system prompt to it.
    pub fn bind_with_prompt(
        &self,
        system_prompt: impl Into<String>,
        kind: Option<ProviderKind>,
    ) -> Result<BoundProvider, ProviderError> {
        Ok(BoundProvider::new(self.get(kind)?, system_prompt))
    }

    /// Kinds that actually came up at startup.
    pub fn available(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;

    struct StubProvider {
        kind: ProviderKind,
        reply: String,
    }

    #[async_trait::async_trait]
    impl ChatProvider for StubProvider {
        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
            Ok(Completion {
                content: self.reply.clone(),
                usage: None,
            })
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }
    }

    fn manager_with(kinds: &[ProviderKind], fallback: Option<ProviderKind>) -> ProviderManager {
        let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
        for &kind in kinds {
            providers.insert(
                kind,
                Arc::new(StubProvider {
                    kind,
                    reply: format!("from {kind}"),
                }),
            );
        }
        ProviderManager::with_providers(providers, ProviderKind::OpenAi, fallback)
    }

    #[tokio::test]
    async fn resolves_default_when_kind_omitted() {
        let manager = manager_with(&[ProviderKind::OpenAi, ProviderKind::Gemini], None);
        let provider = manager.get(None).unwrap();
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn resolves_explicit_kind() {
        let manager = manager_with(&[ProviderKind::OpenAi, ProviderKind::Gemini], None);
        let provider = manager.get(Some(ProviderKind::Gemini)).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn falls_back_one_hop_when_requested_is_missing() {
        let manager = manager_with(&[ProviderKind::Gemini], Some(ProviderKind::Gemini));
        let provider = manager.get(Some(ProviderKind::OpenAi)).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn errors_when_nothing_is_available() {
        let manager = manager_with(&[], Some(ProviderKind::Gemini));
        assert!(matches!(
            manager.get(None),
            Err(ProviderError::NoAvailableProvider)
        ));
    }

    #[test]
    fn fallback_equal_to_requested_does_not_loop() {
        // Fallback points at the kind that just failed; must terminate.
        let manager = manager_with(&[], Some(ProviderKind::OpenAi));
        assert!(matches!(
            manager.get(Some(ProviderKind::OpenAi)),
            Err(ProviderError::NoAvailableProvider)
        ));
    }

    #[tokio::test]
    async fn bound_provider_prepends_system_prompt() {
        struct EchoProvider;

        #[async_trait::async_trait]
        impl ChatProvider for EchoProvider {
            async fn invoke(&self, messages: &[ChatMessage]) -> Result<Completion, ProviderError> {
                assert_eq!(messages[0].role, ChatRole::System);
                assert_eq!(messages[0].content, "be mystical");
                Ok(Completion {
                    content: format!("saw {} messages", messages.len()),
                    usage: None,
                })
            }

            fn kind(&self) -> ProviderKind {
                ProviderKind::OpenAi
            }
        }

        let bound = BoundProvider::new(Arc::new(EchoProvider), "be mystical");
        let completion = bound.invoke(&[ChatMessage::user("hello")]).await.unwrap();
        assert_eq!(completion.content, "saw 2 messages");
    }
}
