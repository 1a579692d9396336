//! Chat fallback: send text that is not an email command to the selected chat provider.
//!
//! One attempt per message. Failures, including missing credentials, come back as a
//! [`ChatOutcome::Failed`] value rather than an error.

use crate::llm::{LlmError, Provider, ProviderRegistry};

/// Reply from the provider, or a failure with a kind and readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Reply {
        provider: Provider,
        reply: String,
    },
    Failed {
        provider: Provider,
        kind: &'static str,
        message: String,
    },
}

impl ChatOutcome {
    pub fn provider(&self) -> Provider {
        match self {
            ChatOutcome::Reply { provider, .. } | ChatOutcome::Failed { provider, .. } => *provider,
        }
    }

    fn failed(provider: Provider, err: LlmError) -> Self {
        ChatOutcome::Failed {
            provider,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Provider registry plus the default used for absent or unknown provider names.
#[derive(Clone)]
pub struct ChatFallback {
    registry: ProviderRegistry,
    default_provider: Provider,
}

impl ChatFallback {
    pub fn new(registry: ProviderRegistry, default_provider: Provider) -> Self {
        Self {
            registry,
            default_provider,
        }
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    /// Provider for a request: the named one when recognized, else the configured default.
    pub fn resolve_provider(&self, name: Option<&str>) -> Provider {
        let provider = Provider::resolve(name, self.default_provider);
        if let Some(n) = name.filter(|n| Provider::from_name(n).is_none()) {
            log::debug!("chat: unknown provider {:?}, using {}", n, provider);
        }
        provider
    }

    /// Forward `text` verbatim to `provider` and relay its reply.
    pub async fn chat(&self, text: &str, provider: Provider) -> ChatOutcome {
        let Some(client) = self.registry.get(provider) else {
            return ChatOutcome::failed(provider, LlmError::UnknownProvider(provider));
        };
        match client.complete(text).await {
            Ok(reply) => ChatOutcome::Reply { provider, reply },
            Err(e) => {
                match &e {
                    LlmError::MissingCredentials(_) => log::info!("chat: {} not configured: {}", provider, e),
                    _ => log::warn!("chat: {} failed: {}", provider, e),
                }
                ChatOutcome::failed(provider, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatProvider;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records prompts and echoes them back.
    struct EchoProvider {
        provider: Provider,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatProvider for EchoProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn complete(&self, text: &str) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(format!("{} says {}", self.provider, text))
        }
    }

    struct KeylessProvider;

    #[async_trait]
    impl ChatProvider for KeylessProvider {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn complete(&self, _text: &str) -> Result<String, LlmError> {
            Err(LlmError::MissingCredentials("GEMINI_API_KEY is not set.".to_string()))
        }
    }

    fn echo(provider: Provider) -> Arc<EchoProvider> {
        Arc::new(EchoProvider {
            provider,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn forwards_text_verbatim_to_selected_provider() {
        let openai = echo(Provider::OpenAi);
        let gemini = echo(Provider::Gemini);
        let mut registry = ProviderRegistry::new();
        registry.register(openai.clone());
        registry.register(gemini.clone());
        let chat = ChatFallback::new(registry, Provider::OpenAi);

        let outcome = chat.chat("  Hi there  ", Provider::Gemini).await;
        assert_eq!(
            outcome,
            ChatOutcome::Reply {
                provider: Provider::Gemini,
                reply: "gemini says   Hi there  ".to_string()
            }
        );
        assert_eq!(*gemini.seen.lock().unwrap(), vec!["  Hi there  ".to_string()]);
        assert!(openai.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_is_structured() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(KeylessProvider));
        let chat = ChatFallback::new(registry, Provider::Gemini);
        let outcome = chat.chat("hello", Provider::Gemini).await;
        assert_eq!(
            outcome,
            ChatOutcome::Failed {
                provider: Provider::Gemini,
                kind: "missing_credentials",
                message: "GEMINI_API_KEY is not set.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unregistered_provider_fails_cleanly() {
        let chat = ChatFallback::new(ProviderRegistry::new(), Provider::OpenAi);
        let outcome = chat.chat("hello", Provider::OpenAi).await;
        assert!(matches!(outcome, ChatOutcome::Failed { kind: "configuration_error", .. }));
    }

    #[test]
    fn unknown_provider_name_uses_default() {
        let chat = ChatFallback::new(ProviderRegistry::new(), Provider::Gemini);
        assert_eq!(chat.resolve_provider(Some("mystery")), Provider::Gemini);
        assert_eq!(chat.resolve_provider(None), Provider::Gemini);
        assert_eq!(chat.resolve_provider(Some("OpenAI")), Provider::OpenAi);
    }
}
