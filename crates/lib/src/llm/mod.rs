//! Chat completion providers (OpenAI, Gemini).
//!
//! One [`ChatProvider`] interface with one client per provider. The provider is chosen per
//! request by [`Provider`] and looked up in a [`ProviderRegistry`].

mod gemini;
mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, Config};

/// Named chat provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }

    /// Parse a provider name (case-insensitive, surrounding whitespace ignored).
    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == n)
    }

    /// Requested provider if recognized, otherwise `default`.
    pub fn resolve(name: Option<&str>, default: Provider) -> Provider {
        name.and_then(Provider::from_name).unwrap_or(default)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// API key or model not configured for the selected provider.
    #[error("{0}")]
    MissingCredentials(String),
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
    #[error("llm returned no reply")]
    EmptyReply,
    #[error("no client registered for provider {0}")]
    UnknownProvider(Provider),
}

impl LlmError {
    /// Stable kind string for response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::MissingCredentials(_) => "missing_credentials",
            LlmError::UnknownProvider(_) => "configuration_error",
            _ => "provider_error",
        }
    }
}

/// A chat completion backend: forwards one user message, returns the assistant reply text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, text: &str) -> Result<String, LlmError>;
}

/// Lookup table provider -> client.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build OpenAI and Gemini clients from config (env overrides applied).
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.chat.timeout_secs);
        let temperature = config.chat.temperature;
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiClient::new(
            config::resolve_provider_settings(config, Provider::OpenAi),
            temperature,
            timeout,
        )));
        registry.register(Arc::new(GeminiClient::new(
            config::resolve_provider_settings(config, Provider::Gemini),
            temperature,
            timeout,
        )));
        registry
    }

    /// Register a client under its own provider key. Replaces any previous client for that key.
    pub fn register(&mut self, client: Arc<dyn ChatProvider>) {
        self.providers.insert(client.provider(), client);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(&provider).cloned()
    }
}

/// Build a reqwest client with the configured timeout.
fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("llm: building http client with timeout failed ({}), using defaults", e);
            reqwest::Client::new()
        })
}

/// Key and model for a request, or the MissingCredentials error naming the env variable.
fn require_credentials<'a>(
    provider: Provider,
    api_key: Option<&'a str>,
    model: Option<&'a str>,
) -> Result<(&'a str, &'a str), LlmError> {
    let prefix = provider.as_str().to_uppercase();
    let key = api_key
        .ok_or_else(|| LlmError::MissingCredentials(format!("{}_API_KEY is not set.", prefix)))?;
    let model =
        model.ok_or_else(|| LlmError::MissingCredentials(format!("{}_MODEL is not set.", prefix)))?;
    Ok((key, model))
}

/// Map a non-success response to LlmError::Api("<status> <body>").
async fn api_error(res: reqwest::Response) -> LlmError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    LlmError::Api(format!("{} {}", status, body))
}
