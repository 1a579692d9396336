//! OpenAI chat completions client (POST {base}/chat/completions, bearer auth).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{api_error, http_client, require_credentials, ChatProvider, LlmError, Provider};
use crate::config::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings, temperature: f32, timeout: Duration) -> Self {
        let base_url = settings
            .base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key: settings.api_key,
            model: settings.model,
            temperature,
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn complete(&self, text: &str) -> Result<String, LlmError> {
        let (api_key, model) =
            require_credentials(Provider::OpenAi, self.api_key.as_deref(), self.model.as_deref())?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model,
            messages: vec![OpenAiMessage {
                role: "user",
                content: text,
            }],
            temperature: self.temperature,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        let data: OpenAiChatResponse = res.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(LlmError::EmptyReply)
    }
}

// --- wire types ---

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}
