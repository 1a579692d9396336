//! Gemini client: POST {base}/models/{model}:generateContent?key=...

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{api_error, http_client, require_credentials, ChatProvider, LlmError, Provider};
use crate::config::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiClient {
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
impl ChatProvider for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn complete(&self, text: &str) -> Result<String, LlmError> {
        let (api_key, model) =
            require_credentials(Provider::Gemini, self.api_key.as_deref(), self.model.as_deref())?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: text.to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };
        let res = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        let data: GenerateResponse = res.json().await?;
        first_candidate_text(data).ok_or(LlmError::EmptyReply)
    }
}

/// Text of the first part of the first candidate, as the chat reply.
fn first_candidate_text(data: GenerateResponse) -> Option<String> {
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
}

// --- wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
