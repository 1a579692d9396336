//! Gateway request bodies. Missing fields default to empty, so validation happens in one place
//! (the dispatcher) instead of in the JSON layer.

use serde::{Deserialize, Serialize};

/// `POST /api/chat` body: `{ "message", "provider"? }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Provider name ("openai", "gemini"). Absent or unknown => configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// `POST /api/email/send` body: `{ "to", "subject", "body" }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// `POST /api/email/delete` body: `{ "message_id" }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub message_id: String,
}

/// `GET /api/email/list?query=...`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub query: Option<String>,
}
