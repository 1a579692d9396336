//! JSON response envelope shared by every chat and email endpoint.
//!
//! Exactly the fields that apply are set; the rest are omitted on the wire. A caller can always
//! render something: `reply`, `emails`/`status`, or `error` with `detail`.

use serde::{Deserialize, Serialize};

use crate::chat::ChatOutcome;
use crate::command::ParsedCommand;
use crate::dispatch::{ActionError, ActionResult, ActionSuccess};
use crate::llm::Provider;
use crate::mail::EmailSummary;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// "sent", "deleted" or "ok" for successful email actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<EmailSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Non-fatal degradation (e.g. list without a configured mail backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    /// Error kind (e.g. "validation_error", "not_found").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable message for the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The recognized command, echoed back when the message was parsed as one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ParsedCommand>,
}

impl Envelope {
    /// Envelope with only `detail` set (request-level errors such as an empty message).
    pub fn detail(message: impl Into<String>) -> Self {
        Self {
            detail: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn from_action(result: &ActionResult) -> Self {
        match result {
            Ok(success) => Self::from_success(success),
            Err(err) => Self::from_action_error(err),
        }
    }

    fn from_success(success: &ActionSuccess) -> Self {
        match success {
            ActionSuccess::Sent { message_id } => Self {
                status: Some("sent".to_string()),
                message_id: message_id.clone(),
                ..Self::default()
            },
            ActionSuccess::Deleted { message_id } => Self {
                status: Some("deleted".to_string()),
                message_id: Some(message_id.clone()),
                ..Self::default()
            },
            ActionSuccess::Listed {
                emails,
                query,
                warning,
            } => Self {
                status: Some("ok".to_string()),
                emails: Some(emails.clone()),
                query: Some(query.clone()),
                warning: warning.clone(),
                ..Self::default()
            },
        }
    }

    fn from_action_error(err: &ActionError) -> Self {
        Self {
            error: Some(err.kind().to_string()),
            detail: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn from_chat(outcome: &ChatOutcome) -> Self {
        match outcome {
            ChatOutcome::Reply { provider, reply } => Self {
                provider: Some(*provider),
                reply: Some(reply.clone()),
                ..Self::default()
            },
            ChatOutcome::Failed {
                provider,
                kind,
                message,
            } => Self {
                provider: Some(*provider),
                error: Some(kind.to_string()),
                detail: Some(message.clone()),
                ..Self::default()
            },
        }
    }

    /// Echo the parsed command back to the caller.
    pub fn with_action(mut self, action: ParsedCommand) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
