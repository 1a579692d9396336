//! Action dispatcher: run a parsed email command against the mail backend.
//!
//! Validation happens before any backend call. Backend failures are mapped into
//! [`ActionError`] kinds the caller can tell apart; nothing here panics or propagates
//! transport errors past the result.

use std::sync::Arc;

use serde::Serialize;

use crate::command::ParsedCommand;
use crate::mail::{EmailSummary, MailBackend, MailError};

const UNCONFIGURED_MESSAGE: &str = "Mail backend is not configured.";

/// Successful outcome of one email action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionSuccess {
    Sent {
        message_id: Option<String>,
    },
    Deleted {
        message_id: String,
    },
    /// List result. `warning` is set when the backend was unavailable and `emails` is empty.
    Listed {
        emails: Vec<EmailSummary>,
        query: String,
        warning: Option<String>,
    },
}

/// Failed outcome of one email action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Missing or malformed input; the backend was not contacted.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The mail provider rejected or failed the request; `detail` keeps its message.
    #[error("{message}: {detail}")]
    Provider { message: String, detail: String },
    /// Send/delete requested while no mail backend is usable.
    #[error("{0}")]
    Unconfigured(String),
}

impl ActionError {
    /// Stable kind string for response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Validation(_) => "validation_error",
            ActionError::NotFound(_) => "not_found",
            ActionError::Provider { .. } => "provider_error",
            ActionError::Unconfigured(_) => "configuration_error",
        }
    }
}

pub type ActionResult = Result<ActionSuccess, ActionError>;

/// Routes email commands to the mail backend. Holds no per-request state.
#[derive(Clone)]
pub struct Dispatcher {
    mail: Option<Arc<dyn MailBackend>>,
}

impl Dispatcher {
    /// `mail` is None when no backend is configured.
    pub fn new(mail: Option<Arc<dyn MailBackend>>) -> Self {
        Self { mail }
    }

    pub async fn dispatch(&self, command: &ParsedCommand) -> ActionResult {
        log::debug!("dispatch: {}", command.intent());
        match command {
            ParsedCommand::SendEmail {
                recipient,
                subject,
                body,
            } => self.send(recipient, subject, body).await,
            ParsedCommand::DeleteEmail { message_id } => self.delete(message_id).await,
            ParsedCommand::ListEmails { query } => Ok(self.list(query).await),
            ParsedCommand::PlainChat { .. } => Err(ActionError::Validation(
                "plain chat is not an email action".to_string(),
            )),
        }
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> ActionResult {
        if recipient.trim().is_empty() {
            return Err(ActionError::Validation("missing recipient".to_string()));
        }
        if has_line_break(recipient) {
            return Err(ActionError::Validation("recipient must be a single line".to_string()));
        }
        if has_line_break(subject) {
            return Err(ActionError::Validation("subject must be a single line".to_string()));
        }
        let mail = self.require_mail()?;
        match mail.send_mail(recipient, subject, body).await {
            Ok(sent) => Ok(ActionSuccess::Sent {
                message_id: sent.id,
            }),
            Err(e) => Err(action_error("send", e)),
        }
    }

    async fn delete(&self, message_id: &str) -> ActionResult {
        if message_id.trim().is_empty() {
            return Err(ActionError::Validation("missing message id".to_string()));
        }
        let mail = self.require_mail()?;
        match mail.delete_mail(message_id).await {
            Ok(()) => Ok(ActionSuccess::Deleted {
                message_id: message_id.to_string(),
            }),
            Err(e) => Err(action_error("delete", e)),
        }
    }

    /// List never fails on an absent or unreachable backend: it returns no emails and a warning.
    /// Errors reported by a reachable provider still degrade, but keep the provider message.
    async fn list(&self, query: &str) -> ActionSuccess {
        let listed = |emails, warning| ActionSuccess::Listed {
            emails,
            query: query.to_string(),
            warning,
        };
        let Some(mail) = self.mail.as_ref() else {
            log::info!("dispatch: list degraded, no mail backend configured");
            return listed(Vec::new(), Some(UNCONFIGURED_MESSAGE.to_string()));
        };
        match mail.list_mail(query).await {
            Ok(emails) => listed(emails, None),
            Err(e) => {
                log::info!("dispatch: list degraded ({}): {}", mail.name(), e);
                let warning = match e {
                    MailError::Unconfigured(msg) => msg,
                    MailError::Request(err) => format!("Mail backend is unavailable: {}", err),
                    other => format!("Mail provider error: {}", other),
                };
                listed(Vec::new(), Some(warning))
            }
        }
    }

    fn require_mail(&self) -> Result<&Arc<dyn MailBackend>, ActionError> {
        self.mail
            .as_ref()
            .ok_or_else(|| ActionError::Unconfigured(UNCONFIGURED_MESSAGE.to_string()))
    }
}

/// Header values end at a line break; one inside a slot would start a new header.
fn has_line_break(value: &str) -> bool {
    value.contains(|c: char| c == '\r' || c == '\n')
}

/// Map a backend error for send/delete into an action error.
fn action_error(action: &str, e: MailError) -> ActionError {
    match e {
        MailError::Unconfigured(msg) => ActionError::Unconfigured(msg),
        MailError::NotFound(id) => ActionError::NotFound(format!("message {} not found", id)),
        other => {
            log::warn!("dispatch: {} failed: {}", action, other);
            ActionError::Provider {
                message: format!("mail provider error during {}", action),
                detail: other.to_string(),
            }
        }
    }
}
