//! Mail capability: send, list and delete messages.
//!
//! [`MailBackend`] is the seam the dispatcher talks to. Implementations: Gmail REST API
//! ([`GmailMailer`]) and an in-process mailbox ([`MemoryMailbox`]).

mod gmail;
mod memory;

pub use gmail::GmailMailer;
pub use memory::MemoryMailbox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{self, Config, MailBackendKind};

/// Read-only projection of a provider message for list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub snippet: String,
}

/// Confirmation for a sent message. The id is whatever the provider returned, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Credentials absent or unreadable; nothing was sent to the provider.
    #[error("{0}")]
    Unconfigured(String),
    #[error("message not found: {0}")]
    NotFound(String),
    #[error("mail request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mail api error: {0}")]
    Api(String),
}

#[async_trait]
pub trait MailBackend: Send + Sync {
    /// Short backend name for logs (e.g. "gmail").
    fn name(&self) -> &str;

    async fn send_mail(&self, to: &str, subject: &str, body: &str)
        -> Result<SentMessage, MailError>;

    /// Delete a message. Unknown ids yield [`MailError::NotFound`].
    async fn delete_mail(&self, message_id: &str) -> Result<(), MailError>;

    /// List messages matching a provider query (empty = no filter).
    async fn list_mail(&self, query: &str) -> Result<Vec<EmailSummary>, MailError>;
}

/// Build the configured mail backend. None when `mail.backend` is "none".
pub fn backend_from_config(config: &Config) -> Option<Arc<dyn MailBackend>> {
    match config.mail.backend {
        MailBackendKind::Gmail => Some(Arc::new(GmailMailer::new(
            config.mail.gmail.base_url.clone(),
            config::resolve_token_file(config),
            config.mail.gmail.max_results,
        ))),
        MailBackendKind::Memory => Some(Arc::new(MemoryMailbox::new(
            config.mail.gmail.max_results as usize,
        ))),
        MailBackendKind::None => None,
    }
}
