//! In-process mailbox. Messages live in memory for the lifetime of the process.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EmailSummary, MailBackend, MailError, SentMessage};

const SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    from: String,
    subject: String,
    body: String,
}

impl StoredMessage {
    fn snippet(&self) -> String {
        self.body.chars().take(SNIPPET_CHARS).collect()
    }

    fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let q = query.to_lowercase();
        self.from.to_lowercase().contains(&q)
            || self.subject.to_lowercase().contains(&q)
            || self.snippet().to_lowercase().contains(&q)
    }

    fn summary(&self) -> EmailSummary {
        EmailSummary {
            id: self.id.clone(),
            subject: self.subject.clone(),
            from: self.from.clone(),
            snippet: self.snippet(),
        }
    }
}

/// Mailbox held in memory; sent messages are appended as if from "me".
pub struct MemoryMailbox {
    messages: RwLock<Vec<StoredMessage>>,
    max_results: usize,
}

impl MemoryMailbox {
    pub fn new(max_results: usize) -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            max_results,
        }
    }

    /// Store a message as received from `from`. Returns its id.
    pub async fn deliver(&self, from: &str, subject: &str, body: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.messages.write().await.push(StoredMessage {
            id: id.clone(),
            from: from.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        id
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MailBackend for MemoryMailbox {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SentMessage, MailError> {
        let id = self.deliver("me", subject, body).await;
        log::info!("memory mailbox: stored message {} to {}", id, to);
        Ok(SentMessage { id: Some(id) })
    }

    async fn delete_mail(&self, message_id: &str) -> Result<(), MailError> {
        let mut messages = self.messages.write().await;
        let pos = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| MailError::NotFound(message_id.to_string()))?;
        messages.remove(pos);
        Ok(())
    }

    async fn list_mail(&self, query: &str) -> Result<Vec<EmailSummary>, MailError> {
        let query = query.trim();
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .rev()
            .filter(|m| m.matches(query))
            .take(self.max_results)
            .map(StoredMessage::summary)
            .collect())
    }
}
