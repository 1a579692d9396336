//! Gmail REST API backend (https://gmail.googleapis.com/gmail/v1 by default).
//!
//! The OAuth access token is read from the token file on every call, so a token written
//! after startup is picked up without a restart. No refresh is attempted here.

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use serde::Deserialize;
use std::path::PathBuf;

use super::{EmailSummary, MailBackend, MailError, SentMessage};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail client for the signed-in user ("me").
#[derive(Clone)]
pub struct GmailMailer {
    base_url: String,
    token_file: PathBuf,
    max_results: u32,
    client: reqwest::Client,
}

impl GmailMailer {
    pub fn new(base_url: Option<String>, token_file: PathBuf, max_results: u32) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            token_file,
            max_results,
            client: reqwest::Client::new(),
        }
    }

    /// Access token from the token file. Absent file or token => Unconfigured.
    async fn access_token(&self) -> Result<String, MailError> {
        let raw = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| {
                log::debug!("gmail: reading {}: {}", self.token_file.display(), e);
                MailError::Unconfigured(format!(
                    "Gmail credentials are not configured (no token file at {}).",
                    self.token_file.display()
                ))
            })?;
        token_from_json(&raw)
    }

    /// URL of one message: {base}/users/me/messages/{id}, with the id as a single path segment.
    fn message_url(&self, message_id: &str) -> Result<reqwest::Url, MailError> {
        let mut url = reqwest::Url::parse(&format!("{}/users/me/messages", self.base_url))
            .map_err(|e| MailError::Api(format!("invalid gmail base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MailError::Api("invalid gmail base url".to_string()))?
            .push(message_id);
        Ok(url)
    }

    /// GET one message's From/Subject headers and snippet.
    async fn fetch_summary(&self, token: &str, message_id: &str) -> Result<EmailSummary, MailError> {
        let url = self.message_url(message_id)?;
        let res = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Subject"),
            ])
            .send()
            .await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MailError::NotFound(message_id.to_string()));
        }
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        let detail: MessageDetail = res.json().await?;
        Ok(detail.into_summary(message_id))
    }
}

#[async_trait]
impl MailBackend for GmailMailer {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SentMessage, MailError> {
        let token = self.access_token().await?;
        let raw = URL_SAFE_NO_PAD.encode(build_message(to, subject, body).as_bytes());
        let url = format!("{}/users/me/messages/send", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        let sent: SendResponse = res.json().await?;
        log::info!("gmail: sent message {}", sent.id.as_deref().unwrap_or("(no id)"));
        Ok(SentMessage { id: sent.id })
    }

    async fn delete_mail(&self, message_id: &str) -> Result<(), MailError> {
        let token = self.access_token().await?;
        let url = self.message_url(message_id)?;
        let res = self.client.delete(url).bearer_auth(&token).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MailError::NotFound(message_id.to_string()));
        }
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(())
    }

    async fn list_mail(&self, query: &str) -> Result<Vec<EmailSummary>, MailError> {
        let token = self.access_token().await?;
        let url = format!("{}/users/me/messages", self.base_url);
        let max_results = self.max_results.to_string();
        let res = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        let listed: ListResponse = res.json().await?;
        let fetches = listed
            .messages
            .iter()
            .map(|m| self.fetch_summary(&token, &m.id));
        let mut emails = Vec::with_capacity(listed.messages.len());
        for fetched in futures_util::future::join_all(fetches).await {
            match fetched {
                Ok(summary) => emails.push(summary),
                // Deleted between the list call and the metadata fetch.
                Err(MailError::NotFound(id)) => log::debug!("gmail: message {} vanished during list", id),
                Err(e) => return Err(e),
            }
        }
        Ok(emails)
    }
}

/// Parse the stored token JSON. Accepts `token` (google-auth format) or `access_token`.
fn token_from_json(raw: &str) -> Result<String, MailError> {
    let stored: StoredToken = serde_json::from_str(raw)
        .map_err(|e| MailError::Unconfigured(format!("Gmail token file is invalid: {}", e)))?;
    if let Some(ref expiry) = stored.expiry {
        if is_expired(expiry, chrono::Utc::now()) {
            log::warn!("gmail: access token expired at {}; requests will likely be rejected", expiry);
        }
    }
    stored
        .token
        .or(stored.access_token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MailError::Unconfigured("Gmail token file has no access token.".to_string()))
}

/// True when `expiry` (RFC 3339, or naive UTC as written by google-auth) is before `now`.
fn is_expired(expiry: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
    let parsed = chrono::DateTime::parse_from_rfc3339(expiry)
        .map(|t| t.with_timezone(&chrono::Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(expiry, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|t| t.and_utc())
        });
    match parsed {
        Ok(t) => t < now,
        Err(_) => false,
    }
}

/// Build a plain-text RFC 2822 message.
fn build_message(to: &str, subject: &str, body: &str) -> String {
    let mut message = format!("To: {}\r\n", header_value(to));
    message.push_str(&format!("Subject: {}\r\n", encode_subject(&header_value(subject))));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    message.push_str(body);
    message
}

/// Header text on one line: CR and LF become spaces so a value cannot open another header.
fn header_value(value: &str) -> String {
    value.replace(|c: char| c == '\r' || c == '\n', " ")
}

/// RFC 2047 encoded-word for non-ASCII subjects; ASCII passes through.
fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        return subject.to_string();
    }
    format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
}

async fn api_error(res: reqwest::Response) -> MailError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    MailError::Api(format!("{} {}", status, body))
}

// --- wire types ---

#[derive(Debug, Deserialize)]
struct StoredToken {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl MessageDetail {
    fn header(&self, name: &str) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }

    fn into_summary(self, id: &str) -> EmailSummary {
        EmailSummary {
            id: id.to_string(),
            subject: self.header("Subject"),
            from: self.header("From"),
            snippet: self.snippet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn token_field_variants() {
        assert_eq!(token_from_json(r#"{"token":"ya29.a"}"#).unwrap(), "ya29.a");
        assert_eq!(token_from_json(r#"{"access_token":"ya29.b"}"#).unwrap(), "ya29.b");
        assert!(matches!(
            token_from_json(r#"{"refresh_token":"r"}"#),
            Err(MailError::Unconfigured(_))
        ));
        assert!(matches!(token_from_json("not json"), Err(MailError::Unconfigured(_))));
    }

    #[test]
    fn expiry_formats() {
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(is_expired("2025-06-01T11:00:00Z", now));
        assert!(is_expired("2025-06-01T11:59:59.123456", now));
        assert!(!is_expired("2025-06-01T13:00:00+00:00", now));
        assert!(!is_expired("garbage", now));
    }

    #[test]
    fn message_has_headers_then_body() {
        let m = build_message("a@b.com", "Hello", "line one\nline two");
        assert!(m.starts_with("To: a@b.com\r\nSubject: Hello\r\n"));
        assert!(m.ends_with("\r\n\r\nline one\nline two"));
    }

    #[test]
    fn header_line_breaks_cannot_add_headers() {
        let m = build_message("a@b.com\r\nCc: x@y.z", "Hi\nBcc: spy@evil.test", "hello");
        let (headers, body) = m.split_once("\r\n\r\n").unwrap();
        assert_eq!(body, "hello");
        let lines: Vec<&str> = headers.split("\r\n").collect();
        assert_eq!(lines[0], "To: a@b.com  Cc: x@y.z");
        assert_eq!(lines[1], "Subject: Hi Bcc: spy@evil.test");
        assert!(!lines.iter().any(|l| l.starts_with("Bcc:") || l.starts_with("Cc:")));
    }

    #[test]
    fn non_ascii_subject_is_encoded_word() {
        let m = build_message("a@b.com", "Grüße", "hallo");
        assert!(m.contains("\r\nSubject: =?UTF-8?B?R3LDvMOfZQ==?=\r\n"), "{}", m);
        assert_eq!(encode_subject("Plain subject"), "Plain subject");
    }

    #[test]
    fn message_url_escapes_id() {
        let mailer = GmailMailer::new(Some("http://localhost:1/gmail/v1/".to_string()), PathBuf::from("t.json"), 10);
        let url = mailer.message_url("abc/def").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1/gmail/v1/users/me/messages/abc%2Fdef");
    }

    #[test]
    fn summary_from_metadata() {
        let detail: MessageDetail = serde_json::from_str(
            r#"{"id":"m1","snippet":"hey","payload":{"headers":[{"name":"from","value":"x@y.z"},{"name":"Subject","value":"S"}]}}"#,
        )
        .unwrap();
        let s = detail.into_summary("m1");
        assert_eq!(s.from, "x@y.z");
        assert_eq!(s.subject, "S");
        assert_eq!(s.snippet, "hey");
    }

    #[tokio::test]
    async fn missing_token_file_is_unconfigured() {
        let path = std::env::temp_dir().join(format!("mailchat-no-token-{}.json", uuid::Uuid::new_v4()));
        let mailer = GmailMailer::new(Some("http://127.0.0.1:9".to_string()), path, 10);
        assert!(matches!(mailer.list_mail("").await, Err(MailError::Unconfigured(_))));
        assert!(matches!(
            mailer.send_mail("a@b.com", "", "").await,
            Err(MailError::Unconfigured(_))
        ));
    }
}
