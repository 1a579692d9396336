//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.mailchat/config.json`) and environment.
//! Credentials are never required at startup; a missing key only degrades the request that needs it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::Provider;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat provider settings (OpenAI, Gemini).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Mail backend settings.
    #[serde(default)]
    pub mail: MailConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Host a local client should connect to for a gateway bound to `bind`. Wildcard binds map to
/// loopback and IPv6 literals are bracketed for use in a URL.
pub fn client_host(bind: &str) -> String {
    match bind.trim() {
        "" | "0.0.0.0" => "127.0.0.1".to_string(),
        "::" | "[::]" => "[::1]".to_string(),
        b if b.contains(':') && !b.starts_with('[') => format!("[{}]", b),
        b => b.to_string(),
    }
}

/// Chat completion settings shared by all providers plus per-provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Provider used when a request names none or an unknown one.
    #[serde(default)]
    pub default_provider: Provider,

    /// Sampling temperature sent with every completion (default 0.3).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub openai: ProviderSettings,

    #[serde(default)]
    pub gemini: ProviderSettings,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: Provider::default(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            openai: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
        }
    }
}

/// Credentials and endpoint for one chat provider. All optional in the file; env may fill them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// API key. Overridden by OPENAI_API_KEY / GEMINI_API_KEY when set.
    pub api_key: Option<String>,
    /// Model name. Overridden by OPENAI_MODEL / GEMINI_MODEL when set.
    pub model: Option<String>,
    /// API base URL (e.g. for a proxy or a local mock).
    pub base_url: Option<String>,
}

/// Which mail backend serves send/list/delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackendKind {
    /// Gmail REST API with an OAuth access token from a token file.
    #[default]
    Gmail,
    /// In-process mailbox (nothing leaves the process).
    Memory,
    /// No mail backend; list degrades to a warning, send/delete fail.
    None,
}

/// Mail backend config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    #[serde(default)]
    pub backend: MailBackendKind,

    #[serde(default)]
    pub gmail: GmailConfig,
}

/// Gmail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailConfig {
    /// Token file written by the OAuth installed-app flow. Overridden by GOOGLE_OAUTH_TOKEN_FILE.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// Gmail API base URL (default https://gmail.googleapis.com/gmail/v1).
    pub base_url: Option<String>,

    /// Maximum messages returned by list (default 10).
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_max_results() -> u32 {
    10
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            base_url: None,
            max_results: default_max_results(),
        }
    }
}

/// Non-empty, trimmed value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env value wins over the configured one; blanks on either side count as unset.
fn env_or_config(name: &str, configured: Option<&String>) -> Option<String> {
    env_value(name).or_else(|| {
        configured
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve provider settings: env `<PREFIX>_API_KEY` and `<PREFIX>_MODEL` override config.
pub fn resolve_provider_settings(config: &Config, provider: Provider) -> ProviderSettings {
    let (settings, prefix) = match provider {
        Provider::OpenAi => (&config.chat.openai, "OPENAI"),
        Provider::Gemini => (&config.chat.gemini, "GEMINI"),
    };
    ProviderSettings {
        api_key: env_or_config(&format!("{}_API_KEY", prefix), settings.api_key.as_ref()),
        model: env_or_config(&format!("{}_MODEL", prefix), settings.model.as_ref()),
        base_url: settings
            .base_url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    }
}

/// Resolve the Gmail token file: env GOOGLE_OAUTH_TOKEN_FILE overrides config.
pub fn resolve_token_file(config: &Config) -> PathBuf {
    env_value("GOOGLE_OAUTH_TOKEN_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.mail.gmail.token_file.clone())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MAILCHAT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".mailchat").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, else the default path (or MAILCHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_host_maps_wildcard_binds_to_loopback() {
        assert_eq!(client_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(client_host(" :: "), "[::1]");
        assert_eq!(client_host("::1"), "[::1]");
        assert_eq!(client_host("127.0.0.1"), "127.0.0.1");
        assert_eq!(client_host("mail.internal"), "mail.internal");
    }

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 8000);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.chat.default_provider, Provider::OpenAi);
        assert!((config.chat.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.chat.timeout_secs, 30);
        assert_eq!(config.mail.backend, MailBackendKind::Gmail);
        assert_eq!(config.mail.gmail.token_file, PathBuf::from("token.json"));
        assert_eq!(config.mail.gmail.max_results, 10);
    }

    #[test]
    fn camel_case_keys_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 9100 },
                "chat": {
                    "defaultProvider": "gemini",
                    "gemini": { "apiKey": "k", "model": "gemini-1.5-flash", "baseUrl": "http://x/" }
                },
                "mail": { "backend": "memory", "gmail": { "maxResults": 3 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.chat.default_provider, Provider::Gemini);
        assert_eq!(config.chat.gemini.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.mail.backend, MailBackendKind::Memory);
        assert_eq!(config.mail.gmail.max_results, 3);
    }

    #[test]
    fn blank_config_values_count_as_unset() {
        assert_eq!(
            env_or_config("MAILCHAT_TEST_UNSET_VARIABLE", Some(&"  ".to_string())),
            None
        );
        assert_eq!(
            env_or_config("MAILCHAT_TEST_UNSET_VARIABLE", Some(&" m ".to_string())),
            Some("m".to_string())
        );
    }

    #[test]
    fn loopback_binds() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }

    #[test]
    fn missing_config_file_is_default() {
        let path = std::env::temp_dir().join(format!("mailchat-missing-{}.json", uuid::Uuid::new_v4()));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 8000);
    }
}
