//! Gateway HTTP server (single port).

use crate::chat::{ChatFallback, ChatOutcome};
use crate::command::{self, ParsedCommand};
use crate::config::{self, Config};
use crate::dispatch::{ActionError, ActionResult, Dispatcher};
use crate::envelope::Envelope;
use crate::gateway::protocol::{ChatRequest, DeleteRequest, ListQuery, SendRequest};
use crate::llm::ProviderRegistry;
use crate::mail;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

const MESSAGE_REQUIRED: &str = "Message is required.";

/// Shared state for the gateway. Every request only reads it.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub chat: Arc<ChatFallback>,
}

impl GatewayState {
    pub fn new(config: Config, dispatcher: Dispatcher, chat: ChatFallback) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            chat: Arc::new(chat),
        }
    }

    /// Build the mail backend and chat providers named by the config (env overrides applied).
    pub fn from_config(config: Config) -> Self {
        let mail = mail::backend_from_config(&config);
        match mail.as_ref() {
            Some(m) => log::info!("gateway: mail backend {}", m.name()),
            None => log::info!("gateway: no mail backend configured"),
        }
        let dispatcher = Dispatcher::new(mail);
        let chat = ChatFallback::new(
            ProviderRegistry::from_config(&config),
            config.chat.default_provider,
        );
        Self::new(config, dispatcher, chat)
    }
}

/// Routes for the gateway API.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/chat", post(chat_http))
        .route("/api/email/send", post(send_email_http))
        .route("/api/email/delete", post(delete_email_http))
        .route("/api/email/list", get(list_emails_http))
        .with_state(state)
}

pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        log::warn!(
            "gateway: binding to {} exposes unauthenticated email actions beyond this host",
            bind
        );
    }
    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let state = GatewayState::from_config(config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// HTTP status for a dispatch result.
fn action_status(result: &ActionResult) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(ActionError::Validation(_)) => StatusCode::BAD_REQUEST,
        Err(ActionError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(ActionError::Provider { .. }) => StatusCode::BAD_GATEWAY,
        Err(ActionError::Unconfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// HTTP status for a chat outcome.
fn chat_status(outcome: &ChatOutcome) -> StatusCode {
    match outcome {
        ChatOutcome::Reply { .. } => StatusCode::OK,
        ChatOutcome::Failed { kind, .. } => match *kind {
            "missing_credentials" => StatusCode::BAD_REQUEST,
            "configuration_error" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

/// Bad JSON body: still answer with an envelope the chat surface can render.
fn rejection_response(rejection: JsonRejection) -> (StatusCode, Json<Envelope>) {
    let envelope = Envelope {
        error: Some("validation_error".to_string()),
        detail: Some(rejection.body_text()),
        ..Envelope::default()
    };
    (rejection.status(), Json(envelope))
}

async fn dispatch_command(state: &GatewayState, command: ParsedCommand) -> (StatusCode, Json<Envelope>) {
    let result = state.dispatcher.dispatch(&command).await;
    if let Err(ref e) = result {
        log::debug!("gateway: {} -> {}", command.intent(), e.kind());
    }
    let envelope = Envelope::from_action(&result).with_action(command);
    (action_status(&result), Json(envelope))
}

/// Parse one chat message and either dispatch the email command or fall back to chat.
pub(crate) async fn handle_chat(state: &GatewayState, request: ChatRequest) -> (StatusCode, Json<Envelope>) {
    let message = request.message.trim();
    if message.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(Envelope::detail(MESSAGE_REQUIRED)));
    }
    let provider = state.chat.resolve_provider(request.provider.as_deref());
    match command::parse_for(message, provider) {
        ParsedCommand::PlainChat { text, provider } => {
            let outcome = state.chat.chat(&text, provider).await;
            let status = chat_status(&outcome);
            log::debug!("gateway: chat via {} -> {}", outcome.provider(), status);
            (status, Json(Envelope::from_chat(&outcome)))
        }
        command => dispatch_command(state, command).await,
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "defaultProvider": state.chat.default_provider(),
    }))
}

/// POST /api/chat
async fn chat_http(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<Envelope>) {
    match payload {
        Ok(Json(request)) => handle_chat(&state, request).await,
        Err(rejection) => rejection_response(rejection),
    }
}

/// POST /api/email/send
async fn send_email_http(
    State(state): State<GatewayState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> (StatusCode, Json<Envelope>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let command = ParsedCommand::SendEmail {
        recipient: request.to.trim().to_string(),
        subject: request.subject,
        body: request.body,
    };
    dispatch_command(&state, command).await
}

/// POST /api/email/delete
async fn delete_email_http(
    State(state): State<GatewayState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> (StatusCode, Json<Envelope>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let command = ParsedCommand::DeleteEmail {
        message_id: request.message_id.trim().to_string(),
    };
    dispatch_command(&state, command).await
}

/// GET /api/email/list?query=...
async fn list_emails_http(
    State(state): State<GatewayState>,
    Query(params): Query<ListQuery>,
) -> (StatusCode, Json<Envelope>) {
    let command = ParsedCommand::ListEmails {
        query: params.query.unwrap_or_default().trim().to_string(),
    };
    dispatch_command(&state, command).await
}
