//! Optional HTTP control surface for a running relay.
//!
//! Read-only routes are open. Routes that list chats or change where
//! matches go require the `x-api-key` header.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use carnage_db::MatchStore;
use carnage_delivery::{ChatInfo, SessionDriver, SessionKeeper, SessionState, WebhookClient};
use serde::{Deserialize, Serialize};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared handles the routes act on.
pub struct ControlState<D> {
    pub session: Option<SessionKeeper<D>>,
    pub webhook: Arc<WebhookClient>,
    pub store: Arc<MatchStore>,
    pub api_key: Option<Arc<str>>,
}

impl<D> Clone for ControlState<D> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            webhook: Arc::clone(&self.webhook),
            store: Arc::clone(&self.store),
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    SessionDisabled,
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid api key".to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::SessionDisabled => (StatusCode::NOT_FOUND, "chat session is disabled".to_string()),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResp {
    pub status: String,
    pub timestamp: String,
    pub session_ready: bool,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResp {
    pub session_enabled: bool,
    pub session_state: String,
    pub session_ready: bool,
    pub chat_id: Option<String>,
    pub webhook_configured: bool,
    pub processed: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrResp {
    pub qr: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatReq {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookReq {
    pub webhook_url: String,
}

pub fn build_router<D: SessionDriver>(state: ControlState<D>) -> Router {
    Router::new()
        .route("/api/health", get(health::<D>))
        .route("/api/status", get(status::<D>))
        .route("/api/session/qr", get(session_qr::<D>))
        .route("/api/session/chats", get(session_chats::<D>))
        .route("/api/session/chat", post(set_session_chat::<D>))
        .route("/api/webhook", post(set_webhook::<D>))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<D: SessionDriver>(
    addr: SocketAddr,
    state: ControlState<D>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Control server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn authorize<D>(state: &ControlState<D>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(given) if given == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

fn session<D>(state: &ControlState<D>) -> Result<&SessionKeeper<D>, ApiError> {
    state.session.as_ref().ok_or(ApiError::SessionDisabled)
}

/// Coarse handshake status shown next to the login code.
fn qr_status(state: &SessionState) -> &'static str {
    match state {
        SessionState::AwaitingHandshake { .. } => "pending",
        SessionState::Ready => "ready",
        SessionState::Uninitialized | SessionState::Restarting => "initializing",
        SessionState::Degraded { .. } | SessionState::Terminated => "degraded",
    }
}

async fn health<D: SessionDriver>(State(state): State<ControlState<D>>) -> Json<HealthResp> {
    Json(HealthResp {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        session_ready: state.session.as_ref().is_some_and(|s| s.is_ready()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn status<D: SessionDriver>(State(state): State<ControlState<D>>) -> Result<Json<StatusResp>, ApiError> {
    let store = Arc::clone(&state.store);
    let stats = tokio::task::spawn_blocking(move || store.stats())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let (session_state, session_ready, chat_id) = match &state.session {
        Some(s) => {
            let snap = s.snapshot();
            (snap.state.label().to_string(), snap.ready, snap.chat_id)
        }
        None => ("disabled".to_string(), false, None),
    };
    Ok(Json(StatusResp {
        session_enabled: state.session.is_some(),
        session_state,
        session_ready,
        chat_id,
        webhook_configured: state.webhook.is_configured(),
        processed: stats.processed,
    }))
}

async fn session_qr<D: SessionDriver>(State(state): State<ControlState<D>>) -> Result<Json<QrResp>, ApiError> {
    let keeper = session(&state)?;
    Ok(Json(QrResp {
        qr: keeper.handshake_code(),
        status: qr_status(&keeper.state()).to_string(),
    }))
}

async fn session_chats<D: SessionDriver>(
    State(state): State<ControlState<D>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatInfo>>, ApiError> {
    authorize(&state, &headers)?;
    let chats = session(&state)?
        .list_chats()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(chats))
}

async fn set_session_chat<D: SessionDriver>(
    State(state): State<ControlState<D>>,
    headers: HeaderMap,
    Json(req): Json<ChatReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let keeper = session(&state)?;
    let chat_id = req.chat_id.trim();
    if chat_id.is_empty() {
        return Err(ApiError::BadRequest("chat_id is required".to_string()));
    }
    keeper.set_chat_id(Some(chat_id.to_string()));
    Ok(Json(serde_json::json!({ "ok": true, "chat_id": chat_id })))
}

async fn set_webhook<D: SessionDriver>(
    State(state): State<ControlState<D>>,
    headers: HeaderMap,
    Json(req): Json<WebhookReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let url = req.webhook_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::BadRequest("webhook_url must be an http(s) URL".to_string()));
    }
    state.webhook.set_url(Some(url.to_string()));
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_status_groups_states() {
        assert_eq!(qr_status(&SessionState::AwaitingHandshake { code: None }), "pending");
        assert_eq!(qr_status(&SessionState::Ready), "ready");
        assert_eq!(qr_status(&SessionState::Restarting), "initializing");
        assert_eq!(
            qr_status(&SessionState::Degraded {
                reason: "timeout".into()
            }),
            "degraded"
        );
    }
}
