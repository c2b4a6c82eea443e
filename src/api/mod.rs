//! HTTP API: the bridge's only public surface.
//!
//! Read endpoints report session state; mutating endpoints send messages,
//! look up and create groups, and reset the session. Mutations always need
//! the `x-api-key` header when a key is configured.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use wabridge_channels::whatsapp::{qr_data_uri, WhatsAppSession};
use wabridge_core::{config::ApiConfig, error::BridgeError, state::SessionSnapshot};

use crate::webhook::GroupWebhook;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    session: Arc<WhatsAppSession>,
    api_key: Option<String>,
    protect_reads: bool,
    port: u16,
    webhook: Option<GroupWebhook>,
}

impl ApiState {
    pub fn new(
        config: &ApiConfig,
        session: Arc<WhatsAppSession>,
        webhook: Option<GroupWebhook>,
    ) -> Self {
        let api_key = if config.api_key.is_empty() {
            None
        } else {
            Some(config.api_key.clone())
        };
        Self {
            session,
            api_key,
            protect_reads: config.protect_reads,
            port: config.port,
            webhook,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncGroupRequest {
    #[serde(default)]
    group_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupRequest {
    #[serde(default)]
    group_title: String,
    #[serde(default)]
    participants: Vec<String>,
    #[serde(default)]
    initial_message: Option<String>,
}

/// Constant-time string comparison to prevent timing attacks on API key validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check the `x-api-key` header. Returns `None` if authorized.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    match provided {
        Some(value) if constant_time_eq(value, key) => None,
        _ => Some(error_response(BridgeError::Unauthorized)),
    }
}

/// Auth for read endpoints, only enforced with `api.protect_reads`.
fn check_read_auth(headers: &HeaderMap, state: &ApiState) -> Option<ApiError> {
    if state.protect_reads {
        check_auth(headers, &state.api_key)
    } else {
        None
    }
}

/// Map a [`BridgeError`] to its HTTP status and `{error}` body.
fn error_response(e: BridgeError) -> ApiError {
    let status = match &e {
        BridgeError::Validation(_) | BridgeError::InvalidDestination(_) => StatusCode::BAD_REQUEST,
        BridgeError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::Unauthorized => StatusCode::UNAUTHORIZED,
        BridgeError::Client(_)
        | BridgeError::Render(_)
        | BridgeError::Config(_)
        | BridgeError::Io(_)
        | BridgeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
        error!("request failed: {e}");
    }
    (status, Json(json!({"error": e.to_string()})))
}

fn bad_body(e: JsonRejection) -> ApiError {
    error_response(BridgeError::Validation(format!("invalid request: {e}")))
}

/// `GET /`: plain-text liveness string.
async fn root() -> &'static str {
    "WhatsApp bridge is running"
}

/// `GET /ping`: liveness plus the readiness flag, never gated.
async fn ping(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "alive",
        "port": state.port,
        "ready": state.session.is_ready().await,
    }))
}

/// Snapshot with 200 when ready, 503 otherwise.
async fn readiness(
    headers: &HeaderMap,
    state: &ApiState,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    if let Some(err) = check_read_auth(headers, state) {
        return Err(err);
    }
    let snapshot = state.session.snapshot().await;
    let code = if snapshot.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((code, Json(snapshot)))
}

/// `GET /status`
async fn status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    readiness(&headers, &state).await
}

/// `GET /health`
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    readiness(&headers, &state).await
}

fn page(body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>WhatsApp pairing</title></head>\
         <body style=\"font-family:sans-serif;text-align:center\">{body}</body></html>"
    ))
}

/// `GET /qr`: pairing page with the pending QR code.
async fn qr(headers: HeaderMap, State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    if let Some(err) = check_read_auth(&headers, &state) {
        return Err(err);
    }
    if state.session.is_ready().await {
        return Ok(page("<p>WhatsApp is already connected.</p>"));
    }
    let Some(payload) = state.session.pending_qr().await else {
        return Ok(page(
            "<p>Waiting for a QR code. Refresh in a few seconds.</p>",
        ));
    };
    let uri = qr_data_uri(&payload).map_err(error_response)?;
    Ok(page(&format!(
        "<h2>Scan with WhatsApp</h2><img src=\"{uri}\" alt=\"WhatsApp QR code\">\
         <p>Settings &gt; Linked devices &gt; Link a device</p>"
    )))
}

/// `POST /send`: `{to, message}`.
async fn send(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let Json(req) = body.map_err(bad_body)?;

    let sent = state
        .session
        .send_text(&req.to, &req.message)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "status": "ok",
        "to": req.to,
        "message": req.message,
        "id": sent.id,
    })))
}

/// `POST /sync-group`: `{groupName}`, returns the matching group's id.
async fn sync_group(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<SyncGroupRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let Json(req) = body.map_err(bad_body)?;

    let group = state
        .session
        .find_group(&req.group_name)
        .await
        .map_err(error_response)?;

    if let Some(hook) = &state.webhook {
        hook.push_in_background("sync", group.name.clone(), group.id.clone());
    }

    Ok(Json(json!({
        "status": "ok",
        "id": group.id,
        "name": group.name,
    })))
}

/// `POST /create-group`: `{groupTitle, participants[], initialMessage?}`.
async fn create_group(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let Json(req) = body.map_err(bad_body)?;

    let group = state
        .session
        .create_group(
            &req.group_title,
            &req.participants,
            req.initial_message.as_deref(),
        )
        .await
        .map_err(error_response)?;

    if let Some(hook) = &state.webhook {
        hook.push_in_background("create", group.name.clone(), group.id.clone());
    }

    Ok(Json(json!({
        "status": "ok",
        "id": group.id,
        "name": group.name,
        "participants": group.participants,
    })))
}

/// `POST /reset`: wipe the session and start pairing again.
async fn reset(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    warn!("session reset requested over HTTP");
    state.session.reset().await.map_err(error_response)?;
    Ok(Json(json!({
        "status": "ok",
        "message": "session reset, scan the new QR code at /qr",
    })))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/qr", get(qr))
        .route("/send", post(send))
        .route("/sync-group", post(sync_group))
        .route("/create-group", post(create_group))
        .route("/reset", post(reset))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: ApiState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("API server failed to bind to {addr}: {e}"))?;
    info!("API server listening on {addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
