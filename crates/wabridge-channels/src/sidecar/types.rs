//! Wire types for the automation sidecar WebSocket protocol.

use serde::{Deserialize, Serialize};
use wabridge_core::message::ClientEvent;

/// Commands sent from Rust to the sidecar. Every command carries a request id
/// echoed back in the matching [`SidecarMessage::Result`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarCommand {
    Initialize {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "authDir")]
        auth_dir: String,
        #[serde(rename = "cacheDir")]
        cache_dir: String,
        #[serde(rename = "browserPath", skip_serializing_if = "Option::is_none")]
        browser_path: Option<String>,
        headless: bool,
    },
    Destroy {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    SendMessage {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "chatId")]
        chat_id: String,
        body: String,
    },
    ListChats {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    CreateGroup {
        #[serde(rename = "requestId")]
        request_id: String,
        title: String,
        participants: Vec<String>,
    },
}

impl SidecarCommand {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Initialize { request_id, .. }
            | Self::Destroy { request_id }
            | Self::SendMessage { request_id, .. }
            | Self::ListChats { request_id }
            | Self::CreateGroup { request_id, .. } => request_id,
        }
    }

    /// Command name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Destroy { .. } => "destroy",
            Self::SendMessage { .. } => "send_message",
            Self::ListChats { .. } => "list_chats",
            Self::CreateGroup { .. } => "create_group",
        }
    }
}

/// Messages received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        qr: String,
    },
    Authenticated,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Ready,
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Result {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(default)]
        data: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl SidecarMessage {
    /// Lifecycle events map onto [`ClientEvent`]; results do not.
    pub fn into_event(self) -> Result<ClientEvent, Self> {
        match self {
            Self::Qr { qr } => Ok(ClientEvent::Qr(qr)),
            Self::Authenticated => Ok(ClientEvent::Authenticated),
            Self::AuthFailure { message } => Ok(ClientEvent::AuthFailure(message)),
            Self::Ready => Ok(ClientEvent::Ready),
            Self::Disconnected { reason } => Ok(ClientEvent::Disconnected(reason)),
            other @ Self::Result { .. } => Err(other),
        }
    }
}

/// `data` of a successful `create_group` result.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<String>>,
}
