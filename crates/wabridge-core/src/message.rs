use serde::{Deserialize, Serialize};

/// Lifecycle signal pushed by the automation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A new login QR payload is available for scanning.
    Qr(String),
    /// Credentials were accepted; the client is loading.
    Authenticated,
    /// Credentials were rejected.
    AuthFailure(String),
    /// The session is usable.
    Ready,
    /// The session dropped, with the reason reported by the client.
    Disconnected(String),
}

impl ClientEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Authenticated => "authenticated",
            Self::AuthFailure(_) => "auth_failure",
            Self::Ready => "ready",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// Receipt for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Delivery id assigned by WhatsApp.
    pub id: String,
}

/// A conversation as listed by the automation client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
}

/// A WhatsApp group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group chat id (`<id>@g.us`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Participant chat ids.
    #[serde(default)]
    pub participants: Vec<String>,
}
