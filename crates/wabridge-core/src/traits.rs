use crate::{
    error::BridgeError,
    message::{ChatSummary, GroupInfo, SentMessage},
};
use async_trait::async_trait;

/// Automation client trait.
///
/// The browser-driven WhatsApp Web client lives outside this process. An
/// implementation forwards these calls to it and pushes lifecycle signals
/// ([`ClientEvent`](crate::message::ClientEvent)) into the event channel it
/// was constructed with.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Start (or restart) the WhatsApp Web session.
    ///
    /// Returns once the client accepted the request; readiness arrives later
    /// as an event.
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Tear the current session down.
    async fn destroy(&self) -> Result<(), BridgeError>;

    /// Send a text message to a chat id.
    async fn send_message(&self, chat_id: &str, body: &str) -> Result<SentMessage, BridgeError>;

    /// List every conversation known to the session.
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, BridgeError>;

    /// Create a group with the given participant chat ids.
    async fn create_group(
        &self,
        title: &str,
        participants: &[String],
    ) -> Result<GroupInfo, BridgeError>;
}
