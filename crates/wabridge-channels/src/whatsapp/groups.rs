//! Group lookup and creation.

use tracing::{info, warn};
use wabridge_core::{error::BridgeError, message::GroupInfo};

use super::{send::retry_send, WhatsAppSession};

/// Participants a new group needs besides the session owner.
pub const MIN_PARTICIPANTS: usize = 2;

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl WhatsAppSession {
    /// Find an existing group by name (trimmed, case-insensitive, exact).
    pub async fn find_group(&self, name: &str) -> Result<GroupInfo, BridgeError> {
        if name.trim().is_empty() {
            return Err(BridgeError::Validation("missing parameter: groupName".into()));
        }
        self.ensure_ready().await?;

        let chats = self.client.list_chats().await?;
        let found = chats
            .into_iter()
            .filter(|chat| chat.is_group)
            .find(|chat| same_name(&chat.name, name))
            .ok_or_else(|| BridgeError::NotFound(format!("group '{}' not found", name.trim())))?;

        info!(group_id = %found.id, name = %found.name, "WhatsApp group found");
        Ok(GroupInfo {
            id: found.id,
            name: found.name,
            participants: Vec::new(),
        })
    }

    /// Create a group and optionally post a first message into it.
    ///
    /// Input is fully validated before readiness is checked. A failing seed
    /// message is logged, the group is still returned.
    pub async fn create_group(
        &self,
        title: &str,
        participants: &[String],
        initial_message: Option<&str>,
    ) -> Result<GroupInfo, BridgeError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BridgeError::Validation("missing parameter: groupTitle".into()));
        }

        let mut ids: Vec<String> = Vec::with_capacity(participants.len());
        for raw in participants {
            let id = self.config.normalization.normalize_participant(raw)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.len() < MIN_PARTICIPANTS {
            return Err(BridgeError::Validation(format!(
                "at least {MIN_PARTICIPANTS} distinct participants are required, got {}",
                ids.len()
            )));
        }

        self.ensure_ready().await?;

        let group = self.client.create_group(title, &ids).await?;
        info!(
            group_id = %group.id,
            name = %group.name,
            participants = group.participants.len(),
            "WhatsApp group created"
        );

        if let Some(text) = initial_message.filter(|t| !t.trim().is_empty()) {
            if let Err(e) =
                retry_send(self.client.as_ref(), &self.config.retry, &group.id, text).await
            {
                warn!(group_id = %group.id, error = %e, "initial group message failed");
            }
        }

        Ok(group)
    }
}
