//! Text message delivery with retry.

use tracing::{error, info, warn};
use wabridge_core::{
    error::BridgeError,
    message::SentMessage,
    retry::RetryPolicy,
    traits::AutomationClient,
};

use super::WhatsAppSession;

impl WhatsAppSession {
    /// Send `message` to `to` (phone number or chat id).
    ///
    /// Checks run in order: both fields present, destination normalizes,
    /// session ready. Only then is the client touched.
    pub async fn send_text(&self, to: &str, message: &str) -> Result<SentMessage, BridgeError> {
        if to.is_empty() || message.is_empty() {
            return Err(BridgeError::Validation(
                "missing parameters: to, message".into(),
            ));
        }
        let chat_id = self.config.normalization.normalize(to)?;
        self.ensure_ready().await?;

        let sent = retry_send(self.client.as_ref(), &self.config.retry, &chat_id, message).await?;
        info!(chat_id = %chat_id, id = %sent.id, "WhatsApp message sent");
        Ok(sent)
    }
}

/// Send with retries on transport errors, pausing per `policy` between tries.
pub(super) async fn retry_send(
    client: &dyn AutomationClient,
    policy: &RetryPolicy,
    chat_id: &str,
    body: &str,
) -> Result<SentMessage, BridgeError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match client.send_message(chat_id, body).await {
            Ok(sent) => return Ok(sent),
            Err(e) if e.is_transient() => match policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "WhatsApp send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(attempt, error = %e, "WhatsApp send failed, giving up");
                    return Err(e);
                }
            },
            Err(e) => return Err(e),
        }
    }
}
