//! Group-id webhook: tells an external recorder (e.g. a spreadsheet script)
//! which WhatsApp group id belongs to which name.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use wabridge_core::{config::WebhookConfig, error::BridgeError};

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupRecord<'a> {
    token: &'a str,
    action: &'a str,
    group_name: &'a str,
    group_id: &'a str,
}

/// Client for the configured group-id webhook.
#[derive(Clone)]
pub struct GroupWebhook {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl GroupWebhook {
    /// `Ok(None)` when no webhook URL is configured.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>, BridgeError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Some(Self {
            http,
            url: config.url.trim().to_string(),
            token: config.token.clone(),
        }))
    }

    /// POST one group record.
    pub async fn push(
        &self,
        action: &str,
        group_name: &str,
        group_id: &str,
    ) -> Result<(), BridgeError> {
        let record = GroupRecord {
            token: &self.token,
            action,
            group_name,
            group_id,
        };
        let mut req = self.http.post(&self.url).json(&record);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BridgeError::Client(format!("webhook request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BridgeError::Client(format!("webhook returned {status}")));
        }
        info!(action, group_id, "group id pushed to webhook");
        Ok(())
    }

    /// Fire-and-forget [`push`](Self::push); failures are only logged.
    pub fn push_in_background(&self, action: &'static str, group_name: String, group_id: String) {
        let hook = self.clone();
        tokio::spawn(async move {
            if let Err(e) = hook.push(action, &group_name, &group_id).await {
                warn!(action, group_id = %group_id, error = %e, "group webhook failed");
            }
        });
    }
}
