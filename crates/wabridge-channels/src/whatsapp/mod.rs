//! WhatsApp session service.
//!
//! Owns the automation client and the session tracker. Events pushed by the
//! client drive the tracker; endpoint operations (send, group lookup and
//! creation, reset) read it to decide readiness before touching the client.

mod groups;
mod lifecycle;
mod qr;
mod send;


pub use qr::{generate_qr_image, generate_qr_terminal, qr_data_uri};

use std::sync::Arc;

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use wabridge_core::{
    config::WhatsAppConfig,
    error::BridgeError,
    state::{SessionSnapshot, SessionTracker},
    traits::AutomationClient,
};

/// Shared WhatsApp session: one automation client, one tracked state.
pub struct WhatsAppSession {
    pub(super) client: Arc<dyn AutomationClient>,
    pub(super) config: WhatsAppConfig,
    pub(super) tracker: RwLock<SessionTracker>,
    /// Serializes initialize and reset.
    pub(super) init_lock: Mutex<()>,
    /// Pending reconnection timer, aborted by reset.
    pub(super) reconnect: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppSession {
    pub fn new(client: Arc<dyn AutomationClient>, config: WhatsAppConfig) -> Self {
        Self {
            client,
            config,
            tracker: RwLock::new(SessionTracker::new()),
            init_lock: Mutex::new(()),
            reconnect: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    pub async fn is_ready(&self) -> bool {
        self.tracker.read().await.is_ready()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.tracker.read().await.snapshot()
    }

    /// QR payload waiting to be scanned, if any.
    pub async fn pending_qr(&self) -> Option<String> {
        self.tracker.read().await.last_qr().map(str::to_string)
    }

    pub(super) async fn ensure_ready(&self) -> Result<(), BridgeError> {
        if self.is_ready().await {
            Ok(())
        } else {
            Err(BridgeError::NotReady)
        }
    }
}
