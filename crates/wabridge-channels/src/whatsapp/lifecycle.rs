//! Session lifecycle: initialization, event consumption, reconnection, reset.

use std::{path::Path, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wabridge_core::{error::BridgeError, message::ClientEvent, state::Transition};

use super::WhatsAppSession;

impl WhatsAppSession {
    /// Initialize the automation client.
    ///
    /// Single-flight: a call made while another initialization (or a reset)
    /// holds the lock is skipped.
    pub async fn initialize(&self) -> Result<(), BridgeError> {
        let Ok(_guard) = self.init_lock.try_lock() else {
            info!("WhatsApp initialization already in progress, skipping");
            return Ok(());
        };
        self.initialize_locked().await
    }

    /// Caller must hold `init_lock`.
    async fn initialize_locked(&self) -> Result<(), BridgeError> {
        self.tracker.write().await.begin_initialize();
        info!(client = self.client.name(), "initializing WhatsApp client");
        self.client.initialize().await
    }

    /// Consume client events until the channel closes.
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<ClientEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.handle_event(event).await;
            }
            debug!("WhatsApp event channel closed");
        })
    }

    /// Apply one client event to the tracker and act on the transition.
    pub async fn handle_event(self: &Arc<Self>, event: ClientEvent) {
        let transition = self.tracker.write().await.apply(&event);
        match &event {
            ClientEvent::Qr(qr) => {
                info!("WhatsApp QR code received, scan it at /qr");
                debug!(qr_len = qr.len(), "QR payload");
                match super::generate_qr_terminal(qr) {
                    Ok(art) => debug!("\n{art}"),
                    Err(e) => debug!(error = %e, "terminal QR render failed"),
                }
            }
            ClientEvent::Authenticated => info!("WhatsApp authenticated"),
            ClientEvent::AuthFailure(message) => {
                error!(
                    message = %message,
                    "WhatsApp authentication failed, use /reset to pair again"
                );
            }
            ClientEvent::Ready => info!("WhatsApp client ready"),
            ClientEvent::Disconnected(reason) => {
                warn!(reason = %reason, "WhatsApp client disconnected");
            }
        }
        if transition == Transition::ScheduleReconnect {
            self.schedule_reconnect().await;
        }
    }

    /// Re-initialize after the configured delay. The timer handle is kept so
    /// a reset can cancel it.
    async fn schedule_reconnect(self: &Arc<Self>) {
        let delay = self.config.reconnect_delay();
        info!(delay_secs = delay.as_secs(), "scheduling WhatsApp reconnection");

        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.reconnect().await;
        });

        if let Some(previous) = self.reconnect.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Waits for any initialization in flight, then tears the client down and
    /// starts it again under the same lock.
    async fn reconnect(&self) {
        let _guard = self.init_lock.lock().await;
        if self.tracker.read().await.is_ready() {
            info!("WhatsApp client came back on its own, skipping reconnection");
            self.tracker.write().await.reconnect_finished();
            return;
        }

        info!("reconnecting WhatsApp client");
        if let Err(e) = self.client.destroy().await {
            debug!(error = %e, "destroy before reconnect failed, ignoring");
        }
        if let Err(e) = self.initialize_locked().await {
            error!(error = %e, "WhatsApp reconnection failed, use /reset if it stays down");
        }
        self.tracker.write().await.reconnect_finished();
    }

    /// Wipe the session and pair from scratch.
    ///
    /// Cancels any scheduled reconnection, tears the client down, deletes the
    /// persisted session and cache directories, clears tracked state, then
    /// re-initializes in the background.
    pub async fn reset(self: &Arc<Self>) -> Result<(), BridgeError> {
        if let Some(timer) = self.reconnect.lock().await.take() {
            timer.abort();
        }

        {
            let _guard = self.init_lock.lock().await;
            warn!("resetting WhatsApp session");

            if let Err(e) = self.client.destroy().await {
                warn!(error = %e, "destroy during reset failed, continuing");
            }
            remove_dir_if_exists(&self.config.session_dir).await?;
            remove_dir_if_exists(&self.config.cache_dir).await?;
            self.tracker.write().await.reset();
        }

        let session = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = session.initialize().await {
                error!(error = %e, "WhatsApp initialization after reset failed");
            }
        });
        Ok(())
    }
}

async fn remove_dir_if_exists(dir: &str) -> Result<(), BridgeError> {
    let path = Path::new(dir);
    if !path.exists() {
        return Ok(());
    }
    tokio::fs::remove_dir_all(path).await?;
    info!(dir = %path.display(), "removed WhatsApp session data");
    Ok(())
}
