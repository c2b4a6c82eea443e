//! WebSocket client for the browser-automation sidecar.
//!
//! The sidecar runs the WhatsApp Web client. Commands go out tagged with a
//! request id; replies come back as `result` messages carrying the same id,
//! interleaved with unsolicited lifecycle events.

pub mod types;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use wabridge_core::{
    config::WhatsAppConfig,
    error::BridgeError,
    message::{ChatSummary, ClientEvent, GroupInfo, SentMessage},
    traits::AutomationClient,
};

use types::{CreatedGroup, SidecarCommand, SidecarMessage};

/// Reason reported when the WebSocket to the sidecar drops.
pub const CONNECTION_LOST: &str = "sidecar connection closed";

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

type Reply = Result<Option<serde_json::Value>, String>;
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>;

type ConnectedFlag = Arc<RwLock<bool>>;

/// Live socket: the writer task's inbox plus the shared connection flag.
struct Connection {
    tx: mpsc::Sender<SidecarCommand>,
    connected: ConnectedFlag,
}

impl Connection {
    async fn is_open(&self) -> bool {
        *self.connected.read().await && !self.tx.is_closed()
    }
}

/// [`AutomationClient`] backed by the sidecar WebSocket.
///
/// Connects lazily on the first command and again after the socket drops.
pub struct SidecarClient {
    config: WhatsAppConfig,
    events: mpsc::Sender<ClientEvent>,
    conn: Mutex<Option<Connection>>,
    pending: Pending,
}

impl SidecarClient {
    pub fn new(config: WhatsAppConfig, events: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            config,
            events,
            conn: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Return the writer inbox, connecting first if needed.
    async fn sender(&self) -> Result<(mpsc::Sender<SidecarCommand>, ConnectedFlag), BridgeError> {
        let mut conn = self.conn.lock().await;
        if let Some(c) = conn.as_ref() {
            if c.is_open().await {
                return Ok((c.tx.clone(), Arc::clone(&c.connected)));
            }
        }
        let fresh = self.connect_with_retry().await?;
        let handles = (fresh.tx.clone(), Arc::clone(&fresh.connected));
        *conn = Some(fresh);
        Ok(handles)
    }

    async fn connect_with_retry(&self) -> Result<Connection, BridgeError> {
        let mut attempt = 0;
        loop {
            match self.connect().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    attempt += 1;
                    if attempt >= CONNECT_ATTEMPTS {
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        max_attempts = CONNECT_ATTEMPTS,
                        error = %e,
                        "failed to connect to sidecar, retrying..."
                    );
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Open the socket and spawn the reader and writer tasks.
    async fn connect(&self) -> Result<Connection, BridgeError> {
        let url = &self.config.sidecar_url;
        info!(url = %url, "connecting to WhatsApp sidecar");

        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            BridgeError::Client(format!("failed to connect to sidecar at {url}: {e}"))
        })?;
        info!("connected to WhatsApp sidecar");

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<SidecarCommand>(32);

        let connected = Arc::new(RwLock::new(true));
        let connected_reader = Arc::clone(&connected);
        let connected_writer = Arc::clone(&connected);
        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SidecarMessage>(&text) {
                            Ok(msg) => route(msg, &pending, &events).await,
                            Err(e) => {
                                warn!(error = %e, "failed to parse sidecar message");
                                debug!(text = %text.as_str(), "unparsed sidecar frame");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("sidecar connection closed");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }

            // Mark closed first so no new waiter lands in the drained map.
            *connected_reader.write().await = false;
            // Dropping the senders wakes every waiter with a closed channel.
            let failed = {
                let mut map = pending.lock().await;
                let n = map.len();
                map.clear();
                n
            };
            if failed > 0 {
                warn!(failed, "failing pending sidecar requests");
            }
            let _ = events
                .send(ClientEvent::Disconnected(CONNECTION_LOST.to_string()))
                .await;
        });

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match serde_json::to_string(&cmd) {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            error!(
                                error = %e,
                                kind = cmd.kind(),
                                "failed to send command to sidecar"
                            );
                            break;
                        }
                        debug!(
                            kind = cmd.kind(),
                            request_id = cmd.request_id(),
                            "sent command to sidecar"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "failed to serialize sidecar command");
                    }
                }
            }

            *connected_writer.write().await = false;
        });

        Ok(Connection { tx, connected })
    }

    /// Send a command and wait for its `result`.
    async fn request(
        &self,
        cmd: SidecarCommand,
        timeout: Duration,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        let id = cmd.request_id().to_string();
        let kind = cmd.kind();
        let (tx, connected) = self.sender().await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), reply_tx);
        // The reader clears the flag before draining, so a waiter added after
        // the drain is caught here.
        if !*connected.read().await {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::Client(CONNECTION_LOST.into()));
        }

        if tx.send(cmd).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::Client(CONNECTION_LOST.into()));
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => {
                reply.map_err(|e| BridgeError::Client(format!("{kind} failed: {e}")))
            }
            Ok(Err(_)) => Err(BridgeError::Client(CONNECTION_LOST.into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(BridgeError::Client(format!(
                    "{kind} timed out after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }
}

/// Dispatch one inbound message: events to the event channel, results to
/// their waiting request.
async fn route(msg: SidecarMessage, pending: &Pending, events: &mpsc::Sender<ClientEvent>) {
    match msg.into_event() {
        Ok(event) => {
            debug!(kind = event.kind(), "sidecar event");
            if events.send(event).await.is_err() {
                warn!("event channel closed, dropping sidecar event");
            }
        }
        Err(SidecarMessage::Result {
            request_id,
            success,
            data,
            error,
        }) => {
            let Some(waiter) = pending.lock().await.remove(&request_id) else {
                debug!(request_id = %request_id, "result for unknown or expired request");
                return;
            };
            let reply = if success {
                Ok(data)
            } else {
                Err(error.unwrap_or_else(|| "unknown sidecar error".into()))
            };
            let _ = waiter.send(reply);
        }
        Err(_) => {}
    }
}

fn decode<T: DeserializeOwned>(
    data: Option<serde_json::Value>,
    kind: &str,
) -> Result<T, BridgeError> {
    let data = data.ok_or_else(|| BridgeError::Client(format!("{kind} returned no data")))?;
    serde_json::from_value(data)
        .map_err(|e| BridgeError::Client(format!("unexpected {kind} result: {e}")))
}

#[async_trait]
impl AutomationClient for SidecarClient {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn initialize(&self) -> Result<(), BridgeError> {
        let cmd = SidecarCommand::Initialize {
            request_id: Self::request_id(),
            client_id: self.config.client_id.clone(),
            auth_dir: self.config.session_dir.clone(),
            cache_dir: self.config.cache_dir.clone(),
            browser_path: self.config.browser_path.clone(),
            headless: self.config.headless,
        };
        self.request(cmd, self.config.init_timeout()).await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        let cmd = SidecarCommand::Destroy {
            request_id: Self::request_id(),
        };
        self.request(cmd, self.config.request_timeout()).await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> Result<SentMessage, BridgeError> {
        let cmd = SidecarCommand::SendMessage {
            request_id: Self::request_id(),
            chat_id: chat_id.to_string(),
            body: body.to_string(),
        };
        let data = self.request(cmd, self.config.request_timeout()).await?;
        decode(data, "send_message")
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, BridgeError> {
        let cmd = SidecarCommand::ListChats {
            request_id: Self::request_id(),
        };
        let data = self.request(cmd, self.config.request_timeout()).await?;
        decode(data, "list_chats")
    }

    async fn create_group(
        &self,
        title: &str,
        participants: &[String],
    ) -> Result<GroupInfo, BridgeError> {
        let cmd = SidecarCommand::CreateGroup {
            request_id: Self::request_id(),
            title: title.to_string(),
            participants: participants.to_vec(),
        };
        let data = self.request(cmd, self.config.request_timeout()).await?;
        let created: CreatedGroup = decode(data, "create_group")?;
        Ok(GroupInfo {
            id: created.id,
            name: created.name.unwrap_or_else(|| title.to_string()),
            participants: created
                .participants
                .unwrap_or_else(|| participants.to_vec()),
        })
    }
}
