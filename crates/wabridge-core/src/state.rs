//! Session state tracker: the readiness state machine.
//!
//! Pure bookkeeping: no I/O, no timers. Transitions return a [`Transition`]
//! telling the owner what side effect (if any) to perform.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::ClientEvent;

/// Where the WhatsApp session is in its lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Initializing,
    QrPending,
    Authenticated,
    Ready,
    Disconnected,
    Reset,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::QrPending => "qr_pending",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Reset => "reset",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Re-initialize the client after the reconnect delay.
    ScheduleReconnect,
}

/// Tracked session state.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    state: SessionState,
    ready: bool,
    last_qr: Option<String>,
    last_disconnect_reason: Option<String>,
    last_auth_failure: Option<String>,
    reconnect_scheduled: bool,
    updated_at: DateTime<Utc>,
}

/// Serializable view of the tracker for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub ready: bool,
    pub has_qr: bool,
    pub last_disconnect_reason: Option<String>,
    pub last_auth_failure: Option<String>,
    pub reconnect_scheduled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            state: SessionState::Initializing,
            ready: false,
            last_qr: None,
            last_disconnect_reason: None,
            last_auth_failure: None,
            reconnect_scheduled: false,
            updated_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// QR payload waiting to be scanned, if any.
    pub fn last_qr(&self) -> Option<&str> {
        self.last_qr.as_deref()
    }

    pub fn last_disconnect_reason(&self) -> Option<&str> {
        self.last_disconnect_reason.as_deref()
    }

    pub fn last_auth_failure(&self) -> Option<&str> {
        self.last_auth_failure.as_deref()
    }

    pub fn reconnect_scheduled(&self) -> bool {
        self.reconnect_scheduled
    }

    /// Apply an event pushed by the automation client.
    pub fn apply(&mut self, event: &ClientEvent) -> Transition {
        self.updated_at = Utc::now();
        match event {
            ClientEvent::Qr(qr) => {
                self.state = SessionState::QrPending;
                self.ready = false;
                self.last_qr = Some(qr.clone());
                Transition::None
            }
            ClientEvent::Authenticated => {
                self.state = SessionState::Authenticated;
                self.last_auth_failure = None;
                Transition::None
            }
            ClientEvent::AuthFailure(message) => {
                self.state = SessionState::Disconnected;
                self.ready = false;
                self.last_auth_failure = Some(message.clone());
                Transition::None
            }
            ClientEvent::Ready => {
                self.state = SessionState::Ready;
                self.ready = true;
                self.last_qr = None;
                Transition::None
            }
            ClientEvent::Disconnected(reason) => {
                self.state = SessionState::Disconnected;
                self.ready = false;
                self.last_disconnect_reason = Some(reason.clone());
                // Never reconnect while a QR is waiting to be scanned.
                if self.last_qr.is_none() && !self.reconnect_scheduled {
                    self.reconnect_scheduled = true;
                    Transition::ScheduleReconnect
                } else {
                    Transition::None
                }
            }
        }
    }

    /// Initialization of the client is starting.
    pub fn begin_initialize(&mut self) {
        self.state = SessionState::Initializing;
        self.ready = false;
        self.updated_at = Utc::now();
    }

    /// The scheduled reconnection ran (successfully or not) or was cancelled.
    pub fn reconnect_finished(&mut self) {
        self.reconnect_scheduled = false;
    }

    /// Forget everything; used by the manual reset path.
    pub fn reset(&mut self) {
        *self = Self {
            state: SessionState::Reset,
            ..Self::new()
        };
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            ready: self.ready,
            has_qr: self.last_qr.is_some(),
            last_disconnect_reason: self.last_disconnect_reason.clone(),
            last_auth_failure: self.last_auth_failure.clone(),
            reconnect_scheduled: self.reconnect_scheduled,
            updated_at: self.updated_at,
        }
    }
}
