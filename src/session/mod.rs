//! Live voice session: lifecycle state machine, playback scheduling and
//! the event envelope every asynchronous callback is routed through.

mod controller;
#[cfg(test)]
pub(crate) mod fakes;

pub use controller::SessionController;

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::UnitId;
use crate::live::ServerContent;
use crate::persona::AgentType;

/// Identity of one connect attempt; events carrying any other id are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Something that happened asynchronously on behalf of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Remote session established
    Opened,
    /// Inbound server content (audio and/or interruption)
    Message(ServerContent),
    /// Remote side closed the session
    Closed,
    /// Remote or transport failure
    Error(String),
    /// One fixed-size mono frame from the microphone
    CaptureFrame(Vec<f32>),
    /// A scheduled playback unit finished playing
    PlaybackEnded(UnitId),
}

impl SessionEvent {
    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Opened => "open",
            SessionEvent::Message(_) => "message",
            SessionEvent::Closed => "close",
            SessionEvent::Error(_) => "error",
            SessionEvent::CaptureFrame(_) => "capture frame",
            SessionEvent::PlaybackEnded(_) => "playback ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnvelope {
    pub session: SessionId,
    pub event: SessionEvent,
}

/// Session-tagged sender handed to capture, playback and transport callbacks
#[derive(Clone, Debug)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEnvelope>,
}

impl EventSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<SessionEnvelope>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Deliver an event; silently dropped once the controller is gone
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(SessionEnvelope {
            session: self.session,
            event,
        });
    }
}

/// Snapshot published to the UI after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub state: ConnectionState,
    pub persona: AgentType,
    pub speaking: bool,
    pub error: Option<String>,
    pub transmit_failures: u64,
}

impl AgentStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            persona: AgentType::FrontDesk,
            speaking: false,
            error: None,
            transmit_failures: 0,
        }
    }
}
