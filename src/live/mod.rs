//! Adapter for the remote real-time conversational endpoint

mod client;
pub mod protocol;

pub use client::{GeminiLiveConnector, GeminiLiveLink};
pub use protocol::{ClientMessage, ServerContent, ServerMessage};

use crate::audio::PcmBlob;
use crate::error::VoiceError;
use crate::session::EventSink;

/// Everything needed to open one session for one persona
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub voice_name: String,
    pub system_instruction: String,
}

/// Opens sessions against the remote endpoint.
///
/// `open` must return without waiting for the remote side; establishment,
/// inbound content, close and errors are all reported through `events`.
pub trait LiveConnector {
    fn open(&self, setup: SessionSetup, events: EventSink) -> Result<Box<dyn LiveLink>, VoiceError>;
}

/// Handle to one open (or opening) session
pub trait LiveLink: Send {
    /// Queue one encoded microphone chunk; best effort
    fn send_audio(&self, blob: PcmBlob) -> Result<(), VoiceError>;

    /// Drop the session; no further events are produced for it
    fn close(&mut self);
}
