use std::collections::BTreeSet;
use tokio::sync::{mpsc, watch};

use super::{AgentStatus, ConnectionState, EventSink, SessionEnvelope, SessionEvent, SessionId};
use crate::audio::{decode_inbound_to_buffer, CaptureSource, PcmBlob, PlaybackSink, UnitId};
use crate::config::VoiceConfig;
use crate::error::{VoiceError, CONNECTION_FAILED_MESSAGE};
use crate::live::{LiveConnector, LiveLink, ServerContent, SessionSetup};
use crate::persona::AgentType;

/// The live session, if any
struct ActiveSession {
    id: SessionId,
    /// Set once the connector has accepted the open request
    link: Option<Box<dyn LiveLink>>,
}

/// Owns the connect/disconnect lifecycle, the microphone pipeline and
/// gap-free playback scheduling for one widget.
///
/// All asynchronous callbacks come back as [`SessionEnvelope`]s on the
/// receiver returned by [`SessionController::new`] and must be fed to
/// [`SessionController::handle`] from a single task.
pub struct SessionController<C, P, L> {
    config: VoiceConfig,
    capture: C,
    playback: P,
    connector: L,

    persona: AgentType,
    state: ConnectionState,
    session: Option<ActiveSession>,
    error: Option<String>,

    /// Output-clock time at which the next unit starts
    next_start_time: f64,
    active_units: BTreeSet<UnitId>,
    next_unit: UnitId,
    speaking: bool,
    transmit_failures: u64,

    events_tx: mpsc::UnboundedSender<SessionEnvelope>,
    status_tx: watch::Sender<AgentStatus>,
}

impl<C, P, L> SessionController<C, P, L>
where
    C: CaptureSource,
    P: PlaybackSink,
    L: LiveConnector,
{
    pub fn new(
        config: VoiceConfig,
        capture: C,
        playback: P,
        connector: L,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEnvelope>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(AgentStatus::default());

        let controller = Self {
            config,
            capture,
            playback,
            connector,
            persona: AgentType::FrontDesk,
            state: ConnectionState::Disconnected,
            session: None,
            error: None,
            next_start_time: 0.0,
            active_units: BTreeSet::new(),
            next_unit: 0,
            speaking: false,
            transmit_failures: 0,
            events_tx,
            status_tx,
        };

        (controller, events_rx)
    }

    /// Start a session with `persona`. Only allowed while disconnected.
    pub fn connect(&mut self, persona: AgentType) -> Result<(), VoiceError> {
        if self.state != ConnectionState::Disconnected {
            return Err(VoiceError::SessionActive);
        }

        self.error = None;
        let api_key = match self.config.require_api_key() {
            Ok(key) => key.to_string(),
            Err(e) => {
                tracing::warn!("Refusing to connect: {}", e);
                self.error = e.user_message().map(str::to_string);
                self.publish();
                return Err(e);
            }
        };

        let id = SessionId::new();
        self.persona = persona;
        self.state = ConnectionState::Connecting;
        self.session = Some(ActiveSession { id, link: None });
        tracing::info!("Connecting as {} (session {})", persona.persona().name, id);
        self.publish();

        if let Err(e) = self.acquire(id, api_key) {
            tracing::error!("Initialization error: {}", e);
            self.disconnect();
            self.error = e.user_message().map(str::to_string);
            self.publish();
            return Err(e);
        }

        Ok(())
    }

    /// Microphone, output context, then the remote session
    fn acquire(&mut self, id: SessionId, api_key: String) -> Result<(), VoiceError> {
        self.capture.open()?;

        let ended = self.event_sink(id);
        self.playback.open(
            self.config.playback_sample_rate,
            Box::new(move |unit| ended.emit(SessionEvent::PlaybackEnded(unit))),
        )?;

        let persona = self.persona.persona();
        let setup = SessionSetup {
            endpoint: self.config.endpoint.clone(),
            api_key,
            model: self.config.model.clone(),
            voice_name: persona.voice_name.to_string(),
            system_instruction: persona.system_instruction.to_string(),
        };
        let link = self.connector.open(setup, self.event_sink(id))?;

        if let Some(session) = self.session.as_mut() {
            session.link = Some(link);
        }
        Ok(())
    }

    /// Tear down everything the current session holds. Safe to call in any
    /// state and any number of times; each resource is released on its own.
    pub fn disconnect(&mut self) {
        for unit in std::mem::take(&mut self.active_units) {
            self.playback.stop(unit);
        }

        self.capture.release();

        if self.playback.is_open() {
            self.playback.close();
        }

        if let Some(mut session) = self.session.take() {
            if let Some(mut link) = session.link.take() {
                link.close();
            }
            tracing::info!("Session {} torn down", session.id);
        }

        self.state = ConnectionState::Disconnected;
        self.speaking = false;
        self.next_start_time = 0.0;
        self.transmit_failures = 0;
        self.publish();
    }

    /// Select another persona, hanging up first if a session is live
    pub fn switch_persona(&mut self, persona: AgentType) {
        if self.state != ConnectionState::Disconnected {
            self.disconnect();
        }
        self.persona = persona;
        self.publish();
    }

    /// Apply one asynchronous event. Events from any session other than the
    /// live one are dropped.
    pub fn handle(&mut self, envelope: SessionEnvelope) {
        if self.session_id() != Some(envelope.session) {
            tracing::debug!(
                "Dropping {} from stale session {}",
                envelope.event.kind(),
                envelope.session
            );
            return;
        }

        match envelope.event {
            SessionEvent::Opened => self.on_open(),
            SessionEvent::CaptureFrame(samples) => self.on_capture_frame(&samples),
            SessionEvent::Message(content) => self.on_message(content),
            SessionEvent::PlaybackEnded(unit) => self.on_playback_ended(unit),
            SessionEvent::Closed => {
                tracing::info!("Connection closed");
                self.disconnect();
            }
            SessionEvent::Error(message) => {
                tracing::error!("Connection error: {}", message);
                self.error = Some(CONNECTION_FAILED_MESSAGE.to_string());
                self.disconnect();
            }
        }
    }

    fn on_open(&mut self) {
        let Some(id) = self.session_id() else { return };
        if self.state != ConnectionState::Connecting {
            return;
        }

        self.state = ConnectionState::Connected;
        tracing::info!("Session {} connected", id);

        let frames = self.event_sink(id);
        let started = self.capture.start(
            self.config.frame_size,
            Box::new(move |samples| frames.emit(SessionEvent::CaptureFrame(samples))),
        );

        if let Err(e) = started {
            tracing::error!("Failed to start microphone pipeline: {}", e);
            self.disconnect();
            self.error = e.user_message().map(str::to_string);
        }
        self.publish();
    }

    fn on_capture_frame(&mut self, samples: &[f32]) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let Some(link) = self.session.as_ref().and_then(|s| s.link.as_ref()) else {
            return;
        };

        let blob = PcmBlob::from_samples(samples, self.config.capture_sample_rate);
        if let Err(e) = link.send_audio(blob) {
            tracing::warn!("Session send error: {}", e);
            self.transmit_failures += 1;
            self.publish();
        }
    }

    fn on_message(&mut self, content: ServerContent) {
        for chunk in content.audio_chunks() {
            self.schedule_chunk(chunk);
        }

        if content.interrupted {
            self.interrupt();
        }

        if content.turn_complete {
            tracing::debug!("Model turn complete");
        }
    }

    /// Decode one inbound chunk and queue it right after whatever is already scheduled
    fn schedule_chunk(&mut self, encoded: &str) {
        if !self.playback.is_open() {
            return;
        }

        let buffer = match decode_inbound_to_buffer(encoded, self.config.playback_sample_rate, 1)
        {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!("Audio decoding error: {}", e);
                return;
            }
        };

        let duration = buffer.duration();
        let start = self.next_start_time.max(self.playback.current_time());
        let unit = self.next_unit;

        if let Err(e) = self.playback.schedule(unit, buffer, start) {
            tracing::warn!("Failed to schedule playback: {}", e);
            return;
        }

        self.next_unit += 1;
        self.active_units.insert(unit);
        self.next_start_time = start + duration;
        self.speaking = true;
        self.publish();
    }

    /// The user talked over the model: drop everything queued
    fn interrupt(&mut self) {
        let pending = std::mem::take(&mut self.active_units);
        for &unit in &pending {
            self.playback.stop(unit);
        }
        tracing::info!("Interrupted, discarded {} queued units", pending.len());

        self.next_start_time = self.playback.current_time();
        self.speaking = false;
        self.publish();
    }

    fn on_playback_ended(&mut self, unit: UnitId) {
        if self.active_units.remove(&unit) && self.active_units.is_empty() {
            self.speaking = false;
            self.publish();
        }
    }

    fn event_sink(&self, id: SessionId) -> EventSink {
        EventSink::new(id, self.events_tx.clone())
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            state: self.state,
            persona: self.persona,
            speaking: self.speaking,
            error: self.error.clone(),
            transmit_failures: self.transmit_failures,
        }
    }

    /// Receiver that sees every status change
    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn persona(&self) -> AgentType {
        self.persona
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn active_unit_count(&self) -> usize {
        self.active_units.len()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn connector(&self) -> &L {
        &self.connector
    }
}
