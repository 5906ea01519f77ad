//! In-memory capture, playback and transport used by the controller tests

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{EventSink, SessionEvent};
use crate::audio::{
    AudioBuffer, CaptureSource, EndedCallback, FrameCallback, PcmBlob, PlaybackSink, UnitId,
};
use crate::error::VoiceError;
use crate::live::{LiveConnector, LiveLink, SessionSetup};

/// Tolerance when comparing clock positions
const EPSILON: f64 = 1e-9;

#[derive(Default)]
pub struct FakeCapture {
    open: bool,
    deny: bool,
    open_count: usize,
    frame_size: Option<usize>,
    on_frame: Option<FrameCallback>,
}

impl FakeCapture {
    /// Make the next `open` fail as if permission was refused
    pub fn deny(&mut self) {
        self.deny = true;
    }

    pub fn push_frame(&mut self, samples: Vec<f32>) {
        if let Some(on_frame) = self.on_frame.as_mut() {
            on_frame(samples);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.on_frame.is_some()
    }

    pub fn frame_size(&self) -> Option<usize> {
        self.frame_size
    }

    pub fn open_count(&self) -> usize {
        self.open_count
    }
}

impl CaptureSource for FakeCapture {
    fn open(&mut self) -> Result<(), VoiceError> {
        if self.deny {
            return Err(VoiceError::Permission("permission denied".to_string()));
        }
        self.open = true;
        self.open_count += 1;
        Ok(())
    }

    fn start(&mut self, frame_size: usize, on_frame: FrameCallback) -> Result<(), VoiceError> {
        if !self.open {
            return Err(VoiceError::Permission("microphone not acquired".to_string()));
        }
        self.frame_size = Some(frame_size);
        self.on_frame = Some(on_frame);
        Ok(())
    }

    fn release(&mut self) {
        self.open = false;
        self.on_frame = None;
        self.frame_size = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledUnit {
    pub id: UnitId,
    pub start: f64,
    pub duration: f64,
}

/// Playback with a manually driven clock
#[derive(Default)]
pub struct FakePlayback {
    sample_rate: Option<u32>,
    clock: f64,
    open_count: usize,
    close_count: usize,
    scheduled: Vec<ScheduledUnit>,
    stopped: Vec<UnitId>,
    ended: Vec<UnitId>,
    on_ended: Option<EndedCallback>,
}

impl FakePlayback {
    /// Move the clock without reporting any ends
    pub fn set_time(&mut self, t: f64) {
        self.clock = t;
    }

    /// Move the clock and report every unit that has finished by `t`
    pub fn advance_to(&mut self, t: f64) {
        self.clock = t;
        let Some(on_ended) = self.on_ended.as_ref() else { return };

        for unit in &self.scheduled {
            let finished = unit.start + unit.duration <= t + EPSILON;
            let live = !self.stopped.contains(&unit.id) && !self.ended.contains(&unit.id);
            if finished && live {
                self.ended.push(unit.id);
                on_ended(unit.id);
            }
        }
    }

    pub fn scheduled(&self) -> &[ScheduledUnit] {
        &self.scheduled
    }

    pub fn stopped(&self) -> &[UnitId] {
        &self.stopped
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn open_count(&self) -> usize {
        self.open_count
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl PlaybackSink for FakePlayback {
    fn open(&mut self, sample_rate: u32, on_ended: EndedCallback) -> Result<(), VoiceError> {
        self.sample_rate = Some(sample_rate);
        self.on_ended = Some(on_ended);
        self.clock = 0.0;
        self.open_count += 1;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        if self.on_ended.is_some() {
            self.clock
        } else {
            0.0
        }
    }

    fn schedule(
        &mut self,
        unit: UnitId,
        buffer: AudioBuffer,
        start_at: f64,
    ) -> Result<(), VoiceError> {
        self.scheduled.push(ScheduledUnit {
            id: unit,
            start: start_at,
            duration: buffer.duration(),
        });
        Ok(())
    }

    fn stop(&mut self, unit: UnitId) {
        self.stopped.push(unit);
    }

    fn close(&mut self) {
        self.on_ended = None;
        self.sample_rate = None;
        self.close_count += 1;
    }

    fn is_open(&self) -> bool {
        self.on_ended.is_some()
    }
}

#[derive(Default)]
struct ConnectorState {
    fail_opens: bool,
    opened: Vec<SessionSetup>,
    events: Option<EventSink>,
    links: Vec<Arc<LinkState>>,
}

#[derive(Default)]
struct LinkState {
    closed: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<PcmBlob>>,
}

/// Records every open and lets the test play the remote side
#[derive(Default)]
pub struct FakeConnector {
    state: Mutex<ConnectorState>,
}

impl FakeConnector {
    pub fn fail_opens(&self) {
        self.state.lock().fail_opens = true;
    }

    pub fn allow_opens(&self) {
        self.state.lock().fail_opens = false;
    }

    /// Make every current link reject sends
    pub fn fail_sends(&self) {
        for link in &self.state.lock().links {
            link.fail_sends.store(true, Ordering::SeqCst);
        }
    }

    pub fn opened(&self) -> Vec<SessionSetup> {
        self.state.lock().opened.clone()
    }

    /// Events handle of the most recently opened session
    pub fn events(&self) -> EventSink {
        self.state
            .lock()
            .events
            .clone()
            .expect("no session has been opened")
    }

    /// Emit on behalf of the most recently opened session
    pub fn emit(&self, event: SessionEvent) {
        self.events().emit(event);
    }

    /// Audio sent on the most recent link
    pub fn sent(&self) -> Vec<PcmBlob> {
        self.state
            .lock()
            .links
            .last()
            .map(|link| link.sent.lock().clone())
            .unwrap_or_default()
    }

    pub fn all_closed(&self) -> bool {
        self.state
            .lock()
            .links
            .iter()
            .all(|link| link.closed.load(Ordering::SeqCst))
    }
}

impl LiveConnector for FakeConnector {
    fn open(&self, setup: SessionSetup, events: EventSink) -> Result<Box<dyn LiveLink>, VoiceError> {
        let mut state = self.state.lock();
        if state.fail_opens {
            return Err(VoiceError::Connection("endpoint unreachable".to_string()));
        }

        let link = Arc::new(LinkState::default());
        state.opened.push(setup);
        state.events = Some(events);
        state.links.push(link.clone());
        Ok(Box::new(FakeLink { state: link }))
    }
}

struct FakeLink {
    state: Arc<LinkState>,
}

impl LiveLink for FakeLink {
    fn send_audio(&self, blob: PcmBlob) -> Result<(), VoiceError> {
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(VoiceError::Transmit("socket not writable".to_string()));
        }
        self.state.sent.lock().push(blob);
        Ok(())
    }

    fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}
