use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::protocol::{ClientMessage, ServerMessage};
use super::{LiveConnector, LiveLink, SessionSetup};
use crate::audio::PcmBlob;
use crate::error::VoiceError;
use crate::session::{EventSink, SessionEvent};

/// Opens Live API sessions over a websocket on the current tokio runtime
#[derive(Debug, Default, Clone)]
pub struct GeminiLiveConnector;

impl GeminiLiveConnector {
    pub fn new() -> Self {
        Self
    }
}

impl LiveConnector for GeminiLiveConnector {
    fn open(&self, setup: SessionSetup, events: EventSink) -> Result<Box<dyn LiveLink>, VoiceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::Connection(format!("no async runtime: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_session(setup, events, rx));

        Ok(Box::new(GeminiLiveLink { tx, task }))
    }
}

/// Outbound queue plus the task that owns the socket
pub struct GeminiLiveLink {
    tx: mpsc::UnboundedSender<ClientMessage>,
    task: JoinHandle<()>,
}

impl LiveLink for GeminiLiveLink {
    fn send_audio(&self, blob: PcmBlob) -> Result<(), VoiceError> {
        self.tx
            .send(ClientMessage::audio(blob))
            .map_err(|_| VoiceError::Transmit("session task has stopped".to_string()))
    }

    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for GeminiLiveLink {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_session(
    setup: SessionSetup,
    events: EventSink,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
) {
    let url = match session_url(&setup.endpoint, &setup.api_key) {
        Ok(url) => url,
        Err(e) => {
            events.emit(SessionEvent::Error(e.to_string()));
            return;
        }
    };
    tracing::info!("Connecting to {} (session {})", setup.endpoint, events.session());

    let (ws, _resp) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(ok) => ok,
        Err(e) => {
            events.emit(SessionEvent::Error(format!("connect failed: {}", e)));
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let hello = match serde_json::to_string(&ClientMessage::setup(&setup)) {
        Ok(text) => text,
        Err(e) => {
            events.emit(SessionEvent::Error(format!("failed to encode setup: {}", e)));
            return;
        }
    };
    if let Err(e) = write.send(Message::Text(hello)).await {
        events.emit(SessionEvent::Error(format!("failed to send setup: {}", e)));
        return;
    }

    loop {
        tokio::select! {
            Some(message) = outbound.recv() => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode outbound message: {}", e);
                        continue;
                    }
                };
                // Best effort: a failed send drops this chunk only
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!("Session send error: {}", e);
                }
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => dispatch(text.as_bytes(), &events),
                Some(Ok(Message::Binary(bytes))) => dispatch(&bytes, &events),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Connection closed by server: {:?}", frame);
                    events.emit(SessionEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    events.emit(SessionEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    events.emit(SessionEvent::Closed);
                    break;
                }
            }
        }
    }
}

/// Endpoint with the credential appended as a `key` query pair
fn session_url(endpoint: &str, api_key: &str) -> Result<Url, VoiceError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| VoiceError::Connection(format!("invalid endpoint {}: {}", endpoint, e)))?;
    if url.cannot_be_a_base() {
        return Err(VoiceError::Connection(format!("invalid endpoint {}", endpoint)));
    }
    if url.path().is_empty() {
        url.set_path("/");
    }
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Turn one server frame into session events
fn dispatch(raw: &[u8], events: &EventSink) {
    let message: ServerMessage = match serde_json::from_slice(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Ignoring unparseable server message: {}", e);
            return;
        }
    };

    if message.setup_complete.is_some() {
        tracing::info!("Connection established");
        events.emit(SessionEvent::Opened);
    }
    if let Some(content) = message.server_content {
        events.emit(SessionEvent::Message(content));
    }
    if let Some(notice) = message.go_away {
        tracing::warn!("Server is going away: {}", notice);
    }
}
