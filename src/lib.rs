pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod indicator;
pub mod live;
pub mod persona;
pub mod session;

pub use config::VoiceConfig;
pub use error::VoiceError;
pub use live::{GeminiLiveConnector, LiveConnector, LiveLink};
pub use persona::{AgentType, Persona};
pub use session::{AgentStatus, ConnectionState, SessionController};

/// Run the voice assistant on the default microphone and speakers
#[cfg(feature = "device")]
pub fn run() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // wss:// needs a process-wide TLS provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = VoiceConfig::load();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start async runtime");

    let result = runtime.block_on(async {
        let (mut controller, mut events) = SessionController::new(
            config.clone(),
            audio::DeviceCapture::new(config.capture_sample_rate),
            audio::DevicePlayback::new(config.output_gain),
            GeminiLiveConnector::new(),
        );
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        host::run_widget(&mut controller, &mut events, stdin, &mut std::io::stdout()).await
    });

    if let Err(e) = result {
        tracing::error!("Voice assistant stopped: {}", e);
    }
}
