use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::audio::{CAPTURE_FRAME_SIZE, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
use crate::error::VoiceError;

/// Native-audio model used for both personas
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Bidirectional streaming endpoint of the Live API
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Environment variables checked for the credential, in order
const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Everything the session controller needs to know up front.
/// Built once at startup and handed to the controller; nothing downstream
/// reads the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub frame_size: usize,
    pub output_gain: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            frame_size: CAPTURE_FRAME_SIZE,
            output_gain: 1.0,
        }
    }
}

impl VoiceConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Load the config file (if any) then apply the credential from the environment
    pub fn load() -> Self {
        let mut config = load_file().map(VoiceConfig::validated).unwrap_or_default();
        let from_env = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()));
        if let Some(key) = from_env {
            config.api_key = Some(key);
        }
        config
    }

    /// Replace unusable audio settings with their defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.capture_sample_rate == 0 {
            tracing::warn!("capture_sample_rate must be positive, using {}", defaults.capture_sample_rate);
            self.capture_sample_rate = defaults.capture_sample_rate;
        }
        if self.playback_sample_rate == 0 {
            tracing::warn!("playback_sample_rate must be positive, using {}", defaults.playback_sample_rate);
            self.playback_sample_rate = defaults.playback_sample_rate;
        }
        if self.frame_size == 0 {
            tracing::warn!("frame_size must be positive, using {}", defaults.frame_size);
            self.frame_size = defaults.frame_size;
        }
        if !self.output_gain.is_finite() || self.output_gain < 0.0 {
            tracing::warn!("output_gain must be a non-negative number, using {}", defaults.output_gain);
            self.output_gain = defaults.output_gain;
        }
        self
    }

    /// The configured credential, or a ConfigError if it is missing or blank
    pub fn require_api_key(&self) -> Result<&str, VoiceError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(VoiceError::Config("no API key configured".to_string())),
        }
    }
}

/// Path to the optional config file
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("upca-voice")
        .join("config.json")
}

fn load_file() -> Option<VoiceConfig> {
    let path = config_path();
    if !path.exists() {
        return None;
    }

    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(config) => {
            tracing::info!("Loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
            None
        }
    }
}
