use thiserror::Error;

/// Message shown when no credential is configured
pub const MISSING_KEY_MESSAGE: &str = "API Key is missing in environment variables.";
/// Message shown when the microphone, audio output or session could not be set up
pub const INIT_FAILED_MESSAGE: &str = "Failed to initialize microphone or connection.";
/// Message shown when the remote session reports an error
pub const CONNECTION_FAILED_MESSAGE: &str = "Connection to AI Agent failed. Please try again.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Microphone unavailable: {0}")]
    Permission(String),
    #[error("Audio output unavailable: {0}")]
    Device(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Malformed audio payload: {0}")]
    Decode(String),
    #[error("Failed to send audio: {0}")]
    Transmit(String),
    #[error("A session is already active")]
    SessionActive,
}

impl VoiceError {
    /// Text surfaced to the user for this failure, if it is surfaced at all.
    /// Decode and transmit failures only ever reach the log.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            VoiceError::Config(_) => Some(MISSING_KEY_MESSAGE),
            VoiceError::Permission(_) | VoiceError::Device(_) | VoiceError::Connection(_) => {
                Some(INIT_FAILED_MESSAGE)
            }
            VoiceError::Decode(_) | VoiceError::Transmit(_) | VoiceError::SessionActive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_setup_failures_are_surfaced() {
        assert_eq!(
            VoiceError::Config("no key".into()).user_message(),
            Some(MISSING_KEY_MESSAGE)
        );
        assert_eq!(
            VoiceError::Permission("denied".into()).user_message(),
            Some(INIT_FAILED_MESSAGE)
        );
        assert_eq!(VoiceError::Decode("odd length".into()).user_message(), None);
        assert_eq!(VoiceError::Transmit("closed".into()).user_message(), None);
    }
}
