//! JSON messages exchanged with the Live API over the websocket

use serde::{Deserialize, Serialize};

use crate::audio::PcmBlob;

use super::SessionSetup;

/// Messages sent to the server
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// First message on the socket
    Setup(Setup),
    /// Streamed microphone audio
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    pub fn setup(setup: &SessionSetup) -> Self {
        Self::Setup(Setup {
            model: setup.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: setup.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part::text(&setup.system_instruction)],
            },
        })
    }

    pub fn audio(blob: PcmBlob) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![blob],
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
    Text,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<PcmBlob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    pub fn audio(data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: Some("audio/pcm;rate=24000".to_string()),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

/// Any message received from the server; unknown fields are ignored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    /// The user started talking over the model
    pub interrupted: bool,
    pub turn_complete: bool,
}

impl ServerContent {
    /// Content carrying the given base64 audio chunks
    pub fn with_audio<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model_turn: Some(Content {
                parts: chunks.into_iter().map(Part::audio).collect(),
            }),
            ..Self::default()
        }
    }

    pub fn interruption() -> Self {
        Self {
            interrupted: true,
            ..Self::default()
        }
    }

    /// Base64 audio chunks in part order; parts without a mime type are taken as audio
    pub fn audio_chunks(&self) -> Vec<&str> {
        self.model_turn
            .iter()
            .flat_map(|turn| &turn.parts)
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|inline| {
                inline
                    .mime_type
                    .as_deref()
                    .map_or(true, |mime| mime.starts_with("audio/"))
            })
            .map(|inline| inline.data.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> SessionSetup {
        SessionSetup {
            endpoint: "wss://example.test/live".to_string(),
            api_key: "key".to_string(),
            model: "models/test".to_string(),
            voice_name: "Kore".to_string(),
            system_instruction: "Be Sarah.".to_string(),
        }
    }

    #[test]
    fn test_setup_wire_shape() {
        let value = serde_json::to_value(ClientMessage::setup(&setup())).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/test",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } }
                        }
                    },
                    "systemInstruction": { "parts": [{ "text": "Be Sarah." }] }
                }
            })
        );
    }

    #[test]
    fn test_realtime_input_wire_shape() {
        let blob = PcmBlob {
            data: "AAA=".to_string(),
            mime_type: "audio/pcm;rate=16000".to_string(),
        };
        let value = serde_json::to_value(ClientMessage::audio(blob)).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{ "data": "AAA=", "mimeType": "audio/pcm;rate=16000" }]
                }
            })
        );
    }

    #[test]
    fn test_parse_audio_and_interruption() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQI=" } },
                    { "text": "hello" },
                    { "inlineData": { "mimeType": "image/png", "data": "xxxx" } },
                    { "inlineData": { "data": "AwQ=" } }
                ] },
                "interrupted": true
            }
        }"#;

        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = message.server_content.unwrap();
        assert_eq!(content.audio_chunks(), vec!["AQI=", "AwQ="]);
        assert!(content.interrupted);
        assert!(!content.turn_complete);
    }

    #[test]
    fn test_parse_setup_complete_and_unknown_fields() {
        let message: ServerMessage =
            serde_json::from_str(r#"{"setupComplete": {}, "usageMetadata": {"totalTokenCount": 3}}"#)
                .unwrap();
        assert!(message.setup_complete.is_some());
        assert!(message.server_content.is_none());
    }

    #[test]
    fn test_turn_complete_without_audio() {
        let message: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"turnComplete": true}}"#).unwrap();
        let content = message.server_content.unwrap();
        assert!(content.turn_complete);
        assert!(content.audio_chunks().is_empty());
    }
}
