//! PCM16 <-> base64 conversion for the Live API wire format

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{AudioBuffer, CAPTURE_SAMPLE_RATE};
use crate::error::VoiceError;

/// Bytes per 16-bit sample
const SAMPLE_WIDTH: usize = 2;

/// Encoded microphone chunk as the Live API expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcmBlob {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl PcmBlob {
    /// Encode one captured frame recorded at `sample_rate`
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: encode_outbound(samples),
            mime_type: format!("audio/pcm;rate={}", sample_rate),
        }
    }
}

impl From<&[f32]> for PcmBlob {
    fn from(samples: &[f32]) -> Self {
        Self::from_samples(samples, CAPTURE_SAMPLE_RATE)
    }
}

/// Quantize to signed 16-bit, clamping anything outside [-1, 1]
fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn dequantize(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Float samples -> little-endian PCM16 -> base64
pub fn encode_outbound(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * SAMPLE_WIDTH);
    for &sample in samples {
        bytes.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    bytes_to_text(&bytes)
}

/// base64 -> little-endian PCM16 -> float buffer tagged with rate and channel count.
/// Interleaved input is expected when `channels > 1`.
pub fn decode_inbound_to_buffer(
    encoded: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, VoiceError> {
    let bytes = text_to_bytes(encoded)?;
    let frame_width = SAMPLE_WIDTH * channels.max(1) as usize;

    if bytes.len() % frame_width != 0 {
        return Err(VoiceError::Decode(format!(
            "{} bytes is not a whole number of {}-channel 16-bit frames",
            bytes.len(),
            channels
        )));
    }

    let samples = bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|pair| dequantize(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    Ok(AudioBuffer::new(samples, sample_rate, channels.max(1)))
}

pub fn text_to_bytes(text: &str) -> Result<Vec<u8>, VoiceError> {
    B64.decode(text)
        .map_err(|e| VoiceError::Decode(format!("invalid base64: {}", e)))
}

pub fn bytes_to_text(bytes: &[u8]) -> String {
    B64.encode(bytes)
}
