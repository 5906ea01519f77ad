pub mod capture;
pub mod codec;
pub mod playback;
mod resample;

pub use capture::{CaptureSource, FrameCallback};
pub use codec::{
    bytes_to_text, decode_inbound_to_buffer, encode_outbound, text_to_bytes, PcmBlob,
};
pub use playback::{EndedCallback, PlaybackSink, UnitId};
pub use resample::resample;

#[cfg(feature = "device")]
pub use capture::DeviceCapture;
#[cfg(feature = "device")]
pub use playback::DevicePlayback;

/// Sample rate the Live API expects for microphone audio
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;
/// Sample rate of the synthesized speech sent back
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;
/// Channels (mono for voice)
pub const CHANNELS: u16 = 1;
/// Samples per outbound frame (256ms at 16kHz)
pub const CAPTURE_FRAME_SIZE: usize = 4096;

/// Decoded audio ready to be scheduled on a playback sink
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Playback length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel_data(&self, channel: u16) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        self.samples
            .iter()
            .skip(channel as usize)
            .step_by(channels)
            .copied()
            .collect()
    }
}
