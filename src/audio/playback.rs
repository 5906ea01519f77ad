use super::AudioBuffer;
use crate::error::VoiceError;

/// Handle of one scheduled playback unit
pub type UnitId = u64;

/// Called from the output side when a unit has played to the end
pub type EndedCallback = Box<dyn Fn(UnitId) + Send + Sync + 'static>;

/// Speaker side of a session: a clock plus interruptible, time-scheduled playback.
pub trait PlaybackSink {
    /// Open the output context for audio at `sample_rate`
    fn open(&mut self, sample_rate: u32, on_ended: EndedCallback) -> Result<(), VoiceError>;

    /// Output clock in seconds since `open`; 0 when closed
    fn current_time(&self) -> f64;

    /// Play `buffer` starting at `start_at` on the output clock
    fn schedule(&mut self, unit: UnitId, buffer: AudioBuffer, start_at: f64)
        -> Result<(), VoiceError>;

    /// Cancel a unit whether or not it has started; does not report it as ended
    fn stop(&mut self, unit: UnitId);

    /// Close the output context and drop everything still scheduled
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// A unit placed on the output timeline, already at the device rate
#[cfg_attr(not(feature = "device"), allow(dead_code))]
struct TimelineUnit {
    id: UnitId,
    start_frame: u64,
    samples: Vec<f32>,
}

/// Sample-accurate mixing timeline shared with the output callback
#[cfg_attr(not(feature = "device"), allow(dead_code))]
#[derive(Default)]
pub(crate) struct Timeline {
    frames_played: u64,
    units: Vec<TimelineUnit>,
}

#[cfg_attr(not(feature = "device"), allow(dead_code))]
impl Timeline {
    pub(crate) fn frames_played(&self) -> u64 {
        self.frames_played
    }

    pub(crate) fn insert(&mut self, id: UnitId, start_frame: u64, samples: Vec<f32>) {
        self.units.push(TimelineUnit {
            id,
            start_frame,
            samples,
        });
    }

    pub(crate) fn remove(&mut self, id: UnitId) {
        self.units.retain(|unit| unit.id != id);
    }

    pub(crate) fn clear(&mut self) {
        self.units.clear();
    }

    /// Mix the next `out.len() / channels` frames into `out` and return the
    /// ids of units that finished within them.
    pub(crate) fn render(&mut self, out: &mut [f32], channels: usize, gain: f32) -> Vec<UnitId> {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let base = self.frames_played;

        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = base + i as u64;
            let mut mixed = 0.0f32;
            for unit in &self.units {
                if t >= unit.start_frame {
                    if let Some(sample) = unit.samples.get((t - unit.start_frame) as usize) {
                        mixed += sample;
                    }
                }
            }
            frame.fill((mixed * gain).clamp(-1.0, 1.0));
        }

        self.frames_played += frames as u64;

        let played = self.frames_played;
        let mut finished = Vec::new();
        self.units.retain(|unit| {
            let done = unit.start_frame + unit.samples.len() as u64 <= played;
            if done {
                finished.push(unit.id);
            }
            !done
        });
        finished
    }
}

#[cfg(feature = "device")]
pub use device::DevicePlayback;

#[cfg(feature = "device")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Host, SampleFormat, Stream};
    use parking_lot::Mutex;
    use std::sync::Arc;

    use super::{EndedCallback, PlaybackSink, Timeline, UnitId};
    use crate::audio::{resample, AudioBuffer};
    use crate::error::VoiceError;

    /// Speaker output using cpal with a frame-counting clock
    pub struct DevicePlayback {
        host: Host,
        gain: f32,
        stream: Option<Stream>,
        device_rate: u32,
        timeline: Arc<Mutex<Timeline>>,
    }

    impl DevicePlayback {
        pub fn new(gain: f32) -> Self {
            Self {
                host: cpal::default_host(),
                gain,
                stream: None,
                device_rate: 0,
                timeline: Arc::new(Mutex::new(Timeline::default())),
            }
        }
    }

    impl Default for DevicePlayback {
        fn default() -> Self {
            Self::new(1.0)
        }
    }

    impl PlaybackSink for DevicePlayback {
        fn open(&mut self, sample_rate: u32, on_ended: EndedCallback) -> Result<(), VoiceError> {
            let device = self
                .host
                .default_output_device()
                .ok_or_else(|| VoiceError::Device("no output device available".to_string()))?;

            let supported = device
                .default_output_config()
                .map_err(|e| VoiceError::Device(format!("failed to get output config: {}", e)))?;

            let config = supported.config();
            let channels = config.channels as usize;
            tracing::info!(
                "Using output device: {} ({} Hz, {} Hz source)",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                sample_rate
            );

            *self.timeline.lock() = Timeline::default();
            let gain = self.gain;
            let on_ended = Arc::new(on_ended);

            let err_fn = |err| {
                tracing::error!("Audio playback error: {}", err);
            };

            let stream = match supported.sample_format() {
                SampleFormat::F32 => {
                    let timeline = self.timeline.clone();
                    let on_ended = on_ended.clone();
                    device.build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let finished = timeline.lock().render(data, channels, gain);
                            for unit in finished {
                                on_ended(unit);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::I16 => {
                    let timeline = self.timeline.clone();
                    let on_ended = on_ended.clone();
                    let mut scratch: Vec<f32> = Vec::new();
                    device.build_output_stream(
                        &config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            scratch.resize(data.len(), 0.0);
                            let finished = timeline.lock().render(&mut scratch, channels, gain);
                            for (out, sample) in data.iter_mut().zip(&scratch) {
                                *out = (sample * i16::MAX as f32) as i16;
                            }
                            for unit in finished {
                                on_ended(unit);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                format => {
                    return Err(VoiceError::Device(format!(
                        "unsupported sample format: {:?}",
                        format
                    )));
                }
            }
            .map_err(|e| VoiceError::Device(format!("failed to build output stream: {}", e)))?;

            stream
                .play()
                .map_err(|e| VoiceError::Device(format!("failed to start playback: {}", e)))?;

            self.device_rate = config.sample_rate.0;
            self.stream = Some(stream);
            tracing::info!("Audio playback started");
            Ok(())
        }

        fn current_time(&self) -> f64 {
            if self.stream.is_none() || self.device_rate == 0 {
                return 0.0;
            }
            self.timeline.lock().frames_played() as f64 / self.device_rate as f64
        }

        fn schedule(
            &mut self,
            unit: UnitId,
            buffer: AudioBuffer,
            start_at: f64,
        ) -> Result<(), VoiceError> {
            if self.stream.is_none() {
                return Err(VoiceError::Device("output is closed".to_string()));
            }

            let mono = buffer.channel_data(0);
            let samples = resample(&mono, buffer.sample_rate, self.device_rate);
            let start_frame = (start_at * self.device_rate as f64).round() as u64;
            self.timeline.lock().insert(unit, start_frame, samples);
            Ok(())
        }

        fn stop(&mut self, unit: UnitId) {
            self.timeline.lock().remove(unit);
        }

        fn close(&mut self) {
            if self.stream.take().is_some() {
                tracing::info!("Audio playback stopped");
            }
            self.timeline.lock().clear();
            self.device_rate = 0;
        }

        fn is_open(&self) -> bool {
            self.stream.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_places_units_back_to_back() {
        let mut timeline = Timeline::default();
        timeline.insert(1, 0, vec![0.5; 4]);
        timeline.insert(2, 4, vec![0.25; 4]);

        let mut out = vec![0.0f32; 8];
        let finished = timeline.render(&mut out, 1, 1.0);

        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5, 0.25, 0.25, 0.25, 0.25]);
        assert_eq!(finished, vec![1, 2]);
        assert_eq!(timeline.frames_played(), 8);
    }

    #[test]
    fn test_timeline_reports_end_only_once_fully_played() {
        let mut timeline = Timeline::default();
        timeline.insert(7, 2, vec![0.1; 4]);

        let mut out = vec![0.0f32; 4];
        assert!(timeline.render(&mut out, 1, 1.0).is_empty());
        assert_eq!(out, vec![0.0, 0.0, 0.1, 0.1]);

        assert_eq!(timeline.render(&mut out, 1, 1.0), vec![7]);
    }

    #[test]
    fn test_timeline_duplicates_mono_across_channels() {
        let mut timeline = Timeline::default();
        timeline.insert(1, 0, vec![0.5, -0.5]);

        let mut out = vec![0.0f32; 4];
        timeline.render(&mut out, 2, 1.0);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_removed_unit_is_silent_and_never_reported() {
        let mut timeline = Timeline::default();
        timeline.insert(1, 0, vec![0.5; 4]);
        timeline.remove(1);

        let mut out = vec![1.0f32; 4];
        assert!(timeline.render(&mut out, 1, 1.0).is_empty());
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gain_and_clipping() {
        let mut timeline = Timeline::default();
        timeline.insert(1, 0, vec![0.8; 2]);
        timeline.insert(2, 0, vec![0.8; 2]);

        let mut out = vec![0.0f32; 2];
        timeline.render(&mut out, 1, 1.0);
        assert_eq!(out, vec![1.0, 1.0]);

        let mut timeline = Timeline::default();
        timeline.insert(1, 0, vec![0.8; 2]);
        timeline.render(&mut out, 1, 0.5);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }
}
