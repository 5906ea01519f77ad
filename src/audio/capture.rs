use crate::audio::resample;
use crate::error::VoiceError;

/// Receives each fixed-size mono frame in capture order
pub type FrameCallback = Box<dyn FnMut(Vec<f32>) + Send + 'static>;

/// Microphone side of a session.
///
/// `open` acquires the device (the permission-gated step), `start` begins
/// delivering frames, `release` stops everything. A source can be opened
/// again after `release` for the next session.
pub trait CaptureSource {
    fn open(&mut self) -> Result<(), VoiceError>;

    /// Deliver frames of exactly `frame_size` samples at the capture rate
    fn start(&mut self, frame_size: usize, on_frame: FrameCallback) -> Result<(), VoiceError>;

    /// Stop the stream and drop the device; a no-op when nothing was acquired
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

#[cfg(feature = "device")]
pub use device::DeviceCapture;

#[cfg(feature = "device")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, Host, SampleFormat, Stream, SupportedStreamConfig};
    use parking_lot::Mutex;
    use std::sync::Arc;

    use super::{CaptureSource, FrameCallback, Framer};
    use crate::audio::CAPTURE_SAMPLE_RATE;
    use crate::error::VoiceError;

    /// Microphone capture using cpal, downmixed and resampled to the capture rate
    pub struct DeviceCapture {
        host: Host,
        target_rate: u32,
        device: Option<(Device, SupportedStreamConfig)>,
        stream: Option<Stream>,
    }

    impl DeviceCapture {
        pub fn new(target_rate: u32) -> Self {
            Self {
                host: cpal::default_host(),
                target_rate,
                device: None,
                stream: None,
            }
        }
    }

    impl Default for DeviceCapture {
        fn default() -> Self {
            Self::new(CAPTURE_SAMPLE_RATE)
        }
    }

    impl CaptureSource for DeviceCapture {
        fn open(&mut self) -> Result<(), VoiceError> {
            let device = self
                .host
                .default_input_device()
                .ok_or_else(|| VoiceError::Permission("no input device available".to_string()))?;

            let config = device.default_input_config().map_err(|e| {
                VoiceError::Permission(format!("failed to get input config: {}", e))
            })?;

            tracing::info!(
                "Using input device: {} ({} Hz, {} channels, {:?})",
                device.name().unwrap_or_default(),
                config.sample_rate().0,
                config.channels(),
                config.sample_format()
            );

            self.device = Some((device, config));
            Ok(())
        }

        fn start(&mut self, frame_size: usize, on_frame: FrameCallback) -> Result<(), VoiceError> {
            let (device, supported) = self
                .device
                .as_ref()
                .ok_or_else(|| VoiceError::Permission("microphone not acquired".to_string()))?;

            let config = supported.config();
            let framer = Arc::new(Mutex::new(Framer::new(
                config.sample_rate.0,
                self.target_rate,
                config.channels as usize,
                frame_size,
                on_frame,
            )?));

            let err_fn = |err| {
                tracing::error!("Audio capture error: {}", err);
            };

            let stream = match supported.sample_format() {
                SampleFormat::F32 => {
                    let framer = framer.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            framer.lock().push(data);
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::I16 => {
                    let framer = framer.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let float_data: Vec<f32> =
                                data.iter().map(|&s| s as f32 / 32768.0).collect();
                            framer.lock().push(&float_data);
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::U16 => {
                    let framer = framer.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[u16], _: &cpal::InputCallbackInfo| {
                            let float_data: Vec<f32> = data
                                .iter()
                                .map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
                                .collect();
                            framer.lock().push(&float_data);
                        },
                        err_fn,
                        None,
                    )
                }
                format => {
                    return Err(VoiceError::Permission(format!(
                        "unsupported sample format: {:?}",
                        format
                    )));
                }
            }
            .map_err(|e| VoiceError::Permission(format!("failed to build input stream: {}", e)))?;

            stream
                .play()
                .map_err(|e| VoiceError::Permission(format!("failed to start capture: {}", e)))?;

            self.stream = Some(stream);
            tracing::info!("Audio capture started");
            Ok(())
        }

        fn release(&mut self) {
            if self.stream.take().is_some() {
                tracing::info!("Audio capture stopped");
            }
            self.device = None;
        }

        fn is_open(&self) -> bool {
            self.device.is_some()
        }
    }
}

/// Turns device-rate interleaved callbacks into fixed-size frames at the target rate
#[cfg_attr(not(feature = "device"), allow(dead_code))]
pub(crate) struct Framer {
    device_rate: u32,
    target_rate: u32,
    channels: usize,
    frame_size: usize,
    /// Device-rate samples needed for one target frame
    chunk: usize,
    buffer: Vec<f32>,
    on_frame: FrameCallback,
}

#[cfg_attr(not(feature = "device"), allow(dead_code))]
impl Framer {
    pub(crate) fn new(
        device_rate: u32,
        target_rate: u32,
        channels: usize,
        frame_size: usize,
        on_frame: FrameCallback,
    ) -> Result<Self, VoiceError> {
        if device_rate == 0 || target_rate == 0 || frame_size == 0 {
            return Err(VoiceError::Device(format!(
                "invalid capture format: {} Hz -> {} Hz, frame size {}",
                device_rate, target_rate, frame_size
            )));
        }

        let chunk = (frame_size as u64 * device_rate as u64).div_ceil(target_rate as u64) as usize;
        Ok(Self {
            device_rate,
            target_rate,
            channels: channels.max(1),
            frame_size,
            chunk,
            buffer: Vec::with_capacity(chunk * 2),
            on_frame,
        })
    }

    pub(crate) fn push(&mut self, data: &[f32]) {
        if self.channels > 1 {
            for frame in data.chunks(self.channels) {
                self.buffer.push(frame.iter().sum::<f32>() / frame.len() as f32);
            }
        } else {
            self.buffer.extend_from_slice(data);
        }

        while self.buffer.len() >= self.chunk {
            let raw: Vec<f32> = self.buffer.drain(..self.chunk).collect();
            let mut frame = resample(&raw, self.device_rate, self.target_rate);
            frame.resize(self.frame_size, 0.0);
            (self.on_frame)(frame);
        }
    }

    /// Device-rate samples waiting for the next frame
    pub(crate) fn pending(&self) -> usize {
        self.buffer.len()
    }
}
