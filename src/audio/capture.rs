use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::mpsc;
use std::time::Duration;

use super::resampler::{mix_to_mono, Resampler};
use super::source::{CaptureStream, InputSource};
use super::wav::{samples_to_le_bytes, WavSpec};
use crate::error::AppError;

/// How long a read waits for the device callback before reporting an empty read.
const POLL_WINDOW: Duration = Duration::from_millis(50);

/// One cpal input device, opened lazily by the recorder's fallback loop.
pub struct CpalInput {
    name: String,
    /// `None` means "whatever the host reports as default at open time".
    device_name: Option<String>,
}

impl CpalInput {
    pub fn default_device() -> Self {
        Self {
            name: "default".into(),
            device_name: None,
        }
    }

    fn find_device(&self) -> Result<Device, AppError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| AppError::Audio("No input device available".into())),
            Some(wanted) => host
                .input_devices()
                .map_err(|e| AppError::Audio(format!("Failed to list input devices: {e}")))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| AppError::Audio(format!("Input device vanished: {wanted}"))),
        }
    }
}

/// Input sources in priority order: the host default first, then every
/// other input device the host enumerates.
pub fn input_sources() -> Vec<Box<dyn InputSource>> {
    let mut sources: Vec<Box<dyn InputSource>> = vec![Box::new(CpalInput::default_device())];

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            let Ok(name) = device.name() else { continue };
            if Some(&name) == default_name.as_ref() {
                continue;
            }
            sources.push(Box::new(CpalInput {
                name: name.clone(),
                device_name: Some(name),
            }));
        }
    }
    sources
}

impl InputSource for CpalInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn CaptureStream>, AppError> {
        let device = self.find_device()?;
        let config = device
            .default_input_config()
            .map_err(|e| AppError::Audio(format!("Failed to get input config: {e}")))?;

        let source_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let target_rate = WavSpec::RECOGNITION.sample_rate;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let mut resampler = Resampler::new(source_rate, target_rate);

        let stream_config = StreamConfig {
            channels: config.channels(),
            sample_rate: SampleRate(source_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err| tracing::warn!("[recording] audio stream error: {err}");

        let stream = match config.sample_format() {
            SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let mono = mix_to_mono(data, channels);
                        let resampled = resampler.resample(&mono);
                        if !resampled.is_empty() {
                            let _ = tx.send(samples_to_le_bytes(&resampled));
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AppError::Audio(format!("Failed to build stream: {e}")))?,
            SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        // Convert f32 -> i16, then mix to mono
                        let samples: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let mono = mix_to_mono(&samples, channels);
                        let resampled = resampler.resample(&mono);
                        if !resampled.is_empty() {
                            let _ = tx.send(samples_to_le_bytes(&resampled));
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AppError::Audio(format!("Failed to build stream: {e}")))?,
            format => {
                return Err(AppError::Audio(format!(
                    "Unsupported sample format: {format:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AppError::Audio(format!("Failed to start stream: {e}")))?;

        Ok(Box::new(CpalStream {
            _stream: stream,
            receiver: rx,
            pending: Vec::new(),
        }))
    }
}

/// Keeps the cpal stream alive and drains its callback channel.
struct CpalStream {
    _stream: Stream,
    receiver: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl CaptureStream for CpalStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AppError> {
        if self.pending.is_empty() {
            match self.receiver.recv_timeout(POLL_WINDOW) {
                Ok(chunk) => self.pending = chunk,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(0),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(AppError::Audio("Audio stream closed".into()))
                }
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}
