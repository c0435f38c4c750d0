use crate::audio::AudioChunk;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

/// Shape of the samples a source delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Microphone refused: {0}")]
    AccessRefused(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// A microphone-like device that pushes sample chunks while open.
///
/// `open` acquires the device and must not block; chunks arrive on `sink`
/// from whatever thread the platform uses for callbacks. `close` releases
/// the device and is safe to call when already closed.
pub trait AudioSource {
    fn open(&mut self, sink: UnboundedSender<AudioChunk>) -> Result<StreamFormat, CaptureError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// The system microphone, through cpal.
pub struct MicrophoneSource {
    stream: Option<cpal::Stream>,
    preferred_device: Option<String>,
}

impl MicrophoneSource {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            stream: None,
            preferred_device: preferred_device
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }

    pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let mut devices = host
            .input_devices()
            .map_err(|e| CaptureError::AccessRefused(e.to_string()))?
            .map(|device| device_display_name(&device))
            .collect::<Vec<_>>();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }

    fn pick_input_device(host: &cpal::Host, preferred_name: Option<&str>) -> Option<cpal::Device> {
        if let Some(name) = preferred_name {
            if let Ok(mut devices) = host.input_devices() {
                if let Some(device) = devices.find(|d| device_display_name(d) == name) {
                    return Some(device);
                }
            }
            tracing::warn!(
                "Preferred input device '{}' not found, falling back to default",
                name
            );
        }

        let default_device = host.default_input_device()?;
        let default_name = device_display_name(&default_device);
        if !looks_like_loopback(&default_name) {
            return Some(default_device);
        }

        tracing::warn!(
            "Default device '{}' looks like loopback, trying to pick a microphone input",
            default_name
        );

        if let Ok(mut devices) = host.input_devices() {
            if let Some(alternative) = devices.find(|d| !looks_like_loopback(&device_display_name(d))) {
                return Some(alternative);
            }
        }

        Some(default_device)
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&mut self, sink: UnboundedSender<AudioChunk>) -> Result<StreamFormat, CaptureError> {
        let host = cpal::default_host();
        let device = Self::pick_input_device(&host, self.preferred_device.as_deref())
            .ok_or(CaptureError::NoInputDevice)?;

        info!("Input device: {}", device_display_name(&device));

        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::AccessRefused(e.to_string()))?;
        let format = StreamFormat {
            sample_rate: config.sample_rate(),
            channels: config.channels(),
        };

        let err_fn = |err| error!("an error occurred on stream: {}", err);
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &_| {
                    let _ = sink.send(data.to_vec());
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| {
                    let _ = sink.send(f32_to_i16(data));
                },
                err_fn,
                None,
            ),
            other => return Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| CaptureError::AccessRefused(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::AccessRefused(e.to_string()))?;
        self.stream = Some(stream);

        Ok(format)
    }

    fn close(&mut self) {
        // Dropping the stream releases the device handle.
        if self.stream.take().is_some() {
            info!("Input stream closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

pub(crate) fn device_display_name(device: &cpal::Device) -> String {
    device
        .name()
        .or_else(|_| device.description().map(|d| d.name().to_string()))
        .unwrap_or_else(|_| "Unknown input".to_string())
}

fn looks_like_loopback(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let patterns = [
        "stereo mix",
        "what u hear",
        "wave out",
        "loopback",
        "monitor",
    ];
    patterns.iter().any(|p| lower.contains(p))
}

fn f32_to_i16(input: &[f32]) -> AudioChunk {
    input
        .iter()
        .map(|&x| (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_names_are_detected() {
        assert!(looks_like_loopback("Stereo Mix (Realtek Audio)"));
        assert!(looks_like_loopback("Monitor of Built-in Audio"));
        assert!(!looks_like_loopback("USB Microphone"));
    }

    #[test]
    fn test_f32_samples_are_clamped() {
        let converted = f32_to_i16(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(converted, vec![0, i16::MAX, -i16::MAX, i16::MAX]);
    }

    #[test]
    fn test_blank_preferred_device_is_ignored() {
        let source = MicrophoneSource::new(Some("   ".to_string()));
        assert!(source.preferred_device.is_none());
        assert!(!source.is_open());
    }
}
