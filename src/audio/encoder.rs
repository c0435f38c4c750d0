use crate::audio::AudioBuffer;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const WAV_MIME_TYPE: &str = "audio/wav";

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("Not a RIFF/WAVE file")]
    NotWav,

    #[error("Unsupported WAV encoding: {0}")]
    Unsupported(String),

    #[error("WAV file has no '{0}' chunk")]
    MissingChunk(&'static str),
}

/// A finished recording in a form that can be sent over the wire and stored
/// as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAudio {
    pub base64: String,
    pub mime_type: String,
    pub duration_secs: f32,
}

impl EncodedAudio {
    pub fn from_buffer(audio: &AudioBuffer) -> Self {
        Self {
            base64: BASE64_STANDARD.encode(to_wav_bytes(audio)),
            mime_type: WAV_MIME_TYPE.to_string(),
            duration_secs: audio.duration_secs,
        }
    }
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD.decode(data.trim())
}

/// 16-bit PCM WAV bytes for the buffer.
pub fn to_wav_bytes(audio: &AudioBuffer) -> Vec<u8> {
    let sample_rate = audio.sample_rate;
    let channels = audio.channels.max(1);
    let samples = &audio.samples;

    let mut wav = Vec::with_capacity(44 + samples.len() * 2);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    let file_size = (36 + samples.len() * 2) as u32;
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * channels as u32 * 2;
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&(channels * 2).to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    wav.extend_from_slice(b"data");
    let data_size = (samples.len() * 2) as u32;
    wav.extend_from_slice(&data_size.to_le_bytes());

    for &sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

/// Read 16-bit PCM WAV bytes back into a buffer. Unknown chunks are skipped
/// and a data chunk longer than the file is cut to what is there.
pub fn from_wav_bytes(bytes: &[u8]) -> Result<AudioBuffer, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotWav);
    }

    let mut format: Option<(u16, u32)> = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = le_u32(&bytes[offset + 4..]) as usize;
        let body_start = offset + 8;
        let body = &bytes[body_start..body_start.saturating_add(size).min(bytes.len())];

        match id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(WavError::Unsupported("short fmt chunk".to_string()));
                }
                let audio_format = le_u16(&body[0..]);
                let channels = le_u16(&body[2..]);
                let sample_rate = le_u32(&body[4..]);
                let bits = le_u16(&body[14..]);
                if audio_format != 1 || bits != 16 {
                    return Err(WavError::Unsupported(format!(
                        "format {} with {} bits per sample",
                        audio_format, bits
                    )));
                }
                if channels == 0 || sample_rate == 0 {
                    return Err(WavError::Unsupported(format!(
                        "{} channel(s) at {} Hz",
                        channels, sample_rate
                    )));
                }
                format = Some((channels, sample_rate));
            }
            b"data" => {
                let (channels, sample_rate) = format.ok_or(WavError::MissingChunk("fmt "))?;
                let samples = body
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let mut buffer = AudioBuffer::new(sample_rate, channels);
                buffer.samples = samples;
                buffer.update_duration();
                return Ok(buffer);
            }
            _ => {}
        }

        // Chunks are word aligned.
        offset = body_start.saturating_add(size).saturating_add(size & 1);
    }

    Err(WavError::MissingChunk("data"))
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
