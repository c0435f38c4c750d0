use serde::{Deserialize, Serialize};

/// One block of interleaved samples as delivered by the capture callback.
pub type AudioChunk = Vec<i16>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Cached duration in seconds
    #[serde(skip)]
    pub duration_secs: f32,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
            duration_secs: 0.0,
        }
    }

    /// Concatenate captured chunks, in arrival order, into one buffer.
    pub fn from_chunks<I>(sample_rate: u32, channels: u16, chunks: I) -> Self
    where
        I: IntoIterator<Item = AudioChunk>,
    {
        let mut buffer = Self::new(sample_rate, channels);
        for chunk in chunks {
            buffer.samples.extend_from_slice(&chunk);
        }
        buffer.update_duration();
        buffer
    }

    /// Recalculate and update duration_secs
    pub fn update_duration(&mut self) {
        if self.sample_rate == 0 {
            self.duration_secs = 0.0;
        } else {
            let channels = self.channels.max(1) as f32;
            self.duration_secs = self.samples.len() as f32 / (self.sample_rate as f32 * channels);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn append(&mut self, data: &[i16]) {
        self.samples.extend_from_slice(data);
        self.update_duration();
    }
}
