use crate::audio::capture::device_display_name;
use crate::audio::AudioBuffer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("No output device available")]
    NoOutputDevice,

    #[error("Audio output failed: {0}")]
    Device(String),

    #[error("Unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Nothing is loaded for playback")]
    NothingLoaded,
}

/// Shared read head over a decoded recording. The output callback pulls
/// frames through it while the shell pauses and seeks.
#[derive(Clone)]
pub struct PlaybackFeed {
    audio: Arc<AudioBuffer>,
    /// Position in source frames; fractional when the device rate differs.
    cursor: Arc<Mutex<f64>>,
    paused: Arc<AtomicBool>,
}

impl PlaybackFeed {
    pub fn new(audio: AudioBuffer) -> Self {
        Self {
            audio: Arc::new(audio),
            cursor: Arc::new(Mutex::new(0.0)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    fn frames(&self) -> usize {
        self.audio.samples.len() / self.audio.channels.max(1) as usize
    }

    fn cursor(&self) -> f64 {
        self.cursor.lock().map(|c| *c).unwrap_or(0.0)
    }

    pub fn duration_secs(&self) -> f32 {
        self.audio.duration_secs
    }

    pub fn position_secs(&self) -> f32 {
        (self.cursor() / self.audio.sample_rate.max(1) as f64) as f32
    }

    pub fn is_finished(&self) -> bool {
        self.cursor() as usize >= self.frames()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Move the read head, clamped to the recording. Returns the new position.
    pub fn seek(&self, secs: f32) -> f32 {
        let frame = (secs.max(0.0) as f64 * self.audio.sample_rate as f64).min(self.frames() as f64);
        if let Ok(mut cursor) = self.cursor.lock() {
            *cursor = frame;
        }
        self.position_secs()
    }

    pub fn fill_f32(&self, out: &mut [f32], out_channels: u16, out_rate: u32) {
        self.fill(out, out_channels, out_rate, 0.0, |s| s as f32 / i16::MAX as f32);
    }

    pub fn fill_i16(&self, out: &mut [i16], out_channels: u16, out_rate: u32) {
        self.fill(out, out_channels, out_rate, 0, |s| s);
    }

    /// Write interleaved frames for a device with `out_channels` at
    /// `out_rate`. Mono sources are copied to every output channel; the rate
    /// is matched by stepping the read head (nearest sample).
    fn fill<T: Copy>(&self, out: &mut [T], out_channels: u16, out_rate: u32, silence: T, convert: fn(i16) -> T) {
        if self.is_paused() {
            out.fill(silence);
            return;
        }
        let Ok(mut cursor) = self.cursor.lock() else {
            out.fill(silence);
            return;
        };

        let frames = self.frames();
        let source_channels = self.audio.channels.max(1) as usize;
        let step = self.audio.sample_rate as f64 / out_rate.max(1) as f64;

        for frame in out.chunks_mut(out_channels.max(1) as usize) {
            let index = *cursor as usize;
            if index >= frames {
                frame.fill(silence);
                continue;
            }
            for (channel, sample) in frame.iter_mut().enumerate() {
                let source = self.audio.samples[index * source_channels + channel.min(source_channels - 1)];
                *sample = convert(source);
            }
            *cursor = (*cursor + step).min(frames as f64);
        }
    }
}

/// A speaker-like device that pulls frames from a feed while open.
pub trait AudioSink {
    fn open(&mut self, feed: PlaybackFeed) -> Result<(), PlaybackError>;

    fn close(&mut self);
}

/// The default output device, through cpal.
#[derive(Default)]
pub struct SpeakerSink {
    stream: Option<cpal::Stream>,
}

impl SpeakerSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for SpeakerSink {
    fn open(&mut self, feed: PlaybackFeed) -> Result<(), PlaybackError> {
        self.close();

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoOutputDevice)?;
        info!("Output device: {}", device_display_name(&device));

        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        let channels = config.channels();
        let rate = config.sample_rate();

        let err_fn = |err| error!("Audio output stream error: {}", err);
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feed.fill_f32(data, channels, rate),
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| feed.fill_i16(data, channels, rate),
                err_fn,
                None,
            ),
            other => return Err(PlaybackError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

        stream.play().map_err(|e| PlaybackError::Device(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            info!("Output stream closed");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub label: String,
    pub position_secs: f32,
    pub duration_secs: f32,
    pub paused: bool,
    pub finished: bool,
}

struct Loaded {
    source: String,
    label: String,
    feed: PlaybackFeed,
}

/// Plays one recording at a time with pause and seek.
pub struct Player {
    sink: Box<dyn AudioSink>,
    loaded: Option<Loaded>,
}

impl Player {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self { sink, loaded: None }
    }

    /// Start `audio` from the beginning, replacing whatever was loaded.
    /// `source` identifies the recording (a session id) for later lookups.
    pub fn play(
        &mut self,
        source: impl Into<String>,
        label: impl Into<String>,
        audio: AudioBuffer,
    ) -> Result<(), PlaybackError> {
        self.stop();

        let feed = PlaybackFeed::new(audio);
        self.sink.open(feed.clone())?;

        let loaded = Loaded {
            source: source.into(),
            label: label.into(),
            feed,
        };
        info!(
            "Playing {} ({:.1}s)",
            loaded.source,
            loaded.feed.duration_secs()
        );
        self.loaded = Some(loaded);
        Ok(())
    }

    /// Pause or resume. A finished recording starts over. Returns whether
    /// playback is now paused.
    pub fn toggle_pause(&mut self) -> Result<bool, PlaybackError> {
        let loaded = self.loaded.as_ref().ok_or(PlaybackError::NothingLoaded)?;
        let feed = &loaded.feed;

        if feed.is_finished() {
            feed.seek(0.0);
            feed.set_paused(false);
            return Ok(false);
        }

        let paused = !feed.is_paused();
        feed.set_paused(paused);
        Ok(paused)
    }

    pub fn seek(&mut self, secs: f32) -> Result<f32, PlaybackError> {
        let loaded = self.loaded.as_ref().ok_or(PlaybackError::NothingLoaded)?;
        Ok(loaded.feed.seek(secs))
    }

    /// Release the output device. Returns false when nothing was loaded.
    pub fn stop(&mut self) -> bool {
        match self.loaded.take() {
            Some(loaded) => {
                self.sink.close();
                info!("Playback of {} stopped", loaded.source);
                true
            }
            None => false,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.source.as_str())
    }

    pub fn status(&self) -> Option<PlaybackStatus> {
        self.loaded.as_ref().map(|loaded| PlaybackStatus {
            label: loaded.label.clone(),
            position_secs: loaded.feed.position_secs(),
            duration_secs: loaded.feed.duration_secs(),
            paused: loaded.feed.is_paused(),
            finished: loaded.feed.is_finished(),
        })
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::ScriptedSink;

    fn ramp(sample_rate: u32, channels: u16, frames: usize) -> AudioBuffer {
        let samples = (0..frames * channels as usize).map(|i| i as i16).collect::<Vec<_>>();
        AudioBuffer::from_chunks(sample_rate, channels, vec![samples])
    }

    #[test]
    fn test_mono_is_copied_to_both_channels() {
        let feed = PlaybackFeed::new(ramp(8_000, 1, 4));
        let mut out = [0i16; 8];
        feed.fill_i16(&mut out, 2, 8_000);
        assert_eq!(out, [0, 0, 1, 1, 2, 2, 3, 3]);
        assert!(feed.is_finished());
    }

    #[test]
    fn test_past_the_end_is_silence() {
        let feed = PlaybackFeed::new(ramp(8_000, 1, 2));
        let mut out = [7i16; 4];
        feed.fill_i16(&mut out, 1, 8_000);
        assert_eq!(out, [0, 1, 0, 0]);
    }

    #[test]
    fn test_higher_device_rate_repeats_frames() {
        let feed = PlaybackFeed::new(ramp(8_000, 1, 3));
        let mut out = [0i16; 6];
        feed.fill_i16(&mut out, 1, 16_000);
        assert_eq!(out, [0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_paused_feed_holds_position() {
        let feed = PlaybackFeed::new(ramp(8_000, 1, 8_000));
        feed.set_paused(true);
        let mut out = [1.0f32; 16];
        feed.fill_f32(&mut out, 1, 8_000);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(feed.position_secs(), 0.0);
    }

    #[test]
    fn test_seek_is_clamped() {
        let feed = PlaybackFeed::new(ramp(8_000, 1, 16_000));
        assert!((feed.seek(1.5) - 1.5).abs() < 1e-6);
        assert!((feed.seek(60.0) - 2.0).abs() < 1e-6);
        assert!(feed.is_finished());
        assert_eq!(feed.seek(-3.0), 0.0);
    }

    #[test]
    fn test_player_pause_resume_and_stop() {
        let sink = ScriptedSink::default();
        let mut player = Player::new(Box::new(sink.clone()));
        assert!(matches!(player.toggle_pause(), Err(PlaybackError::NothingLoaded)));

        player.play("abc", "Weekends", ramp(8_000, 1, 8_000)).unwrap();
        assert!(sink.is_open());
        assert_eq!(player.source(), Some("abc"));

        assert!(player.toggle_pause().unwrap());
        assert!(player.status().unwrap().paused);
        assert!(!player.toggle_pause().unwrap());

        assert!(player.stop());
        assert!(!sink.is_open());
        assert!(player.status().is_none());
        assert!(!player.stop());
    }

    #[test]
    fn test_device_pull_advances_status() {
        let sink = ScriptedSink::default();
        let mut player = Player::new(Box::new(sink.clone()));
        player.play("abc", "Weekends", ramp(8_000, 1, 8_000)).unwrap();

        sink.pull(4_000, 8_000);
        let status = player.status().unwrap();
        assert!((status.position_secs - 0.5).abs() < 1e-6);
        assert!((status.duration_secs - 1.0).abs() < 1e-6);

        sink.pull(8_000, 8_000);
        assert!(player.status().unwrap().finished);

        // Resuming a finished recording starts over.
        assert!(!player.toggle_pause().unwrap());
        assert_eq!(player.status().unwrap().position_secs, 0.0);
    }

    #[test]
    fn test_new_recording_replaces_old() {
        let sink = ScriptedSink::default();
        let mut player = Player::new(Box::new(sink.clone()));
        player.play("first", "One", ramp(8_000, 1, 10)).unwrap();
        player.play("second", "Two", ramp(8_000, 1, 10)).unwrap();

        assert_eq!(player.source(), Some("second"));
        assert_eq!(sink.opened(), 2);
        assert!(sink.is_open());
    }

    #[test]
    fn test_drop_releases_output() {
        let sink = ScriptedSink::default();
        let mut player = Player::new(Box::new(sink.clone()));
        player.play("abc", "Weekends", ramp(8_000, 1, 10)).unwrap();
        drop(player);
        assert!(!sink.is_open());
    }
}
