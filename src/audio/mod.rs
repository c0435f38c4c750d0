pub mod buffer;
pub mod capture;
pub mod encoder;
pub mod playback;

pub use buffer::{AudioBuffer, AudioChunk};
pub use capture::{AudioSource, CaptureError, MicrophoneSource, StreamFormat};
pub use encoder::{EncodedAudio, WavError};
pub use playback::{AudioSink, PlaybackError, PlaybackFeed, PlaybackStatus, Player, SpeakerSink};

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Capturing,
    Encoding,
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("Already recording")]
    AlreadyCapturing,

    #[error("Failed to encode recording: {0}")]
    Encoding(String),
}

/// Whole seconds spent capturing. Shared between the controller's ticker
/// task and whoever displays it.
#[derive(Debug, Clone, Default)]
pub struct ElapsedCounter(Arc<AtomicU32>);

impl ElapsedCounter {
    pub fn seconds(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Drives one capture at a time: `Idle -> Capturing -> Encoding -> Idle`.
///
/// Must be used from inside a tokio runtime; `start` spawns the elapsed-time
/// ticker.
pub struct RecordingController {
    source: Box<dyn AudioSource>,
    state: RecorderState,
    format: StreamFormat,
    chunks: Option<UnboundedReceiver<AudioChunk>>,
    elapsed: ElapsedCounter,
    ticker: Option<JoinHandle<()>>,
}

impl RecordingController {
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            source,
            state: RecorderState::Idle,
            format: StreamFormat::default(),
            chunks: None,
            elapsed: ElapsedCounter::default(),
            ticker: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == RecorderState::Capturing
    }

    pub fn elapsed(&self) -> ElapsedCounter {
        self.elapsed.clone()
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed.seconds()
    }

    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::AlreadyCapturing);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let format = match self.source.open(tx) {
            Ok(format) => format,
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                self.source.close();
                return Err(RecorderError::PermissionDenied(e.to_string()));
            }
        };

        info!(
            "Capture started: {} Hz, {} channel(s)",
            format.sample_rate, format.channels
        );

        self.format = format;
        self.chunks = Some(rx);
        self.elapsed.reset();
        self.ticker = Some(spawn_ticker(self.elapsed.clone()));
        self.state = RecorderState::Capturing;
        Ok(())
    }

    /// Stop capturing and encode what was buffered.
    ///
    /// Returns `Ok(None)` without touching anything when not capturing.
    pub async fn stop(&mut self) -> Result<Option<EncodedAudio>, RecorderError> {
        if self.state != RecorderState::Capturing {
            debug!("Stop requested while {:?}, ignoring", self.state);
            return Ok(None);
        }

        self.state = RecorderState::Encoding;
        self.stop_ticker();
        self.source.close();

        let mut chunks = Vec::new();
        if let Some(mut rx) = self.chunks.take() {
            rx.close();
            while let Ok(chunk) = rx.try_recv() {
                chunks.push(chunk);
            }
        }

        let format = self.format;
        let encoded = tokio::task::spawn_blocking(move || {
            let buffer = AudioBuffer::from_chunks(format.sample_rate, format.channels, chunks);
            EncodedAudio::from_buffer(&buffer)
        })
        .await;

        self.state = RecorderState::Idle;

        match encoded {
            Ok(audio) => {
                info!(
                    "Capture stopped after {}s, encoded {:.1}s of audio",
                    self.elapsed.seconds(),
                    audio.duration_secs
                );
                Ok(Some(audio))
            }
            Err(e) => Err(RecorderError::Encoding(e.to_string())),
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.stop_ticker();
        self.source.close();
    }
}

fn spawn_ticker(elapsed: ElapsedCounter) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(1);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            elapsed.increment();
        }
    })
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_three_seconds_then_stop_produces_audio() {
        let source = ScriptedSource::with_chunks(vec![vec![100; 4_000], vec![-100; 4_000]]);
        let mut recorder = RecordingController::new(Box::new(source.clone()));

        recorder.start().unwrap();
        assert!(recorder.is_capturing());
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(recorder.elapsed_seconds(), 3);

        let audio = recorder.stop().await.unwrap().expect("audio after stop");
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!((audio.duration_secs - 1.0).abs() < f32::EPSILON);
        let expected = EncodedAudio::from_buffer(&AudioBuffer::from_chunks(
            8_000,
            1,
            vec![vec![100; 4_000], vec![-100; 4_000]],
        ));
        assert_eq!(audio, expected);
        assert!(!source.is_open_now(), "device must be released after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_halts_on_stop() {
        let mut recorder = RecordingController::new(Box::new(ScriptedSource::with_chunks(vec![])));
        recorder.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        recorder.stop().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.elapsed_seconds(), 2);
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let source = ScriptedSource::with_chunks(vec![vec![1, 2, 3]]);
        let mut recorder = RecordingController::new(Box::new(source.clone()));

        assert!(recorder.stop().await.unwrap().is_none());
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(source.opened.load(Ordering::Relaxed), 0);

        recorder.start().unwrap();
        let first = recorder.stop().await.unwrap();
        assert!(first.is_some());
        assert!(recorder.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let source = ScriptedSource::with_chunks(vec![]);
        let mut recorder = RecordingController::new(Box::new(source.clone()));

        recorder.start().unwrap();
        assert!(matches!(recorder.start(), Err(RecorderError::AlreadyCapturing)));
        assert_eq!(source.opened.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_leaves_recorder_idle() {
        let mut recorder = RecordingController::new(Box::new(ScriptedSource::denied()));

        let err = recorder.start().unwrap_err();
        assert!(matches!(err, RecorderError::PermissionDenied(_)));
        assert_eq!(recorder.state(), RecorderState::Idle);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.elapsed_seconds(), 0, "no timer may run after a denied start");
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let source = ScriptedSource::with_chunks(vec![]);
        let mut recorder = RecordingController::new(Box::new(source.clone()));
        recorder.start().unwrap();
        assert!(source.is_open_now());

        drop(recorder);
        assert!(!source.is_open_now());
    }
}
