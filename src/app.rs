use crate::audio::encoder::{self, from_wav_bytes};
use crate::audio::{PlaybackError, PlaybackStatus, Player, SpeakerSink, WavError};
use crate::history::{History, Session};
use crate::practice::{AnalysisJob, AnalysisOutcome, PracticeError, PracticeSession, ViewState};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Practice,
    History,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No session with id {0}")]
    NotFound(String),

    #[error("Session {0} has no recording")]
    NoAudio(String),

    #[error("Stored recording is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write recording: {0}")]
    Io(#[from] std::io::Error),
}

/// Playback source name for the recording on the result screen.
pub const RESULT_SOURCE: &str = "result";

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("No session with id {0}")]
    NotFound(String),

    #[error("Session {0} has no recording")]
    NoAudio(String),

    #[error("Nothing to play here. Open a session or finish a recording first")]
    NothingToPlay,

    #[error("Stored recording is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Stored recording is not playable: {0}")]
    Wav(#[from] WavError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Application state: the history collection, the practice flow, and which
/// view is in front.
pub struct App {
    tab: Tab,
    history: History,
    practice: PracticeSession,
    selected: Option<String>,
    player: Player,
}

impl App {
    pub fn new(history: History, practice: PracticeSession) -> Self {
        Self {
            tab: Tab::Practice,
            history,
            practice,
            selected: None,
            player: Player::new(Box::new(SpeakerSink::new())),
        }
    }

    pub fn with_player(mut self, player: Player) -> Self {
        self.player = player;
        self
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.selected = None;
        }
        self.tab = tab;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn practice(&self) -> &PracticeSession {
        &self.practice
    }

    pub fn practice_mut(&mut self) -> &mut PracticeSession {
        &mut self.practice
    }

    /// Playback is stopped first so the answer is not recorded over it.
    pub fn start_recording(&mut self) -> Result<(), PracticeError> {
        self.select_tab(Tab::Practice);
        self.player.stop();
        self.practice.start_recording()
    }

    pub async fn stop_recording(&mut self) -> Result<Option<AnalysisJob>, PracticeError> {
        self.practice.stop_recording().await
    }

    pub fn complete_analysis(&mut self, outcome: AnalysisOutcome) -> bool {
        self.practice.complete_analysis(outcome, &mut self.history)
    }

    pub async fn finish_recording(&mut self) -> Result<(), PracticeError> {
        self.practice.finish_recording(&mut self.history).await
    }

    /// Show one stored session in the History view.
    pub fn open_session(&mut self, id: &str) -> bool {
        if self.history.get(id).is_none() {
            return false;
        }
        self.tab = Tab::History;
        self.selected = Some(id.to_string());
        true
    }

    pub fn close_session(&mut self) {
        self.selected = None;
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.selected.as_deref().and_then(|id| self.history.get(id))
    }

    pub fn delete_session(&mut self, id: &str) -> bool {
        let removed = self.history.remove(id).is_some();
        if removed && self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if removed && self.player.source() == Some(id) {
            self.player.stop();
        }
        removed
    }

    /// Resolve a user reference: a 1-based position in the list or an id.
    pub fn resolve_session(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if let Ok(position) = reference.parse::<usize>() {
            if let Some(session) = position
                .checked_sub(1)
                .and_then(|i| self.history.sessions().get(i))
            {
                return Some(session.id.clone());
            }
        }
        self.history.get(reference).map(|s| s.id.clone())
    }

    /// Play a stored session's recording from the start.
    pub fn play_session(&mut self, id: &str) -> Result<(), PlayError> {
        let session = self
            .history
            .get(id)
            .ok_or_else(|| PlayError::NotFound(id.to_string()))?;
        let bytes = session
            .audio_wav_bytes()
            .ok_or_else(|| PlayError::NoAudio(id.to_string()))??;
        let audio = from_wav_bytes(&bytes)?;
        let label = session.topic.clone();
        self.player.play(id, label, audio)?;
        Ok(())
    }

    /// Play whatever is on screen: the fresh result's recording on the
    /// Practice tab, the open session on the History tab.
    pub fn play_current(&mut self) -> Result<(), PlayError> {
        match self.tab {
            Tab::Practice => {
                let ViewState::Result {
                    topic,
                    audio: Some(audio),
                    ..
                } = self.practice.state()
                else {
                    return Err(PlayError::NothingToPlay);
                };
                let decoded = from_wav_bytes(&encoder::decode_base64(&audio.base64)?)?;
                let label = topic.clone();
                self.player.play(RESULT_SOURCE, label, decoded)?;
                Ok(())
            }
            Tab::History => {
                let id = self.selected.clone().ok_or(PlayError::NothingToPlay)?;
                self.play_session(&id)
            }
        }
    }

    /// Pause or resume. Returns whether playback is now paused.
    pub fn toggle_playback(&mut self) -> Result<bool, PlaybackError> {
        self.player.toggle_pause()
    }

    pub fn seek_playback(&mut self, secs: f32) -> Result<f32, PlaybackError> {
        self.player.seek(secs)
    }

    pub fn stop_playback(&mut self) -> bool {
        self.player.stop()
    }

    pub fn playback_status(&self) -> Option<PlaybackStatus> {
        self.player.status()
    }

    /// Write a stored recording out as a `.wav` file.
    pub fn export_audio(&self, id: &str, path: &Path) -> Result<PathBuf, ExportError> {
        let session = self
            .history
            .get(id)
            .ok_or_else(|| ExportError::NotFound(id.to_string()))?;
        let bytes = session
            .audio_wav_bytes()
            .ok_or_else(|| ExportError::NoAudio(id.to_string()))??;

        let path = if path.extension().is_none() {
            path.with_extension("wav")
        } else {
            path.to_path_buf()
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, bytes)?;
        tracing::info!("Exported recording of {} to {:?}", id, path);
        Ok(path)
    }
}
