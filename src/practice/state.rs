use crate::analysis::AnalysisResult;
use crate::audio::{ElapsedCounter, EncodedAudio};
use crate::practice::PracticeError;

/// What the practice screen is showing, and therefore what may happen next.
#[derive(Debug, Clone)]
pub enum ViewState {
    Idle {
        topic: String,
    },
    Recording {
        topic: String,
        elapsed: ElapsedCounter,
    },
    Analyzing {
        topic: String,
        pending_audio: EncodedAudio,
    },
    Result {
        topic: String,
        analysis: AnalysisResult,
        audio: Option<EncodedAudio>,
    },
    Error {
        topic: String,
        error: PracticeError,
    },
}

impl ViewState {
    pub fn idle(topic: impl Into<String>) -> Self {
        ViewState::Idle {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            ViewState::Idle { topic }
            | ViewState::Recording { topic, .. }
            | ViewState::Analyzing { topic, .. }
            | ViewState::Result { topic, .. }
            | ViewState::Error { topic, .. } => topic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Idle { .. } => "idle",
            ViewState::Recording { .. } => "recording",
            ViewState::Analyzing { .. } => "analyzing",
            ViewState::Result { .. } => "showing a result",
            ViewState::Error { .. } => "showing an error",
        }
    }

    /// Live seconds while recording.
    pub fn elapsed_seconds(&self) -> Option<u32> {
        match self {
            ViewState::Recording { elapsed, .. } => Some(elapsed.seconds()),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            ViewState::Error { error, .. } => Some(error.to_string()),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ViewState::Recording { .. } | ViewState::Analyzing { .. })
    }
}
