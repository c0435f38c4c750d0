use crate::analysis::{AnalysisError, AnalysisResult, SpeechAnalyzer, ANALYSIS_FAILED_MESSAGE};
use crate::audio::{EncodedAudio, RecorderError, RecordingController};
use crate::history::{History, Session};
use std::sync::Arc;
use std::time::Duration;

pub mod retry;
mod state;
pub mod topics;

pub use retry::RetryPolicy;
pub use state::ViewState;

const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(90);

/// Failures the practice flow can run into. The `Display` text of the
/// recoverable ones is what the user sees; the detail is for logs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PracticeError {
    #[error("Microphone access denied. Please allow microphone permissions.")]
    PermissionDenied { reason: String },

    #[error("{}", ANALYSIS_FAILED_MESSAGE)]
    AnalysisFailure { reason: String },

    #[error("Failed to process the recording. Please try again.")]
    RecordingFailure { reason: String },

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// The recording → analysis → result loop of the practice screen.
///
/// History is not owned here; operations that finish a session borrow it.
pub struct PracticeSession {
    state: ViewState,
    recorder: RecordingController,
    analyzer: Arc<dyn SpeechAnalyzer>,
    retry: RetryPolicy,
    timeout: Duration,
    /// Bumped whenever an analysis is started or abandoned, so a late
    /// outcome can be told apart from the current one.
    generation: u64,
}

/// One analysis request, detached from the session so it can run while the
/// user keeps interacting.
pub struct AnalysisJob {
    generation: u64,
    audio: EncodedAudio,
    analyzer: Arc<dyn SpeechAnalyzer>,
    retry: RetryPolicy,
    timeout: Duration,
}

pub struct AnalysisOutcome {
    generation: u64,
    result: Result<AnalysisResult, AnalysisError>,
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl AnalysisJob {
    pub async fn run(self) -> AnalysisOutcome {
        let mut attempt = 0u8;

        let result = loop {
            tracing::info!(
                "Analysis attempt {}/{} via {}",
                attempt + 1,
                self.retry.max_retries() + 1,
                self.analyzer.name()
            );

            let result = match tokio::time::timeout(self.timeout, self.analyzer.analyze(&self.audio)).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::Timeout),
            };

            match result {
                Ok(analysis) => break Ok(analysis),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    tracing::warn!("Analysis attempt {} failed: {}", attempt + 1, e);
                    self.retry.wait_before_retry(attempt).await;
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        AnalysisOutcome {
            generation: self.generation,
            result,
        }
    }
}

impl PracticeSession {
    pub fn new(recorder: RecordingController, analyzer: Arc<dyn SpeechAnalyzer>) -> Self {
        Self {
            state: ViewState::idle(topics::default_topic()),
            recorder,
            analyzer,
            retry: RetryPolicy::none(),
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
            generation: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn topic(&self) -> &str {
        self.state.topic()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, ViewState::Recording { .. })
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, ViewState::Analyzing { .. })
    }

    /// Free-text topic edit.
    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), PracticeError> {
        self.change_topic("change the topic", topic.into())
    }

    pub fn shuffle_topic(&mut self) -> Result<(), PracticeError> {
        self.shuffle_topic_with(&mut rand::thread_rng())
    }

    pub fn shuffle_topic_with<R: rand::Rng>(&mut self, rng: &mut R) -> Result<(), PracticeError> {
        let topic = topics::random_topic(rng).to_string();
        self.change_topic("shuffle the topic", topic)
    }

    pub fn todays_topic(&mut self) -> Result<(), PracticeError> {
        self.change_topic("pick today's topic", topics::todays_topic())
    }

    fn change_topic(&mut self, action: &'static str, topic: String) -> Result<(), PracticeError> {
        if self.state.is_busy() {
            return Err(self.invalid(action));
        }
        // Leaving a result or error screen discards it, as a reset does.
        self.state = ViewState::idle(topic);
        Ok(())
    }

    pub fn start_recording(&mut self) -> Result<(), PracticeError> {
        if !matches!(self.state, ViewState::Idle { .. }) {
            return Err(self.invalid("start recording"));
        }

        let topic = self.state.topic().to_string();
        match self.recorder.start() {
            Ok(()) => {
                tracing::info!("Recording answer to: {}", topic);
                self.state = ViewState::Recording {
                    topic,
                    elapsed: self.recorder.elapsed(),
                };
            }
            Err(RecorderError::AlreadyCapturing) => return Err(self.invalid("start recording")),
            Err(e) => {
                tracing::warn!("Recording could not start: {}", e);
                self.state = ViewState::Error {
                    topic,
                    error: PracticeError::PermissionDenied {
                        reason: e.to_string(),
                    },
                };
            }
        }
        Ok(())
    }

    /// Stop recording and move to `Analyzing`. The returned job performs the
    /// request; hand its outcome to [`complete_analysis`](Self::complete_analysis).
    ///
    /// Does nothing when not recording.
    pub async fn stop_recording(&mut self) -> Result<Option<AnalysisJob>, PracticeError> {
        if !self.is_recording() {
            tracing::debug!("Stop requested while {}, ignoring", self.state.name());
            return Ok(None);
        }

        let topic = self.state.topic().to_string();
        let audio = match self.recorder.stop().await {
            Ok(Some(audio)) => audio,
            Ok(None) => {
                self.fail(topic, "recorder was not capturing".to_string());
                return Ok(None);
            }
            Err(e) => {
                self.fail(topic, e.to_string());
                return Ok(None);
            }
        };

        self.generation += 1;
        let job = AnalysisJob {
            generation: self.generation,
            audio: audio.clone(),
            analyzer: self.analyzer.clone(),
            retry: self.retry.clone(),
            timeout: self.timeout,
        };
        self.state = ViewState::Analyzing {
            topic,
            pending_audio: audio,
        };
        Ok(Some(job))
    }

    /// Apply a finished analysis. Returns false when the outcome belongs to
    /// an abandoned request and was dropped.
    pub fn complete_analysis(&mut self, outcome: AnalysisOutcome, history: &mut History) -> bool {
        if outcome.generation != self.generation || !self.is_analyzing() {
            tracing::debug!(
                "Discarding stale analysis outcome (generation {}, current {})",
                outcome.generation,
                self.generation
            );
            return false;
        }

        let placeholder = ViewState::idle(String::new());
        let ViewState::Analyzing { topic, pending_audio } = std::mem::replace(&mut self.state, placeholder) else {
            return false;
        };

        self.state = match outcome.result {
            Ok(analysis) => {
                let session = Session::new(
                    topic.clone(),
                    Some(pending_audio.base64.clone()),
                    Some(analysis.clone()),
                );
                history.append(session);
                ViewState::Result {
                    topic,
                    analysis,
                    audio: Some(pending_audio),
                }
            }
            Err(e) => {
                tracing::error!("Analysis failed: {}", e);
                ViewState::Error {
                    topic,
                    error: PracticeError::AnalysisFailure {
                        reason: e.to_string(),
                    },
                }
            }
        };
        true
    }

    /// Stop, analyze, and record the session in one go.
    pub async fn finish_recording(&mut self, history: &mut History) -> Result<(), PracticeError> {
        if let Some(job) = self.stop_recording().await? {
            let outcome = job.run().await;
            self.complete_analysis(outcome, history);
        }
        Ok(())
    }

    /// Back to practice: leave a result, an error, or a pending analysis and
    /// return to `Idle` with the same topic.
    pub fn reset(&mut self) -> Result<(), PracticeError> {
        match self.state {
            ViewState::Idle { .. } => Ok(()),
            ViewState::Recording { .. } => Err(self.invalid("go back")),
            ViewState::Analyzing { .. } => {
                tracing::info!("Analysis abandoned");
                self.generation += 1;
                self.state = ViewState::idle(self.state.topic().to_string());
                Ok(())
            }
            ViewState::Result { .. } | ViewState::Error { .. } => {
                self.state = ViewState::idle(self.state.topic().to_string());
                Ok(())
            }
        }
    }

    fn fail(&mut self, topic: String, reason: String) {
        tracing::error!("Recording could not be processed: {}", reason);
        self.state = ViewState::Error {
            topic,
            error: PracticeError::RecordingFailure { reason },
        };
    }

    fn invalid(&self, action: &'static str) -> PracticeError {
        PracticeError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
