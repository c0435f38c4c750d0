// analysis/mod.rs — Speech analysis trait + adapters

pub mod gemini;
mod prompt;
mod types;

pub use gemini::GeminiAnalyzer;
pub use types::{AnalysisError, AnalysisResult, GrammarError, ANALYSIS_FAILED_MESSAGE};

use crate::audio::EncodedAudio;
use async_trait::async_trait;

/// An external service that scores a spoken answer.
///
/// One call, one answer: implementations do not retry and never return a
/// partially filled result.
#[async_trait]
pub trait SpeechAnalyzer: Send + Sync {
    async fn analyze(&self, audio: &EncodedAudio) -> Result<AnalysisResult, AnalysisError>;

    /// Provider name
    fn name(&self) -> &str;
}
