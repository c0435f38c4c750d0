// analysis/types.rs — Feedback payload and client errors

use serde::{Deserialize, Serialize};

/// Message shown to the user for every analysis failure, whatever the cause.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze audio. Please try again.";

/// One correction suggested by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarError {
    pub original: String,
    pub correction: String,
    pub explanation: String,
}

/// Scores and feedback for one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub transcript: String,
    /// 0 - 100
    pub fluency_score: u8,
    /// 0 - 100
    pub vocab_score: u8,
    pub grammar_errors: Vec<GrammarError>,
    pub general_suggestions: String,
}

/// Wire shape of the model's answer. Scores come back as JSON numbers and
/// are checked before they become an [`AnalysisResult`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    transcript: String,
    fluency_score: f64,
    vocab_score: f64,
    grammar_errors: Vec<GrammarError>,
    general_suggestions: String,
}

impl AnalysisResult {
    /// Parse the model's JSON text. All five fields are required and both
    /// scores must lie in 0..=100; anything else is rejected whole.
    pub fn from_response_text(text: &str) -> Result<Self, AnalysisError> {
        let raw: RawAnalysis = serde_json::from_str(text.trim())
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        Ok(Self {
            transcript: raw.transcript,
            fluency_score: checked_score("fluencyScore", raw.fluency_score)?,
            vocab_score: checked_score("vocabScore", raw.vocab_score)?,
            grammar_errors: raw.grammar_errors,
            general_suggestions: raw.general_suggestions,
        })
    }
}

fn checked_score(field: &str, value: f64) -> Result<u8, AnalysisError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(AnalysisError::MalformedResponse(format!(
            "{} out of range: {}",
            field, value
        )));
    }
    Ok(value.round() as u8)
}

/// Analysis client errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No API key configured for the analysis provider")]
    MissingCredential,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::NetworkError(_) | AnalysisError::Timeout)
    }
}
