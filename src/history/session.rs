use crate::analysis::AnalysisResult;
use crate::audio::encoder;
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed practice attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
}

impl Session {
    pub fn new(
        topic: impl Into<String>,
        audio_base64: Option<String>,
        analysis: Option<AnalysisResult>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            topic: topic.into(),
            audio_base64,
            analysis,
        }
    }

    pub fn recorded_at(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp).single()
    }

    /// The stored recording as WAV bytes, if there is one.
    pub fn audio_wav_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.audio_base64.as_deref().map(encoder::decode_base64)
    }
}
