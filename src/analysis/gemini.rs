// analysis/gemini.rs — Google Gemini speech analysis adapter

use super::prompt::{response_schema, ANALYSIS_INSTRUCTIONS};
use super::{AnalysisError, AnalysisResult, SpeechAnalyzer};
use crate::audio::EncodedAudio;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Audio {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, Duration::from_secs(TIMEOUT_SECS))
    }

    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(audio: &EncodedAudio) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Audio {
                        inline_data: InlineData {
                            mime_type: audio.mime_type.clone(),
                            data: audio.base64.clone(),
                        },
                    },
                    Part::Text {
                        text: ANALYSIS_INSTRUCTIONS.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }
}

#[async_trait]
impl SpeechAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, audio: &EncodedAudio) -> Result<AnalysisResult, AnalysisError> {
        if self.api_key.trim().is_empty() {
            return Err(AnalysisError::MissingCredential);
        }

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        tracing::info!(
            "Gemini: analyzing {:.1}s of audio with {}",
            audio.duration_secs,
            self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.trim())])
            .json(&Self::build_request(audio))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout
                } else {
                    AnalysisError::NetworkError(format!("Gemini: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ProviderError(format!(
                "Gemini {}: {}",
                status, body
            )));
        }

        let gemini: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(format!("Gemini envelope: {}", e)))?;

        let text = gemini
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.as_deref()))
            .ok_or_else(|| AnalysisError::MalformedResponse("no candidate text".to_string()))?;

        let result = AnalysisResult::from_response_text(text)?;
        tracing::info!(
            "Gemini: fluency={}, vocab={}, corrections={}",
            result.fluency_score,
            result.vocab_score,
            result.grammar_errors.len()
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
