// analysis/prompt.rs — Fixed instruction text and response schema

use serde_json::{json, Value};

pub const ANALYSIS_INSTRUCTIONS: &str = r#"
You are evaluating a recording of someone speaking English.
Do the following:
1. Transcribe the recording exactly as spoken.
2. Score fluency from 0 to 100, judging flow, pace and hesitation.
3. Score vocabulary range and precision from 0 to 100.
4. List grammar mistakes, each with a corrected version and a short, simple explanation.
5. Give overall advice on how to improve.

Reply with a single JSON object of exactly this shape:
{
  "transcript": "...",
  "fluencyScore": 85,
  "vocabScore": 70,
  "grammarErrors": [
    { "original": "he go to store", "correction": "he goes to the store", "explanation": "Subject-verb agreement: 'he' takes 'goes'." }
  ],
  "generalSuggestions": "Use more varied adjectives and work on vowel clarity."
}
"#;

/// Structured-output schema sent with every request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "transcript": { "type": "STRING" },
            "fluencyScore": { "type": "NUMBER" },
            "vocabScore": { "type": "NUMBER" },
            "grammarErrors": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "original": { "type": "STRING" },
                        "correction": { "type": "STRING" },
                        "explanation": { "type": "STRING" }
                    },
                    "required": ["original", "correction", "explanation"]
                }
            },
            "generalSuggestions": { "type": "STRING" }
        },
        "required": ["transcript", "fluencyScore", "vocabScore", "grammarErrors", "generalSuggestions"]
    })
}
