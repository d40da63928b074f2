//! Journal-entry analysis.
//!
//! One call in, one structured record out: the analyzer takes the flattened
//! text of an entry and returns an [`InsightRecord`]. Success or failure is
//! atomic: no retries, no partial results. Pacing between calls belongs to
//! the batch runner, not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Structured output of analyzing one journal entry.
///
/// Mood and stress share the same 1–10 range on both the wire and in the
/// aggregate math. Themes are free text; deduplication happens at the
/// aggregate layer, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub summary: String,
    pub mood: f64,
    pub stress: f64,
    pub emotion: String,
    pub themes: Vec<String>,
    pub gratitude: String,
    pub reflection_questions: Vec<String>,
    pub tomorrow_suggestions: Vec<String>,
    pub growth_signal: bool,
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// No API key configured.  Checked before any network call so the
    /// caller can direct the user to settings.
    #[error("no analyzer API key configured")]
    MissingKey,

    #[error("analyzer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("analyzer API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("analyzer returned a malformed record: {0}")]
    Malformed(String),
}

/// The analysis seam the engine is written against.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<InsightRecord, AnalyzerError>;
}

const SYSTEM_PROMPT: &str = "You analyze journal entries. Respond with a single JSON object \
containing exactly these fields: summary (string, a concise summary of the entry), \
mood (number 1-10), stress (number 1-10), emotion (string, the dominant emotion), \
themes (array of strings, key themes or topics), gratitude (string, what the writer is \
grateful for, or a general gratitude sentiment), reflection_questions (array of 3 \
thought-provoking questions based on the entry), tomorrow_suggestions (array of 3 \
actionable suggestions for tomorrow), growth_signal (boolean, whether the entry \
indicates personal growth).";

/// Analyzer backed by an OpenAI-compatible chat completions endpoint,
/// forced into JSON mode.
#[derive(Debug, Clone)]
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAnalyzer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, text: &str) -> Result<InsightRecord, AnalyzerError> {
        if self.api_key.trim().is_empty() {
            return Err(AnalyzerError::MissingKey);
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Analyze the following journal entry and provide insights:\n\n{text}")}
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| AnalyzerError::Malformed(format!("response missing content: {body}")))?;

        debug!(model = %self.model, chars = text.len(), "analysis completed");
        record_from_content(content)
    }
}

fn record_from_content(content: &str) -> Result<InsightRecord, AnalyzerError> {
    serde_json::from_str(content).map_err(|err| AnalyzerError::Malformed(err.to_string()))
}
