//! Narrative (title, summary, key insights) generation
//!
//! Text is produced by an external language model behind a
//! `NarrativeProvider`. The core only builds the context, validates the
//! structured reply and applies it to the topic.

mod http_backend;
mod prompt;
mod service;

pub use http_backend::*;
pub use prompt::build_prompt;
pub use service::*;

use crate::config::NarrativeConfig;
use crate::error::{Error, Result};
use crate::models::HistoryType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One member article as shown to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDigest {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub description: Option<String>,
}

/// Everything the provider gets to see about a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicContext {
    pub topic_id: String,
    pub category: String,
    pub article_count: usize,
    pub sources: Vec<String>,
    /// Newest first
    pub articles: Vec<ArticleDigest>,
    /// Set when regenerating after a significant change
    pub update: Option<HistoryType>,
}

/// Structured narrative returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResult {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    /// Provider's reliability estimate, 0..=100
    #[serde(default = "default_confidence_score")]
    pub confidence_score: f64,
    #[serde(default)]
    pub development_note: Option<String>,
}

fn default_confidence_score() -> f64 {
    70.0
}

impl NarrativeResult {
    pub fn word_count(&self) -> usize {
        self.title.split_whitespace().count()
    }

    /// Provider confidence scaled to 0..1
    pub fn normalized_confidence(&self) -> f64 {
        (self.confidence_score / 100.0).clamp(0.0, 1.0)
    }
}

/// Trait for narrative providers
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Generate a narrative for the topic described by `context`
    async fn generate(&self, context: &TopicContext) -> Result<NarrativeResult>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a narrative provider based on configuration
pub fn create_narrator(config: &NarrativeConfig) -> Result<Arc<dyn NarrativeProvider>> {
    let narrator = HttpNarrator::new(config)?;
    Ok(Arc::new(narrator))
}

/// Parse the provider's reply, tolerating a Markdown code fence around it
pub fn parse_narrative_response(text: &str) -> Result<NarrativeResult> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("Narrative is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let result = parse_narrative_response(
            r#"{"title": "Chip shortage eases", "summary": "s", "key_insights": ["a"], "confidence_score": 85}"#,
        )
        .unwrap();
        assert_eq!(result.title, "Chip shortage eases");
        assert!((result.normalized_confidence() - 0.85).abs() < 1e-9);
        assert_eq!(result.development_note, None);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"title\": \"Fed holds rates\", \"development_note\": \"Markets rallied\"}\n```";
        let result = parse_narrative_response(text).unwrap();
        assert_eq!(result.title, "Fed holds rates");
        assert_eq!(result.development_note.as_deref(), Some("Markets rallied"));
        assert_eq!(result.confidence_score, 70.0);
        assert_eq!(result.word_count(), 3);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_narrative_response("Sure! Here is your headline").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
