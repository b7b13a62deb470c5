//! Test doubles and fixtures shared by the engine tests

use crate::config::Config;
use crate::discussion::{DiscussionCollaborator, DiscussionEvent};
use crate::embed::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::Article;
use crate::narrative::{NarrativeProvider, NarrativeResult, TopicContext};
use crate::store::NewsStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Fresh store in a temporary directory
pub async fn test_store() -> (NewsStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = NewsStore::open(&tmp.path().join("test.db")).await.unwrap();
    (store, tmp)
}

/// Default config with no narrative pacing
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.narrative.call_delay_ms = 0;
    config
}

/// 2-d unit vector whose cosine similarity to `[1, 0]` is `similarity`
pub fn vec_at(similarity: f64) -> Vec<f32> {
    let other = (1.0 - similarity * similarity).max(0.0).sqrt();
    vec![similarity as f32, other as f32]
}

/// Pending article with an embedding already set
pub fn embedded_article(category: &str, source: &str, embedding: Vec<f32>) -> Article {
    let mut article = Article::new(category, source, format!("{} report", source));
    article.embedding = Some(embedding);
    article
}

/// Embedder answering from a fixed table keyed by article text
#[derive(Default)]
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(text) {
            return Err(Error::Embedding("quota exceeded".to_string()));
        }
        Ok(self.vectors.get(text).cloned())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Narrator returning a canned result (or failing)
pub struct FakeNarrator {
    result: Option<NarrativeResult>,
    pub calls: AtomicUsize,
    pub contexts: Mutex<Vec<TopicContext>>,
}

impl FakeNarrator {
    pub fn titled(title: &str) -> Self {
        Self {
            result: Some(NarrativeResult {
                title: title.to_string(),
                summary: format!("Summary of {}", title),
                key_insights: vec!["first insight".to_string()],
                confidence_score: 80.0,
                development_note: Some("Coverage widened".to_string()),
            }),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NarrativeProvider for FakeNarrator {
    async fn generate(&self, context: &TopicContext) -> Result<NarrativeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        self.result
            .clone()
            .ok_or_else(|| Error::Narrative("503 Service Unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "fake-narrator"
    }
}

/// Collaborator recording every event it receives
#[derive(Default)]
pub struct RecordingDiscussions {
    pub events: Mutex<Vec<DiscussionEvent>>,
}

impl RecordingDiscussions {
    pub fn events(&self) -> Vec<DiscussionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscussionCollaborator for RecordingDiscussions {
    async fn topic_titled(&self, event: DiscussionEvent) -> Result<Option<String>> {
        let id = match &event {
            DiscussionEvent::TopicTitled { topic_id, .. } => Some(format!("disc-{}", topic_id)),
            _ => None,
        };
        self.events.lock().unwrap().push(event);
        Ok(id)
    }

    async fn topic_merged(&self, event: DiscussionEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
