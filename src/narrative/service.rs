use super::{ArticleDigest, NarrativeProvider, NarrativeResult, TopicContext};
use crate::config::NarrativeConfig;
use crate::error::{Error, Result};
use crate::models::{HistoryType, Topic};
use crate::ratelimit::CallRateLimiter;
use crate::store::NewsStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Why a narrative is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeEvent {
    /// The topic just became ready for its first title
    FirstTitle,
    /// A significant change of the given type was detected
    Regeneration(HistoryType),
}

/// Rate-limited narrative generation for topics
pub struct NarrativeService {
    provider: Arc<dyn NarrativeProvider>,
    store: NewsStore,
    limiter: CallRateLimiter,
    config: NarrativeConfig,
}

impl NarrativeService {
    pub fn new(provider: Arc<dyn NarrativeProvider>, store: NewsStore, config: NarrativeConfig) -> Self {
        let limiter = CallRateLimiter::with_delay("narrative", Duration::from_millis(config.call_delay_ms));
        Self {
            provider,
            store,
            limiter,
            config,
        }
    }

    /// Gather the newest member articles and leading sources of a topic
    pub async fn build_context(&self, topic: &Topic, update: Option<HistoryType>) -> Result<TopicContext> {
        let mut articles = self.store.get_articles(&topic.article_ids).await?;
        if articles.is_empty() {
            return Err(Error::Narrative(format!("topic {} has no readable articles", topic.id)));
        }
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        Ok(TopicContext {
            topic_id: topic.id.clone(),
            category: topic.category.clone(),
            article_count: topic.article_count(),
            sources: topic.sources.iter().take(5).cloned().collect(),
            articles: articles
                .into_iter()
                .take(self.config.context_articles)
                .map(|a| ArticleDigest {
                    title: a.title,
                    source: a.source,
                    published_at: a.published_at,
                    description: a.description,
                })
                .collect(),
            update,
        })
    }

    /// Ask the provider for a narrative and validate it.
    ///
    /// An empty title is rejected as malformed; an overlong one is only
    /// logged.
    pub async fn generate(&self, topic: &Topic, event: NarrativeEvent) -> Result<NarrativeResult> {
        let update = match event {
            NarrativeEvent::FirstTitle => None,
            NarrativeEvent::Regeneration(kind) => Some(kind),
        };
        let context = self.build_context(topic, update).await?;

        self.limiter.wait().await;
        let mut result = self.provider.generate(&context).await?;

        result.title = result.title.trim().to_string();
        if result.title.is_empty() {
            return Err(Error::MalformedResponse(format!(
                "narrative for topic {} has an empty title",
                topic.id
            )));
        }

        let words = result.word_count();
        if words > self.config.max_title_words {
            warn!(
                topic_id = %topic.id,
                words,
                max = self.config.max_title_words,
                "Generated title is longer than recommended"
            );
        }

        info!(topic_id = %topic.id, model = self.provider.model_name(), "Generated narrative: {}", result.title);
        Ok(result)
    }
}

/// Copy a validated narrative onto the topic.
///
/// `confidence` is left alone; the provider's estimate is kept in
/// `narrative_confidence`.
pub fn apply_narrative(topic: &mut Topic, result: &NarrativeResult, event: NarrativeEvent, now: DateTime<Utc>) {
    topic.title = Some(result.title.clone());
    topic.summary = Some(result.summary.clone());
    topic.key_insights = result.key_insights.clone();
    topic.narrative_confidence = Some(result.normalized_confidence());

    match event {
        NarrativeEvent::FirstTitle => {
            topic.has_title = true;
            topic.title_generated_at = Some(now);
        }
        NarrativeEvent::Regeneration(_) => {
            topic.last_regenerated = Some(now);
            topic.development_note = result.development_note.clone();
        }
    }
}
