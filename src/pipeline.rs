//! Batch orchestration
//!
//! Wires the engines together behind the three periodic entry points:
//! clustering pending articles (embed, assign, trim, history check, then
//! first titles), the lifecycle sweep, and the history check cycle. Every
//! unit of work is isolated: one failing article or topic is logged and
//! counted, never allowed to abort the batch.

use crate::cluster::{AssignOutcome, ClusteringEngine, MergeOutcome};
use crate::config::Config;
use crate::discussion::{create_discussions, DiscussionCollaborator, DiscussionEvent};
use crate::embed::{create_embedder, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::history::{HistoryCheck, HistoryCycleStats, HistoryEngine};
use crate::lifecycle::{LifecycleEngine, SweepStats};
use crate::locks::TopicLocks;
use crate::models::{Article, ArticleStatus, HistoryPoint, TopicStatus};
use crate::narrative::{
    apply_narrative, create_narrator, NarrativeEvent, NarrativeProvider, NarrativeResult, NarrativeService,
};
use crate::store::NewsStore;
use crate::tasks::{TaskReport, TaskTracker};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Statistics of one clustering batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteringStats {
    pub processed: usize,
    pub topics_created: usize,
    pub topics_updated: usize,
    pub topics_resurrected: usize,
    pub topics_merged: usize,
    pub articles_trimmed: usize,
    pub skipped_no_embedding: usize,
    pub embedding_failures: usize,
    pub history_points: usize,
    pub titles_generated: usize,
    pub title_failures: usize,
    pub discussion_tasks: TaskReport,
    pub failed: usize,
}

/// Statistics of a full scheduled run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub clustering: ClusteringStats,
    pub history: HistoryCycleStats,
    pub sweep: SweepStats,
}

/// What happened to one pending article
enum ArticleOutcome {
    /// Provider had no embedding; retried next cycle
    NoEmbedding,
    Assigned {
        outcome: AssignOutcome,
        trimmed: usize,
        history: Option<HistoryCheck>,
    },
}

pub struct Pipeline {
    store: NewsStore,
    embedder: Arc<dyn EmbeddingProvider>,
    narrative: Option<Arc<NarrativeService>>,
    discussions: Arc<dyn DiscussionCollaborator>,
    locks: TopicLocks,
    tasks: Arc<TaskTracker>,
    clustering: ClusteringEngine,
    lifecycle: LifecycleEngine,
    history: HistoryEngine,
    concurrency: usize,
}

impl Pipeline {
    /// Build a pipeline with the configured backends
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = NewsStore::connect(config).await?;
        let embedder = create_embedder(&config.embedding)?;
        let narrator = if config.narrative.enabled {
            Some(create_narrator(&config.narrative)?)
        } else {
            info!("Narrative generation disabled");
            None
        };
        let discussions = create_discussions(&config.discussion)?;
        Ok(Self::new(config, store, embedder, narrator, discussions))
    }

    /// Build a pipeline around explicit collaborators
    pub fn new(
        config: &Config,
        store: NewsStore,
        embedder: Arc<dyn EmbeddingProvider>,
        narrator: Option<Arc<dyn NarrativeProvider>>,
        discussions: Arc<dyn DiscussionCollaborator>,
    ) -> Self {
        let locks = TopicLocks::new();
        let tasks = Arc::new(TaskTracker::new());
        let narrative = narrator
            .map(|provider| Arc::new(NarrativeService::new(provider, store.clone(), config.narrative.clone())));

        let clustering = ClusteringEngine::new(
            config.clustering.clone(),
            store.clone(),
            locks.clone(),
            Arc::clone(&discussions),
            Arc::clone(&tasks),
        );
        let lifecycle = LifecycleEngine::new(
            config.lifecycle.clone(),
            config.ranking.clone(),
            store.clone(),
            locks.clone(),
        );
        let history = HistoryEngine::new(config.history.clone(), store.clone(), locks.clone(), narrative.clone());

        Self {
            store,
            embedder,
            narrative,
            discussions,
            locks,
            tasks,
            clustering,
            lifecycle,
            history,
            concurrency: config.clustering.concurrency.max(1),
        }
    }

    pub fn store(&self) -> &NewsStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    /// Cluster every pending article, then title the topics that became ready
    pub async fn process_pending_articles(&self) -> Result<ClusteringStats> {
        let pending = self
            .store
            .list_articles_by_status(ArticleStatus::PendingClustering, None)
            .await?;
        info!(pending = pending.len(), "Processing pending articles");

        let mut stats = ClusteringStats::default();
        let results: Vec<(String, Result<ArticleOutcome>)> = stream::iter(pending)
            .map(|article| async move {
                let id = article.id.clone();
                (id, self.process_article(article).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (article_id, result) in results {
            stats.processed += 1;
            match result {
                Ok(ArticleOutcome::NoEmbedding) => stats.skipped_no_embedding += 1,
                Ok(ArticleOutcome::Assigned {
                    outcome,
                    trimmed,
                    history,
                }) => {
                    match outcome {
                        AssignOutcome::Created { merged_into, .. } => {
                            stats.topics_created += 1;
                            if merged_into.is_some() {
                                stats.topics_merged += 1;
                            }
                        }
                        AssignOutcome::Joined { .. } => stats.topics_updated += 1,
                        AssignOutcome::Resurrected { .. } => stats.topics_resurrected += 1,
                    }
                    stats.articles_trimmed += trimmed;
                    if matches!(history, Some(HistoryCheck::Recorded { .. })) {
                        stats.history_points += 1;
                    }
                }
                Err(e) if matches!(e, Error::Embedding(_)) => {
                    warn!(article_id = %article_id, "Embedding failed, retrying next cycle: {}", e);
                    stats.embedding_failures += 1;
                }
                Err(e) => {
                    warn!(article_id = %article_id, "Failed to cluster article: {}", e);
                    stats.failed += 1;
                }
            }
        }

        self.generate_titles(Utc::now(), &mut stats).await?;
        stats.discussion_tasks = self.tasks.drain().await;

        info!(
            processed = stats.processed,
            created = stats.topics_created,
            updated = stats.topics_updated,
            resurrected = stats.topics_resurrected,
            titled = stats.titles_generated,
            failed = stats.failed,
            "Clustering batch complete"
        );
        Ok(stats)
    }

    async fn process_article(&self, mut article: Article) -> Result<ArticleOutcome> {
        let embedding = match article.embedding.take() {
            Some(embedding) if !embedding.is_empty() => embedding,
            _ => match self.embedder.embed(&article.embedding_text()).await? {
                Some(embedding) => {
                    self.store.set_article_embedding(&article.id, &embedding).await?;
                    embedding
                }
                None => {
                    debug!(article_id = %article.id, "No embedding available, skipping");
                    return Ok(ArticleOutcome::NoEmbedding);
                }
            },
        };

        let now = Utc::now();
        let outcome = self.clustering.assign(&article, &embedding, now).await?;
        let topic_id = outcome.topic_id().to_string();

        let trimmed = match self.lifecycle.trim(&topic_id, now).await {
            Ok(trim) => trim.trimmed,
            Err(e) if e.is_not_found() => {
                debug!(topic_id = %topic_id, "Topic vanished before trim");
                0
            }
            Err(e) => return Err(e),
        };

        let titled = self
            .store
            .get_topic(&topic_id)
            .await?
            .is_some_and(|t| t.has_title);
        let history = if titled {
            match self.history.check_topic(&topic_id, now).await {
                Ok(check) => Some(check),
                Err(e) => {
                    warn!(topic_id = %topic_id, "History check failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ArticleOutcome::Assigned {
            outcome,
            trimmed,
            history,
        })
    }

    /// Title every ready topic. A failed generation leaves the topic
    /// untitled for the next cycle.
    async fn generate_titles(&self, now: DateTime<Utc>, stats: &mut ClusteringStats) -> Result<()> {
        let ready: Vec<_> = self
            .store
            .list_topics(None, Some(TopicStatus::Active))
            .await?
            .into_iter()
            .filter(|t| self.clustering.is_title_ready(t))
            .collect();
        if ready.is_empty() {
            return Ok(());
        }

        let Some(narrative) = &self.narrative else {
            debug!(ready = ready.len(), "Narrative disabled, leaving topics untitled");
            return Ok(());
        };

        for topic in ready {
            let result = match narrative.generate(&topic, NarrativeEvent::FirstTitle).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(topic_id = %topic.id, "Title generation failed: {}", e);
                    stats.title_failures += 1;
                    continue;
                }
            };

            match self.publish_title(&topic.id, &result, now).await {
                Ok(Some(_)) => stats.titles_generated += 1,
                Ok(None) => debug!(topic_id = %topic.id, "Topic changed before title could be stored"),
                Err(e) => {
                    warn!(topic_id = %topic.id, "Failed to store title: {}", e);
                    stats.title_failures += 1;
                }
            }
        }
        Ok(())
    }

    /// Store a first title with its initial history point, then notify
    /// discussions in the background
    async fn publish_title(
        &self,
        topic_id: &str,
        result: &NarrativeResult,
        now: DateTime<Utc>,
    ) -> Result<Option<HistoryPoint>> {
        let (point, event) = {
            let _guard = self.locks.lock(topic_id).await;
            let Some(mut topic) = self.store.get_topic(topic_id).await? else {
                return Ok(None);
            };
            if topic.has_title || topic.status != TopicStatus::Active {
                return Ok(None);
            }

            apply_narrative(&mut topic, result, NarrativeEvent::FirstTitle, now);
            let point = self.history.record_initial(&mut topic, now).await?;
            let event = DiscussionEvent::TopicTitled {
                topic_id: topic.id.clone(),
                category: topic.category.clone(),
                title: result.title.clone(),
                summary: topic.summary.clone(),
            };
            (point, event)
        };

        let discussions = Arc::clone(&self.discussions);
        let store = self.store.clone();
        let locks = self.locks.clone();
        let id = topic_id.to_string();
        self.tasks
            .submit(format!("discussion-title-{}", topic_id), async move {
                if let Some(discussion_id) = discussions.topic_titled(event).await? {
                    store_discussion_id(&store, &locks, &id, discussion_id).await?;
                }
                Ok(())
            })
            .await;

        Ok(Some(point))
    }

    /// Run the retention and topic state sweep
    pub async fn run_lifecycle_sweep(&self) -> Result<SweepStats> {
        self.lifecycle.run_sweep(Utc::now()).await
    }

    /// Check every titled topic for a significant change
    pub async fn run_history_check_cycle(&self) -> Result<HistoryCycleStats> {
        self.history.run_cycle(Utc::now()).await
    }

    /// Cluster, check history, then sweep
    pub async fn run_once(&self) -> Result<RunStats> {
        let clustering = self.process_pending_articles().await?;
        let history = self.run_history_check_cycle().await?;
        let sweep = self.run_lifecycle_sweep().await?;
        Ok(RunStats {
            clustering,
            history,
            sweep,
        })
    }

    /// Merge two topics on operator request
    pub async fn merge_topics(&self, keep_id: &str, remove_id: &str) -> Result<Option<MergeOutcome>> {
        let merged = self.clustering.merge(keep_id, remove_id, Utc::now()).await?;
        if merged.is_some() {
            self.lifecycle.trim(keep_id, Utc::now()).await?;
        }
        self.tasks.drain().await;
        Ok(merged)
    }
}

async fn store_discussion_id(store: &NewsStore, locks: &TopicLocks, topic_id: &str, discussion_id: String) -> Result<()> {
    let _guard = locks.lock(topic_id).await;
    let Some(mut topic) = store.get_topic(topic_id).await? else {
        debug!(topic_id, "Topic gone before discussion id could be stored");
        return Ok(());
    };
    topic.discussion_id = Some(discussion_id);
    store.save_topic(&mut topic).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryType, SourcePriority, Topic};
    use crate::testing::{
        embedded_article, test_config, test_store, vec_at, FakeEmbedder, FakeNarrator, RecordingDiscussions,
    };
    use chrono::Duration;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    struct Harness {
        pipeline: Pipeline,
        store: NewsStore,
        narrator: Arc<FakeNarrator>,
        embedder: Arc<FakeEmbedder>,
        discussions: Arc<RecordingDiscussions>,
        _tmp: TempDir,
    }

    async fn harness_with(config: Config, embedder: FakeEmbedder, narrator: FakeNarrator) -> Harness {
        let (store, tmp) = test_store().await;
        let embedder = Arc::new(embedder);
        let narrator = Arc::new(narrator);
        let discussions = Arc::new(RecordingDiscussions::default());
        let pipeline = Pipeline::new(
            &config,
            store.clone(),
            embedder.clone(),
            Some(narrator.clone() as Arc<dyn NarrativeProvider>),
            discussions.clone(),
        );
        Harness {
            pipeline,
            store,
            narrator,
            embedder,
            discussions,
            _tmp: tmp,
        }
    }

    async fn harness() -> Harness {
        harness_with(test_config(), FakeEmbedder::default(), FakeNarrator::titled("Chip shortage eases")).await
    }

    #[tokio::test]
    async fn test_three_similar_articles_form_one_topic() {
        let mut config = test_config();
        config.clustering.concurrency = 1;
        let h = harness_with(config, FakeEmbedder::default(), FakeNarrator::titled("Chip shortage eases")).await;

        for (source, sim) in [("Wire", 1.0), ("Post", 0.95), ("Herald", 0.92)] {
            let a = embedded_article("tech", source, vec_at(sim));
            h.store.insert_article(&a).await.unwrap();
        }

        let stats = h.pipeline.process_pending_articles().await.unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.topics_created, 1);
        assert_eq!(stats.topics_updated, 2);

        let topics = h.store.list_topics(Some("tech"), None).await.unwrap();
        assert_eq!(topics.len(), 1);
        let topic = &topics[0];
        assert_eq!(topic.article_count(), 3);
        assert!((topic.confidence - 0.7).abs() < 1e-9);

        // ready for a title: three articles, confidence above 0.6
        assert_eq!(stats.titles_generated, 1);
        assert!(topic.has_title);
        assert_eq!(topic.title.as_deref(), Some("Chip shortage eases"));
        assert_eq!(topic.history_point_count, 1);
        assert_eq!(topic.discussion_id.as_deref(), Some(format!("disc-{}", topic.id).as_str()));
        assert_eq!(stats.discussion_tasks.completed, 1);

        let initial = h.store.latest_history_point(&topic.id).await.unwrap().unwrap();
        assert_eq!(initial.history_type, HistoryType::Initial);
        assert!(initial.was_regenerated);
        assert_eq!(h.discussions.events().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_topic_resurrects_and_absorbs_article() {
        let h = harness().await;
        let now = Utc::now();

        let seed = embedded_article("tech", "Wire", vec![1.0, 0.0]);
        h.store.insert_article(&seed).await.unwrap();
        let mut topic = Topic::new(&seed, vec![1.0, 0.0], 0.5, now - Duration::days(12));
        topic.status = TopicStatus::Stale;
        topic.stale_since = Some(now - Duration::days(5));
        topic.last_updated = now - Duration::days(12);
        h.store.insert_topic(&topic).await.unwrap();
        h.store.attach_article(&seed.id, &topic.id).await.unwrap();

        let article = embedded_article("tech", "Wire", vec_at(0.85));
        h.store.insert_article(&article).await.unwrap();

        let stats = h.pipeline.process_pending_articles().await.unwrap();
        assert_eq!(stats.topics_resurrected, 1);
        assert_eq!(stats.topics_created, 0);

        let revived = h.store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(revived.status, TopicStatus::Active);
        assert!(revived.stale_since.is_none());
        assert!(revived.article_ids.contains(&article.id));
        let stored = h.store.get_article(&article.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ArticleStatus::Clustered);
        assert_eq!(stored.topic_id.as_deref(), Some(topic.id.as_str()));
    }

    #[tokio::test]
    async fn test_thirty_first_article_triggers_trim() {
        let h = harness().await;
        let now = Utc::now();

        let mut members = Vec::new();
        let seed = embedded_article("tech", "Wire", vec![1.0, 0.0]);
        members.push(seed.clone());
        let mut weakest = embedded_article("tech", "Wire", vec![1.0, 0.0]);
        weakest.source_priority = SourcePriority::Low;
        weakest.ingested_at = now - Duration::hours(500);
        weakest.word_count = 10;
        members.push(weakest.clone());
        for _ in 0..28 {
            let mut a = embedded_article("tech", "Wire", vec![1.0, 0.0]);
            a.source_priority = SourcePriority::High;
            a.word_count = 1000;
            members.push(a);
        }

        for a in &members {
            h.store.insert_article(a).await.unwrap();
        }
        let mut topic = Topic::new(&seed, vec![1.0, 0.0], 0.5, now);
        topic.article_ids = members.iter().map(|a| a.id.clone()).collect();
        h.store.insert_topic(&topic).await.unwrap();
        for a in &members {
            h.store.attach_article(&a.id, &topic.id).await.unwrap();
        }

        let newcomer = embedded_article("tech", "Wire", vec_at(0.99));
        h.store.insert_article(&newcomer).await.unwrap();

        let stats = h.pipeline.process_pending_articles().await.unwrap();
        assert_eq!(stats.topics_updated, 1);
        assert_eq!(stats.articles_trimmed, 1);

        let trimmed = h.store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(trimmed.article_count(), 30);
        assert_eq!(trimmed.seed_id(), Some(seed.id.as_str()));
        assert!(trimmed.article_ids.contains(&newcomer.id));
        assert!(!trimmed.article_ids.contains(&weakest.id));

        let evicted = h.store.get_article(&weakest.id).await.unwrap().unwrap();
        assert_eq!(evicted.status, ArticleStatus::ArchivedFromTopic);
        assert_eq!(evicted.former_topic_id.as_deref(), Some(topic.id.as_str()));
    }

    #[tokio::test]
    async fn test_missing_embedding_is_fetched_or_skipped() {
        let known = {
            let mut a = Article::new("tech", "Wire", "Rates hold");
            a.description = Some("Central bank pauses".to_string());
            a
        };
        let unknown = Article::new("tech", "Wire", "Nothing to embed");
        let broken = Article::new("tech", "Wire", "Quota trouble");

        let embedder = FakeEmbedder::default()
            .with("Rates hold Central bank pauses", vec![1.0, 0.0])
            .failing_on("Quota trouble");
        let h = harness_with(test_config(), embedder, FakeNarrator::titled("Unused")).await;
        for a in [&known, &unknown, &broken] {
            h.store.insert_article(a).await.unwrap();
        }

        let stats = h.pipeline.process_pending_articles().await.unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.topics_created, 1);
        assert_eq!(stats.skipped_no_embedding, 1);
        assert_eq!(stats.embedding_failures, 1);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 3);

        let embedded = h.store.get_article(&known.id).await.unwrap().unwrap();
        assert_eq!(embedded.embedding, Some(vec![1.0, 0.0]));
        assert_eq!(embedded.status, ArticleStatus::Clustered);
        for id in [&unknown.id, &broken.id] {
            let pending = h.store.get_article(id).await.unwrap().unwrap();
            assert_eq!(pending.status, ArticleStatus::PendingClustering);
            assert!(pending.embedding.is_none());
        }
    }

    #[tokio::test]
    async fn test_failed_title_generation_leaves_topic_untitled() {
        let h = harness_with(test_config(), FakeEmbedder::default(), FakeNarrator::failing()).await;
        h.store
            .insert_article(&embedded_article("tech", "Wire", vec![1.0, 0.0]))
            .await
            .unwrap();
        h.store
            .insert_article(&embedded_article("tech", "Post", vec_at(0.9)))
            .await
            .unwrap();

        let stats = h.pipeline.process_pending_articles().await.unwrap();
        assert_eq!(stats.title_failures, 1);
        assert_eq!(stats.titles_generated, 0);
        assert_eq!(h.narrator.calls.load(Ordering::SeqCst), 1);

        let topics = h.store.list_topics(Some("tech"), None).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert!(!topics[0].has_title);
        assert_eq!(h.store.count_history_points(&topics[0].id).await.unwrap(), 0);
        assert!(h.discussions.events().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_reports_every_stage() {
        let h = harness().await;
        let mut orphan = Article::new("tech", "Wire", "Never embedded");
        orphan.ingested_at = Utc::now() - Duration::days(5);
        h.store.insert_article(&orphan).await.unwrap();

        let stats = h.pipeline.run_once().await.unwrap();
        assert_eq!(stats.clustering.skipped_no_embedding, 1);
        assert_eq!(stats.history.topics_checked, 0);
        assert_eq!(stats.sweep.articles_orphaned, 1);
    }
}
