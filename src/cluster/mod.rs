//! Topic assignment
//!
//! Places an embedded article into the best-matching active topic, revives a
//! recently stale topic when the match is strong enough, or seeds a new
//! topic. New topics are checked against their neighbours and folded into an
//! older near-duplicate.
//!
//! Every topic write happens under that topic's lock and is additionally
//! guarded by the optimistic `version` check in the store, so concurrent
//! assignments to one topic are serialized.

use crate::config::ClusteringConfig;
use crate::discussion::{DiscussionCollaborator, DiscussionEvent};
use crate::error::{Error, Result};
use crate::locks::TopicLocks;
use crate::models::{Article, Topic, TopicStatus};
use crate::store::{NewsStore, Transition};
use crate::tasks::TaskTracker;
use crate::vector::{centroid, cosine_similarity, meets_threshold};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts before a contended assignment gives up
const MAX_ASSIGN_ATTEMPTS: usize = 3;

/// Where an article ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    /// Seeded a new topic (possibly merged right away into an older twin)
    Created {
        topic_id: String,
        merged_into: Option<String>,
    },
    /// Joined an active topic
    Joined { topic_id: String },
    /// Revived a stale topic and joined it
    Resurrected { topic_id: String },
}

impl AssignOutcome {
    /// The topic now owning the article
    pub fn topic_id(&self) -> &str {
        match self {
            AssignOutcome::Created {
                merged_into: Some(keep),
                ..
            } => keep,
            AssignOutcome::Created { topic_id, .. }
            | AssignOutcome::Joined { topic_id }
            | AssignOutcome::Resurrected { topic_id } => topic_id,
        }
    }
}

/// Result of folding one topic into another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub kept_topic_id: String,
    pub removed_topic_id: String,
    pub article_count: usize,
}

#[derive(Debug)]
struct Candidate {
    topic_id: String,
    similarity: f64,
}

#[derive(Debug)]
enum TopicMatch {
    Active(Candidate),
    Stale(Candidate),
    None,
}

pub struct ClusteringEngine {
    config: ClusteringConfig,
    store: NewsStore,
    locks: TopicLocks,
    discussions: Arc<dyn DiscussionCollaborator>,
    tasks: Arc<TaskTracker>,
}

impl ClusteringEngine {
    pub fn new(
        config: ClusteringConfig,
        store: NewsStore,
        locks: TopicLocks,
        discussions: Arc<dyn DiscussionCollaborator>,
        tasks: Arc<TaskTracker>,
    ) -> Self {
        Self {
            config,
            store,
            locks,
            discussions,
            tasks,
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Assign an embedded article to a topic
    pub async fn assign(&self, article: &Article, embedding: &[f32], now: DateTime<Utc>) -> Result<AssignOutcome> {
        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            match self.find_match(&article.category, embedding, now).await? {
                TopicMatch::Active(candidate) => {
                    let _guard = self.locks.lock(&candidate.topic_id).await;
                    match self.update_topic_locked(&candidate.topic_id, article, embedding, now).await {
                        Ok(true) => {
                            return Ok(AssignOutcome::Joined {
                                topic_id: candidate.topic_id,
                            })
                        }
                        Ok(false) => debug!(topic_id = %candidate.topic_id, attempt, "Topic left active state, retrying"),
                        Err(e) if is_retryable(&e) => {
                            debug!(topic_id = %candidate.topic_id, attempt, "Lost topic update: {}", e)
                        }
                        Err(e) => return Err(e),
                    }
                }
                TopicMatch::Stale(candidate) => {
                    let _guard = self.locks.lock(&candidate.topic_id).await;
                    let stale_after = now - Duration::days(self.config.max_resurrection_age_days);
                    if !self
                        .store
                        .transition_status(&candidate.topic_id, Transition::Resurrect { stale_after }, now)
                        .await?
                    {
                        debug!(topic_id = %candidate.topic_id, attempt, "Resurrection lost the race, retrying");
                        continue;
                    }
                    info!(
                        topic_id = %candidate.topic_id,
                        similarity = candidate.similarity,
                        "Resurrected stale topic"
                    );

                    match self.update_topic_locked(&candidate.topic_id, article, embedding, now).await {
                        Ok(true) => {
                            return Ok(AssignOutcome::Resurrected {
                                topic_id: candidate.topic_id,
                            })
                        }
                        Ok(false) => debug!(topic_id = %candidate.topic_id, attempt, "Resurrected topic changed state"),
                        Err(e) if is_retryable(&e) => {
                            debug!(topic_id = %candidate.topic_id, attempt, "Lost topic update: {}", e)
                        }
                        Err(e) => return Err(e),
                    }
                }
                TopicMatch::None => {
                    let topic = self.create_topic(article, embedding, now).await?;
                    let merged_into = self
                        .check_near_duplicates(&topic.id, now)
                        .await?
                        .map(|m| m.kept_topic_id)
                        .filter(|kept| *kept != topic.id);
                    return Ok(AssignOutcome::Created {
                        topic_id: topic.id,
                        merged_into,
                    });
                }
            }
        }

        Err(Error::Conflict(format!(
            "article {} could not be assigned after {} attempts",
            article.id, MAX_ASSIGN_ATTEMPTS
        )))
    }

    /// Best active topic at or above the similarity threshold, else the best
    /// eligible stale topic at or above the resurrection threshold
    async fn find_match(&self, category: &str, embedding: &[f32], now: DateTime<Utc>) -> Result<TopicMatch> {
        let threshold = self.config.similarity_threshold;
        let active = self.store.list_topics(Some(category), Some(TopicStatus::Active)).await?;

        if let Some(best) = best_candidate(&active, embedding) {
            if meets_threshold(best.similarity, threshold) {
                debug!(topic_id = %best.topic_id, similarity = best.similarity, "Matched active topic");
                return Ok(TopicMatch::Active(best));
            }
            if best.similarity >= threshold - self.config.near_miss_margin {
                info!(
                    topic_id = %best.topic_id,
                    similarity = best.similarity,
                    threshold,
                    "Near miss against active topic"
                );
            }
        }

        let oldest_eligible = now - Duration::days(self.config.max_resurrection_age_days);
        let stale: Vec<Topic> = self
            .store
            .list_topics(Some(category), Some(TopicStatus::Stale))
            .await?
            .into_iter()
            .filter(|t| t.stale_since.map_or(true, |since| since >= oldest_eligible))
            .collect();

        if let Some(best) = best_candidate(&stale, embedding) {
            if meets_threshold(best.similarity, self.config.resurrection_threshold()) {
                debug!(topic_id = %best.topic_id, similarity = best.similarity, "Matched stale topic");
                return Ok(TopicMatch::Stale(best));
            }
        }

        Ok(TopicMatch::None)
    }

    /// Append the article to an active topic. Caller holds the topic lock.
    ///
    /// Returns false when the topic is no longer active.
    async fn update_topic_locked(
        &self,
        topic_id: &str,
        article: &Article,
        embedding: &[f32],
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut topic = self
            .store
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))?;

        if topic.status != TopicStatus::Active {
            return Ok(false);
        }

        if !topic.article_ids.contains(&article.id) {
            let mut vectors = self.store.member_embeddings(&topic.article_ids).await?;
            vectors.push(embedding.to_vec());
            match centroid(&vectors) {
                Some(c) => topic.centroid = c,
                None => warn!(topic_id, "No member embeddings, keeping previous centroid"),
            }

            topic.article_ids.push(article.id.clone());
            if topic.sources.insert(article.source.clone()) {
                topic.bump_confidence(self.config.confidence_increment);
            }
            topic.last_updated = now;
            self.store.save_topic(&mut topic).await?;
        }

        self.store.attach_article(&article.id, &topic.id).await?;
        info!(
            topic_id,
            articles = topic.article_count(),
            confidence = topic.confidence,
            "Updated topic"
        );
        Ok(true)
    }

    /// Seed a new active topic with `article`
    pub async fn create_topic(&self, article: &Article, embedding: &[f32], now: DateTime<Utc>) -> Result<Topic> {
        let topic = Topic::new(article, embedding.to_vec(), self.config.initial_confidence, now);
        self.store.insert_topic(&topic).await?;
        self.store.attach_article(&article.id, &topic.id).await?;
        info!(topic_id = %topic.id, category = %topic.category, "Created new topic");
        Ok(topic)
    }

    /// Merge a freshly created topic with its most similar active neighbour
    /// if they are near-duplicates. The older topic survives.
    ///
    /// A twin that vanishes mid-merge (merged away by a concurrent check)
    /// triggers a fresh look at the remaining neighbours.
    pub async fn check_near_duplicates(&self, topic_id: &str, now: DateTime<Utc>) -> Result<Option<MergeOutcome>> {
        for _ in 0..MAX_ASSIGN_ATTEMPTS {
            let Some(topic) = self.store.get_topic(topic_id).await? else {
                return Ok(None);
            };
            if topic.status != TopicStatus::Active {
                return Ok(None);
            }

            let others: Vec<Topic> = self
                .store
                .list_topics(Some(&topic.category), Some(TopicStatus::Active))
                .await?
                .into_iter()
                .filter(|t| t.id != topic.id)
                .collect();

            let Some((twin, similarity)) = others
                .iter()
                .map(|other| (other, cosine_similarity(&topic.centroid, &other.centroid)))
                .filter(|(_, similarity)| meets_threshold(*similarity, self.config.near_duplicate_threshold))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            else {
                return Ok(None);
            };

            warn!(
                topic_id = %topic.id,
                twin_id = %twin.id,
                similarity,
                "Near-duplicate topic detected"
            );

            let (keep, remove) = if (twin.created_at, &twin.id) <= (topic.created_at, &topic.id) {
                (twin.id.as_str(), topic.id.as_str())
            } else {
                (topic.id.as_str(), twin.id.as_str())
            };
            if let Some(merged) = self.merge(keep, remove, now).await? {
                return Ok(Some(merged));
            }
        }
        Ok(None)
    }

    /// Fold `remove_id` into `keep_id`.
    ///
    /// A no-op returning `None` when either topic no longer exists, so a
    /// retried merge is harmless.
    pub async fn merge(&self, keep_id: &str, remove_id: &str, now: DateTime<Utc>) -> Result<Option<MergeOutcome>> {
        if keep_id == remove_id {
            return Ok(None);
        }
        let _guards = self.locks.lock_pair(keep_id, remove_id).await;

        let (Some(mut keep), Some(remove)) = (
            self.store.get_topic(keep_id).await?,
            self.store.get_topic(remove_id).await?,
        ) else {
            debug!(keep_id, remove_id, "Merge skipped, topic missing");
            return Ok(None);
        };

        let known: HashSet<String> = keep.article_ids.iter().cloned().collect();
        keep.article_ids
            .extend(remove.article_ids.iter().filter(|id| !known.contains(*id)).cloned());
        keep.sources.extend(remove.sources.iter().cloned());

        let vectors = self.store.member_embeddings(&keep.article_ids).await?;
        match centroid(&vectors) {
            Some(c) => keep.centroid = c,
            None => warn!(topic_id = %keep.id, "No member embeddings, keeping previous centroid"),
        }

        keep.bump_confidence(self.config.confidence_increment);
        keep.merged_at = Some(now);
        keep.merged_from.push(remove.id.clone());
        keep.last_updated = now;

        self.store.commit_merge(&mut keep, &remove.id).await?;

        info!(
            kept = %keep.id,
            removed = %remove.id,
            articles = keep.article_count(),
            "Merged topics"
        );

        let discussions = Arc::clone(&self.discussions);
        let event = DiscussionEvent::TopicMerged {
            kept_topic_id: keep.id.clone(),
            removed_topic_id: remove.id.clone(),
            removed_discussion_id: remove.discussion_id.clone(),
        };
        self.tasks
            .submit(format!("discussion-merge-{}", remove.id), async move {
                discussions.topic_merged(event).await
            })
            .await;

        Ok(Some(MergeOutcome {
            kept_topic_id: keep.id.clone(),
            removed_topic_id: remove.id,
            article_count: keep.article_count(),
        }))
    }

    /// Whether a topic is ready for its first title
    pub fn is_title_ready(&self, topic: &Topic) -> bool {
        !topic.has_title
            && topic.status == TopicStatus::Active
            && topic.article_count() >= self.config.min_articles_for_title
            && meets_threshold(topic.confidence, self.config.confidence_threshold)
    }
}

fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::Conflict(_)) || matches!(err, Error::TopicNotFound(_))
}

fn best_candidate(topics: &[Topic], embedding: &[f32]) -> Option<Candidate> {
    topics
        .iter()
        .filter(|t| !t.centroid.is_empty())
        .map(|t| Candidate {
            topic_id: t.id.clone(),
            similarity: cosine_similarity(embedding, &t.centroid),
        })
        .max_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap_or(std::cmp::Ordering::Equal))
}
