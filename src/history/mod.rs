//! Topic history
//!
//! Decides when a titled topic has changed enough to deserve a new snapshot,
//! regenerates its narrative for major updates and source expansions, and
//! appends immutable history points. Snapshots are never updated or removed,
//! so a timeline outlives the topic it describes.

pub mod significance;

pub use significance::{evaluate, Significance};

use crate::config::HistoryConfig;
use crate::error::{Error, Result};
use crate::locks::TopicLocks;
use crate::models::{HistoryPoint, HistoryType, SignificanceBreakdown, Topic, TopicStatus};
use crate::narrative::{apply_narrative, NarrativeEvent, NarrativeService};
use crate::store::NewsStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a history check did for one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HistoryCheck {
    /// Topic is missing, inactive or untitled
    Skipped,
    NotSignificant { score: f64, breakdown: SignificanceBreakdown },
    Recorded {
        point_id: String,
        history_type: HistoryType,
        score: f64,
        was_regenerated: bool,
    },
}

/// Counters reported by one history cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryCycleStats {
    pub topics_checked: usize,
    pub histories_created: usize,
    pub by_type: BTreeMap<String, usize>,
    pub regenerations: usize,
    pub provider_failures: usize,
    pub errors: usize,
}

pub struct HistoryEngine {
    config: HistoryConfig,
    store: NewsStore,
    locks: TopicLocks,
    /// `None` when narrative generation is disabled
    narrative: Option<Arc<NarrativeService>>,
}

impl HistoryEngine {
    pub fn new(
        config: HistoryConfig,
        store: NewsStore,
        locks: TopicLocks,
        narrative: Option<Arc<NarrativeService>>,
    ) -> Self {
        Self {
            config,
            store,
            locks,
            narrative,
        }
    }

    /// Score a topic against its latest snapshot without recording anything
    pub async fn evaluate_topic(&self, topic: &Topic, now: DateTime<Utc>) -> Result<Significance> {
        let last = self.store.latest_history_point(&topic.id).await?;
        Ok(evaluate(&self.config, topic, last.as_ref(), now))
    }

    /// Snapshot the topic if it changed significantly since its last point.
    ///
    /// A failed regeneration skips the topic for this cycle: the error is
    /// returned and no point is written.
    pub async fn check_topic(&self, topic_id: &str, now: DateTime<Utc>) -> Result<HistoryCheck> {
        let Some(topic) = self.store.get_topic(topic_id).await? else {
            return Ok(HistoryCheck::Skipped);
        };
        if topic.status != TopicStatus::Active || !topic.has_title {
            return Ok(HistoryCheck::Skipped);
        }

        let sig = self.evaluate_topic(&topic, now).await?;
        debug!(topic_id, score = sig.score, significant = sig.is_significant, "Evaluated topic");
        if !sig.is_significant {
            return Ok(HistoryCheck::NotSignificant {
                score: sig.score,
                breakdown: sig.breakdown,
            });
        }

        let narrative = match &self.narrative {
            Some(service) if sig.history_type.triggers_regeneration() => {
                info!(topic_id, history_type = %sig.history_type.as_str(), "Regenerating narrative");
                Some(
                    service
                        .generate(&topic, NarrativeEvent::Regeneration(sig.history_type))
                        .await?,
                )
            }
            _ => None,
        };

        let _guard = self.locks.lock(topic_id).await;
        let Some(mut topic) = self.store.get_topic(topic_id).await? else {
            return Ok(HistoryCheck::Skipped);
        };
        if topic.status != TopicStatus::Active {
            return Ok(HistoryCheck::Skipped);
        }

        let was_regenerated = narrative.is_some();
        if let Some(result) = &narrative {
            apply_narrative(&mut topic, result, NarrativeEvent::Regeneration(sig.history_type), now);
        }

        let point = self
            .append_locked(&mut topic, sig.history_type, sig.score, sig.breakdown, was_regenerated, now)
            .await?;
        Ok(HistoryCheck::Recorded {
            point_id: point.id,
            history_type: point.history_type,
            score: point.significance_score,
            was_regenerated,
        })
    }

    /// Record the `initial` point of a freshly titled topic and save it.
    /// Caller holds the topic lock.
    pub async fn record_initial(&self, topic: &mut Topic, now: DateTime<Utc>) -> Result<HistoryPoint> {
        self.append_locked(topic, HistoryType::Initial, 1.0, SignificanceBreakdown::Initial, true, now)
            .await
    }

    /// Force a snapshot regardless of significance
    pub async fn record_manual(&self, topic_id: &str, now: DateTime<Utc>) -> Result<HistoryPoint> {
        let _guard = self.locks.lock(topic_id).await;
        let mut topic = self
            .store
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))?;
        self.append_locked(&mut topic, HistoryType::Manual, 1.0, SignificanceBreakdown::Manual, false, now)
            .await
    }

    /// Newest-first history of a topic, including deleted ones
    pub async fn timeline(&self, topic_id: &str, limit: Option<usize>) -> Result<Vec<HistoryPoint>> {
        self.store
            .list_history_points(topic_id, limit.unwrap_or(self.config.timeline_limit))
            .await
    }

    async fn append_locked(
        &self,
        topic: &mut Topic,
        history_type: HistoryType,
        score: f64,
        breakdown: SignificanceBreakdown,
        was_regenerated: bool,
        now: DateTime<Utc>,
    ) -> Result<HistoryPoint> {
        let point = HistoryPoint::capture(topic, history_type, score, breakdown, was_regenerated, now);

        let previous = (topic.history_point_count, topic.last_history_point);
        topic.history_point_count += 1;
        topic.last_history_point = Some(now);
        if let Err(e) = self.store.save_topic_with_history(topic, &point).await {
            (topic.history_point_count, topic.last_history_point) = previous;
            return Err(e);
        }

        info!(
            topic_id = %topic.id,
            history_type = %history_type.as_str(),
            score,
            was_regenerated,
            "Recorded history point"
        );
        Ok(point)
    }

    /// Check every active titled topic once
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<HistoryCycleStats> {
        let mut stats = HistoryCycleStats::default();
        let ids: Vec<String> = self
            .store
            .list_topics(None, Some(TopicStatus::Active))
            .await?
            .into_iter()
            .filter(|t| t.has_title)
            .map(|t| t.id)
            .collect();
        let total = ids.len();
        info!(total, "History check cycle started");

        for batch in ids.chunks(self.config.batch_size.max(1)) {
            for topic_id in batch {
                stats.topics_checked += 1;
                match self.check_topic(topic_id, now).await {
                    Ok(HistoryCheck::Recorded {
                        history_type,
                        was_regenerated,
                        ..
                    }) => {
                        stats.histories_created += 1;
                        *stats.by_type.entry(history_type.as_str().to_string()).or_default() += 1;
                        if was_regenerated {
                            stats.regenerations += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(e) if e.is_provider_failure() => {
                        warn!(topic_id = %topic_id, "Narrative regeneration failed, skipping topic: {}", e);
                        stats.provider_failures += 1;
                    }
                    Err(e) => {
                        warn!(topic_id = %topic_id, "History check failed: {}", e);
                        stats.errors += 1;
                    }
                }
            }
            debug!(checked = stats.topics_checked, total, "History batch done");
        }

        info!(
            checked = stats.topics_checked,
            created = stats.histories_created,
            regenerations = stats.regenerations,
            errors = stats.errors,
            "History check cycle complete"
        );
        Ok(stats)
    }
}
