//! Topic and article lifecycle
//!
//! Two entry points:
//! - [`LifecycleEngine::trim`] caps a topic's membership by age tier, evicting
//!   the lowest-ranked articles while always keeping the seed.
//! - [`LifecycleEngine::run_sweep`] is the periodic batch job: article
//!   retention, purge of long-archived articles, orphan archiving, the topic
//!   state machine (active -> stale -> archived -> deleted) and early pruning
//!   of undersized dormant topics.
//!
//! Status transitions go through compare-and-set updates in the store so a
//! sweep never races a resurrection. Anything that rewrites a topic's member
//! list holds that topic's lock.

use crate::config::{LifecycleConfig, RankingConfig, TierLimit};
use crate::error::{Error, Result};
use crate::locks::TopicLocks;
use crate::models::{Article, ArticleStatus, TopicStatus};
use crate::rank::RankingModel;
use crate::store::{NewsStore, RetentionScope, Transition};
use crate::vector::centroid;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Age bracket deciding a topic's article cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeTier {
    New,
    Active,
    Mature,
}

impl AgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeTier::New => "new",
            AgeTier::Active => "active",
            AgeTier::Mature => "mature",
        }
    }
}

impl std::fmt::Display for AgeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of trimming one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimOutcome {
    pub topic_id: String,
    pub trimmed: usize,
    pub retained: usize,
    pub tier: AgeTier,
    pub max_allowed: usize,
}

/// Counters reported by one lifecycle sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepStats {
    pub articles_expired: u64,
    pub articles_purged: u64,
    pub articles_orphaned: u64,
    pub topics_staled: usize,
    pub topics_archived: usize,
    pub topics_deleted: usize,
    pub topics_pruned: usize,
    pub articles_requeued: u64,
    pub errors: usize,
}

pub struct LifecycleEngine {
    config: LifecycleConfig,
    ranking: RankingModel,
    store: NewsStore,
    locks: TopicLocks,
}

impl LifecycleEngine {
    pub fn new(config: LifecycleConfig, ranking: RankingConfig, store: NewsStore, locks: TopicLocks) -> Self {
        Self {
            config,
            ranking: RankingModel::new(ranking),
            store,
            locks,
        }
    }

    /// Tier of a topic created `age_days` ago
    pub fn age_tier(&self, age_days: i64) -> (AgeTier, &TierLimit) {
        let within = |limit: &TierLimit| limit.max_age_days.map_or(true, |max| age_days <= max);
        if within(&self.config.new_tier) {
            (AgeTier::New, &self.config.new_tier)
        } else if within(&self.config.active_tier) {
            (AgeTier::Active, &self.config.active_tier)
        } else {
            (AgeTier::Mature, &self.config.mature_tier)
        }
    }

    /// Evict the lowest-ranked members beyond the topic's tier cap
    pub async fn trim(&self, topic_id: &str, now: DateTime<Utc>) -> Result<TrimOutcome> {
        let _guard = self.locks.lock(topic_id).await;
        let mut topic = self
            .store
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))?;

        let (tier, limit) = self.age_tier(topic.age_days(now));
        let max_allowed = limit.max_articles;
        let count = topic.article_count();

        if count <= max_allowed {
            return Ok(TrimOutcome {
                topic_id: topic.id,
                trimmed: 0,
                retained: count,
                tier,
                max_allowed,
            });
        }

        let members = self.store.get_articles(&topic.article_ids).await?;
        let ranked = self.ranking.rank_members(&topic, &members, now);
        let keep: HashSet<&str> = ranked.iter().take(max_allowed).map(|r| r.id.as_str()).collect();

        let (kept, evicted): (Vec<String>, Vec<String>) = topic
            .article_ids
            .iter()
            .cloned()
            .partition(|id| keep.contains(id.as_str()));

        let vectors = self.store.member_embeddings(&kept).await?;
        match centroid(&vectors) {
            Some(c) => topic.centroid = c,
            None => warn!(topic_id, "No member embeddings after trim, keeping previous centroid"),
        }
        topic.article_ids = kept;
        topic.last_trimmed = Some(now);
        self.store.save_topic(&mut topic).await?;
        self.store
            .detach_articles(&evicted, ArticleStatus::ArchivedFromTopic, now)
            .await?;

        info!(
            topic_id,
            tier = %tier,
            trimmed = evicted.len(),
            retained = topic.article_count(),
            "Trimmed topic"
        );

        Ok(TrimOutcome {
            topic_id: topic.id.clone(),
            trimmed: evicted.len(),
            retained: topic.article_count(),
            tier,
            max_allowed,
        })
    }

    /// Run every retention and state-machine step once
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepStats> {
        let mut stats = SweepStats::default();

        stats.articles_expired = self.expire_articles(now).await?;
        stats.articles_purged = self.purge_archived(now, &mut stats).await?;
        stats.articles_orphaned = self
            .store
            .archive_orphans(now - Duration::days(self.config.orphan_grace_days), now)
            .await?;

        self.advance_topics(now, &mut stats).await?;
        self.prune_small_topics(now, &mut stats).await?;

        info!(
            expired = stats.articles_expired,
            purged = stats.articles_purged,
            orphaned = stats.articles_orphaned,
            staled = stats.topics_staled,
            archived = stats.topics_archived,
            deleted = stats.topics_deleted,
            pruned = stats.topics_pruned,
            errors = stats.errors,
            "Lifecycle sweep complete"
        );
        Ok(stats)
    }

    async fn expire_articles(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut expired = 0;
        for (category, days) in &self.config.category_retention_days {
            expired += self
                .store
                .expire_articles(RetentionScope::Category(category), now - Duration::days(*days), now)
                .await?;
        }

        let known: Vec<String> = self.config.category_retention_days.keys().cloned().collect();
        expired += self
            .store
            .expire_articles(
                RetentionScope::Others(&known),
                now - Duration::days(self.config.default_retention_days),
                now,
            )
            .await?;

        if expired > 0 {
            debug!(expired, "Expired articles past retention");
        }
        Ok(expired)
    }

    /// Delete long-archived articles, pulling any still-listed ones out of
    /// their topic first
    async fn purge_archived(&self, now: DateTime<Utc>, stats: &mut SweepStats) -> Result<u64> {
        let purgeable = self
            .store
            .list_purgeable_articles(now - Duration::days(self.config.archived_purge_days))
            .await?;
        if purgeable.is_empty() {
            return Ok(0);
        }

        let mut by_topic: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut deletable = Vec::new();
        for article in purgeable {
            match article.topic_id {
                Some(topic_id) => by_topic.entry(topic_id).or_default().push(article.id),
                None => deletable.push(article.id),
            }
        }

        for (topic_id, ids) in by_topic {
            match self.remove_members(&topic_id, &ids).await {
                Ok(()) => deletable.extend(ids),
                Err(e) => {
                    warn!(topic_id = %topic_id, "Failed to detach purged articles: {}", e);
                    stats.errors += 1;
                }
            }
        }

        self.store.delete_articles(&deletable).await
    }

    async fn remove_members(&self, topic_id: &str, ids: &[String]) -> Result<()> {
        let _guard = self.locks.lock(topic_id).await;
        let Some(mut topic) = self.store.get_topic(topic_id).await? else {
            return Ok(());
        };

        let gone: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = topic.article_count();
        topic.article_ids.retain(|id| !gone.contains(id.as_str()));
        if topic.article_count() == before {
            return Ok(());
        }

        let vectors = self.store.member_embeddings(&topic.article_ids).await?;
        if let Some(c) = centroid(&vectors) {
            topic.centroid = c;
        }
        self.store.save_topic(&mut topic).await
    }

    async fn advance_topics(&self, now: DateTime<Utc>, stats: &mut SweepStats) -> Result<()> {
        let idle_before = now - Duration::days(self.config.topic_stale_days);
        for topic in self.store.list_topics(None, Some(TopicStatus::Active)).await? {
            if topic.last_updated >= idle_before {
                continue;
            }
            if self
                .transition(&topic.id, Transition::MarkStale { idle_before }, now, stats)
                .await
            {
                debug!(topic_id = %topic.id, "Topic went stale");
                stats.topics_staled += 1;
            }
        }

        let stale_before = now - Duration::days(self.config.topic_archive_days);
        for topic in self.store.list_topics(None, Some(TopicStatus::Stale)).await? {
            if topic.stale_since.map_or(true, |since| since >= stale_before) {
                continue;
            }
            if self
                .transition(&topic.id, Transition::Archive { stale_before }, now, stats)
                .await
            {
                debug!(topic_id = %topic.id, "Topic archived");
                stats.topics_archived += 1;
            }
        }

        let archived_before = now - Duration::days(self.config.topic_delete_days);
        for topic in self.store.list_topics(None, Some(TopicStatus::Archived)).await? {
            if topic.archived_at.map_or(true, |at| at >= archived_before) {
                continue;
            }
            match self
                .delete_topic(&topic.id, TopicStatus::Archived, ArticleStatus::ArchivedTopicDeleted, now)
                .await
            {
                Ok(Some(_)) => stats.topics_deleted += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(topic_id = %topic.id, "Failed to delete archived topic: {}", e);
                    stats.errors += 1;
                }
            }
        }
        Ok(())
    }

    /// Apply one status transition; a failure is counted and the sweep
    /// moves on to the next topic
    async fn transition(
        &self,
        topic_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
        stats: &mut SweepStats,
    ) -> bool {
        match self.store.transition_status(topic_id, transition, now).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(topic_id, ?transition, "Failed to change topic status: {}", e);
                stats.errors += 1;
                false
            }
        }
    }

    /// Delete stale/archived topics below the minimum size and send their
    /// live articles back to clustering
    async fn prune_small_topics(&self, now: DateTime<Utc>, stats: &mut SweepStats) -> Result<()> {
        for status in [TopicStatus::Stale, TopicStatus::Archived] {
            for topic in self.store.list_topics(None, Some(status)).await? {
                if topic.article_count() >= self.config.min_topic_articles {
                    continue;
                }
                match self
                    .delete_topic(&topic.id, status, ArticleStatus::PendingClustering, now)
                    .await
                {
                    Ok(Some(requeued)) => {
                        info!(topic_id = %topic.id, requeued, "Pruned undersized topic");
                        stats.topics_pruned += 1;
                        stats.articles_requeued += requeued;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(topic_id = %topic.id, "Failed to prune topic: {}", e);
                        stats.errors += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Detach every member, then delete the topic if it is still in
    /// `expected`. Members that are already archived are marked
    /// `archived_topic_deleted`; live ones move to `live_status`.
    ///
    /// Returns the number of live members moved, or `None` if the topic
    /// disappeared or changed state.
    async fn delete_topic(
        &self,
        topic_id: &str,
        expected: TopicStatus,
        live_status: ArticleStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let _guard = self.locks.lock(topic_id).await;
        let Some(topic) = self.store.get_topic(topic_id).await? else {
            return Ok(None);
        };
        if topic.status != expected {
            return Ok(None);
        }

        let members = self.store.get_articles(&topic.article_ids).await?;
        let (archived, live): (Vec<Article>, Vec<Article>) =
            members.into_iter().partition(|a| a.status.is_archived());
        let live_ids: Vec<String> = live.into_iter().map(|a| a.id).collect();
        let archived_ids: Vec<String> = archived.into_iter().map(|a| a.id).collect();

        let moved = self.store.detach_articles(&live_ids, live_status, now).await?;
        self.store
            .detach_articles(&archived_ids, ArticleStatus::ArchivedTopicDeleted, now)
            .await?;

        if !self.store.delete_topic(&topic.id, expected).await? {
            warn!(topic_id, "Topic changed state during delete");
            return Ok(None);
        }
        info!(topic_id, members = topic.article_count(), "Deleted topic");
        Ok(Some(moved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourcePriority, Topic};
    use crate::testing::test_store;
    use tempfile::TempDir;

    async fn engine() -> (LifecycleEngine, NewsStore, TempDir) {
        let (store, tmp) = test_store().await;
        let engine = LifecycleEngine::new(
            LifecycleConfig::default(),
            RankingConfig::default(),
            store.clone(),
            TopicLocks::new(),
        );
        (engine, store, tmp)
    }

    fn member(ingested_hours_ago: i64, now: DateTime<Utc>) -> Article {
        let mut a = Article::new("tech", "Wire", "Story");
        a.embedding = Some(vec![1.0, 0.0]);
        a.ingested_at = now - Duration::hours(ingested_hours_ago);
        a.published_at = a.ingested_at;
        a.word_count = 800;
        a.source_priority = SourcePriority::High;
        a
    }

    /// Insert articles and a topic owning all of them, first one as seed
    async fn topic_with(store: &NewsStore, articles: &[Article], created: DateTime<Utc>) -> Topic {
        for a in articles {
            store.insert_article(a).await.unwrap();
        }
        let mut topic = Topic::new(&articles[0], vec![1.0, 0.0], 0.5, created);
        topic.article_ids = articles.iter().map(|a| a.id.clone()).collect();
        store.insert_topic(&topic).await.unwrap();
        for a in articles {
            store.attach_article(&a.id, &topic.id).await.unwrap();
        }
        topic
    }

    #[tokio::test]
    async fn test_age_tiers() {
        let (engine, _store, _tmp) = engine().await;
        assert_eq!(engine.age_tier(0).0, AgeTier::New);
        assert_eq!(engine.age_tier(7).0, AgeTier::New);
        assert_eq!(engine.age_tier(8).0, AgeTier::Active);
        assert_eq!(engine.age_tier(30).0, AgeTier::Active);
        let (tier, limit) = engine.age_tier(31);
        assert_eq!(tier, AgeTier::Mature);
        assert_eq!(limit.max_articles, 10);
    }

    #[tokio::test]
    async fn test_trim_at_cap_is_noop() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let articles: Vec<Article> = (0..30).map(|i| member(i, now)).collect();
        let topic = topic_with(&store, &articles, now).await;

        let outcome = engine.trim(&topic.id, now).await.unwrap();
        assert_eq!(outcome.trimmed, 0);
        assert_eq!(outcome.retained, 30);
        assert_eq!(outcome.tier, AgeTier::New);

        let stored = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert!(stored.last_trimmed.is_none());
    }

    #[tokio::test]
    async fn test_trim_evicts_lowest_ranked_and_keeps_seed() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();

        // a seed that would rank last on its own merits
        let mut seed = member(600, now);
        seed.source_priority = SourcePriority::Low;
        seed.word_count = 0;
        seed.embedding = Some(vec![0.0, 1.0]);

        let mut weakest = member(500, now);
        weakest.source_priority = SourcePriority::Low;
        weakest.word_count = 10;

        let mut articles = vec![seed.clone()];
        articles.extend((0..15).map(|i| member(i, now)));
        articles.push(weakest.clone());
        articles.extend((15..29).map(|i| member(i, now)));
        assert_eq!(articles.len(), 31);

        let topic = topic_with(&store, &articles, now).await;
        let outcome = engine.trim(&topic.id, now).await.unwrap();
        assert_eq!(outcome.trimmed, 1);
        assert_eq!(outcome.retained, 30);

        let stored = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(stored.seed_id(), Some(seed.id.as_str()));
        assert!(!stored.article_ids.contains(&weakest.id));
        assert!(stored.last_trimmed.is_some());

        let evicted = store.get_article(&weakest.id).await.unwrap().unwrap();
        assert_eq!(evicted.status, ArticleStatus::ArchivedFromTopic);
        assert!(evicted.topic_id.is_none());
        assert_eq!(evicted.former_topic_id.as_deref(), Some(topic.id.as_str()));

        // centroid follows the retained set: 1 seed at [0,1], 29 at [1,0]
        assert!((stored.centroid[0] - 29.0 / 30.0).abs() < 1e-5);
        assert!((stored.centroid[1] - 1.0 / 30.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_trim_mature_topic_to_ten() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let articles: Vec<Article> = (0..12).map(|i| member(i, now)).collect();
        let topic = topic_with(&store, &articles, now - Duration::days(40)).await;

        let outcome = engine.trim(&topic.id, now).await.unwrap();
        assert_eq!(outcome.tier, AgeTier::Mature);
        assert_eq!(outcome.trimmed, 2);

        // the two oldest non-seed members go; order of the rest is preserved
        let stored = store.get_topic(&topic.id).await.unwrap().unwrap();
        let expected: Vec<String> = articles[..10].iter().map(|a| a.id.clone()).collect();
        assert_eq!(stored.article_ids, expected);
    }

    #[tokio::test]
    async fn test_retention_expires_and_purges() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();

        let fresh = member(1, now);
        let old = member(24 * 31, now);
        let topic = topic_with(&store, &[fresh.clone(), old.clone()], now).await;

        let mut long_archived = member(24 * 90, now);
        long_archived.status = ArticleStatus::ArchivedFromTopic;
        long_archived.archived_at = Some(now - Duration::days(31));
        store.insert_article(&long_archived).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.articles_expired, 1);
        assert_eq!(stats.articles_purged, 1);

        let expired = store.get_article(&old.id).await.unwrap().unwrap();
        assert_eq!(expired.status, ArticleStatus::ArchivedExpired);
        assert!(store.get_article(&long_archived.id).await.unwrap().is_none());
        assert_eq!(
            store.get_article(&fresh.id).await.unwrap().unwrap().status,
            ArticleStatus::Clustered
        );
        assert_eq!(store.get_topic(&topic.id).await.unwrap().unwrap().article_count(), 2);
    }

    #[tokio::test]
    async fn test_purge_detaches_member_and_recomputes_centroid() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();

        let keep = member(1, now);
        let mut expired = member(2, now);
        expired.embedding = Some(vec![0.0, 1.0]);
        let topic = topic_with(&store, &[keep.clone(), expired.clone()], now).await;

        // expired long ago but still listed in the topic
        store
            .expire_articles(RetentionScope::Others(&[]), now, now - Duration::days(40))
            .await
            .unwrap();
        store
            .detach_articles(&[keep.id.clone()], ArticleStatus::Clustered, now)
            .await
            .unwrap();
        store.attach_article(&keep.id, &topic.id).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.articles_purged, 1);

        let stored = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(stored.article_ids, vec![keep.id.clone()]);
        assert_eq!(stored.centroid, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_orphans_are_archived_after_grace() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let orphan = member(24 * 4, now);
        let recent = member(24, now);
        store.insert_article(&orphan).await.unwrap();
        store.insert_article(&recent).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.articles_orphaned, 1);
        assert_eq!(
            store.get_article(&orphan.id).await.unwrap().unwrap().status,
            ArticleStatus::ArchivedOrphan
        );
        assert_eq!(
            store.get_article(&recent.id).await.unwrap().unwrap().status,
            ArticleStatus::PendingClustering
        );
    }

    #[tokio::test]
    async fn test_topic_state_machine() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();

        let idle = topic_with(&store, &[member(1, now), member(2, now)], now - Duration::days(10)).await;
        let mut busy = topic_with(&store, &[member(1, now), member(2, now)], now - Duration::days(10)).await;
        busy.last_updated = now - Duration::days(1);
        store.save_topic(&mut busy).await.unwrap();

        let mut old_stale = topic_with(&store, &[member(1, now), member(2, now)], now - Duration::days(60)).await;
        old_stale.status = TopicStatus::Stale;
        old_stale.stale_since = Some(now - Duration::days(31));
        store.save_topic(&mut old_stale).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.topics_staled, 1);
        assert_eq!(stats.topics_archived, 1);

        let idle = store.get_topic(&idle.id).await.unwrap().unwrap();
        assert_eq!(idle.status, TopicStatus::Stale);
        assert!(idle.stale_since.is_some());
        assert_eq!(store.get_topic(&busy.id).await.unwrap().unwrap().status, TopicStatus::Active);
        let archived = store.get_topic(&old_stale.id).await.unwrap().unwrap();
        assert_eq!(archived.status, TopicStatus::Archived);
        assert!(archived.archived_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_transition_does_not_abort_sweep() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();

        let mut ids = Vec::new();
        for source in ["Wire", "Post"] {
            let seed = Article::new("tech", source, "Story");
            store.insert_article(&seed).await.unwrap();
            let mut topic = Topic::new(&seed, vec![1.0, 0.0], 0.5, now - Duration::days(20));
            topic.article_ids.push(format!("{}-follow-up", source));
            store.insert_topic(&topic).await.unwrap();
            ids.push(topic.id);
        }
        store
            .execute_raw(&format!(
                "CREATE TRIGGER pin_status BEFORE UPDATE OF status ON topics WHEN OLD.id = '{}' \
                 BEGIN SELECT RAISE(ABORT, 'status pinned'); END",
                ids[0]
            ))
            .await
            .unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.topics_staled, 1);
        assert_eq!(stats.errors, 1);

        let pinned = store.get_topic(&ids[0]).await.unwrap().unwrap();
        assert_eq!(pinned.status, TopicStatus::Active);
        let moved = store.get_topic(&ids[1]).await.unwrap().unwrap();
        assert_eq!(moved.status, TopicStatus::Stale);
    }

    #[tokio::test]
    async fn test_archived_topic_deleted_after_detaching_members() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let articles = vec![member(1, now), member(2, now)];
        let mut topic = topic_with(&store, &articles, now - Duration::days(200)).await;
        topic.status = TopicStatus::Archived;
        topic.archived_at = Some(now - Duration::days(91));
        store.save_topic(&mut topic).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.topics_deleted, 1);
        assert!(store.get_topic(&topic.id).await.unwrap().is_none());

        for a in &articles {
            let stored = store.get_article(&a.id).await.unwrap().unwrap();
            assert_eq!(stored.status, ArticleStatus::ArchivedTopicDeleted);
            assert!(stored.topic_id.is_none());
            assert_eq!(stored.former_topic_id.as_deref(), Some(topic.id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_small_dormant_topic_requeues_articles() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let lonely = member(1, now);
        let mut topic = topic_with(&store, &[lonely.clone()], now - Duration::days(9)).await;
        topic.status = TopicStatus::Stale;
        topic.stale_since = Some(now - Duration::days(1));
        store.save_topic(&mut topic).await.unwrap();

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.topics_pruned, 1);
        assert_eq!(stats.articles_requeued, 1);
        assert!(store.get_topic(&topic.id).await.unwrap().is_none());

        let requeued = store.get_article(&lonely.id).await.unwrap().unwrap();
        assert_eq!(requeued.status, ArticleStatus::PendingClustering);
        assert!(requeued.topic_id.is_none());
        assert!(requeued.archived_at.is_none());
    }

    #[tokio::test]
    async fn test_small_active_topic_survives() {
        let (engine, store, _tmp) = engine().await;
        let now = Utc::now();
        let topic = topic_with(&store, &[member(1, now)], now).await;

        let stats = engine.run_sweep(now).await.unwrap();
        assert_eq!(stats.topics_pruned, 0);
        assert!(store.get_topic(&topic.id).await.unwrap().is_some());
    }
}
