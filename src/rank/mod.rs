//! Article ranking within a topic
//!
//! Scores an article's importance to its topic as a weighted sum of
//! recency, source priority, similarity to the topic centroid and content
//! quality. Used by the lifecycle engine to decide which members to evict.

use crate::config::RankingConfig;
use crate::models::{Article, Topic};
use crate::vector::cosine_similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Centroid similarity used when either vector is missing
const NEUTRAL_SIMILARITY: f64 = 0.5;

/// A topic member with its ranking score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedArticle {
    pub id: String,
    pub score: f64,
    pub is_seed: bool,
    /// Position in the topic's member list
    pub position: usize,
}

/// Weighted article importance model
#[derive(Debug, Clone)]
pub struct RankingModel {
    config: RankingConfig,
}

impl RankingModel {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Score in [0, 1]
    pub fn score(&self, article: &Article, topic: &Topic, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - article.ingested_at).num_seconds() as f64 / 3600.0;
        let recency = (1.0 - age_hours / self.config.recency_horizon_hours).clamp(0.0, 1.0);

        let priority = article.source_priority.weight();

        let similarity = match article.embedding.as_deref() {
            Some(embedding) if !embedding.is_empty() && !topic.centroid.is_empty() => {
                cosine_similarity(embedding, &topic.centroid).clamp(0.0, 1.0)
            }
            _ => NEUTRAL_SIMILARITY,
        };

        let target = self.config.quality_word_target.max(1) as f64;
        let quality = (article.word_count as f64 / target).min(1.0);

        self.config.recency * recency
            + self.config.source_priority * priority
            + self.config.centroid_similarity * similarity
            + self.config.content_quality * quality
    }

    /// Rank the topic's members, best first.
    ///
    /// The seed always sorts first. Ties keep member-list order. Members
    /// missing from `articles` rank last with a score of zero.
    pub fn rank_members(&self, topic: &Topic, articles: &[Article], now: DateTime<Utc>) -> Vec<RankedArticle> {
        let mut ranked: Vec<RankedArticle> = topic
            .article_ids
            .iter()
            .enumerate()
            .map(|(position, id)| RankedArticle {
                id: id.clone(),
                score: articles
                    .iter()
                    .find(|a| &a.id == id)
                    .map(|a| self.score(a, topic, now))
                    .unwrap_or(0.0),
                is_seed: position == 0,
                position,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.is_seed
                .cmp(&a.is_seed)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| a.position.cmp(&b.position))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourcePriority;
    use chrono::Duration;

    fn article(priority: SourcePriority, age_hours: i64, words: u32, now: DateTime<Utc>) -> Article {
        let mut a = Article::new("tech", "Wire", "Headline");
        a.source_priority = priority;
        a.ingested_at = now - Duration::hours(age_hours);
        a.word_count = words;
        a.embedding = Some(vec![1.0, 0.0]);
        a
    }

    #[test]
    fn test_score_components() {
        let now = Utc::now();
        let model = RankingModel::new(RankingConfig::default());
        let fresh = article(SourcePriority::High, 0, 1000, now);
        let topic = Topic::new(&fresh, vec![1.0, 0.0], 0.5, now);

        // every component maxed out
        assert!((model.score(&fresh, &topic, now) - 1.0).abs() < 1e-9);

        // 30 days old, low priority, orthogonal, empty
        let mut stale = article(SourcePriority::Low, 720, 0, now);
        stale.embedding = Some(vec![0.0, 1.0]);
        assert!((model.score(&stale, &topic, now) - 0.3 * 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_missing_embedding_is_neutral() {
        let now = Utc::now();
        let model = RankingModel::new(RankingConfig::default());
        let mut a = article(SourcePriority::Medium, 1440, 500, now);
        a.embedding = None;
        let topic = Topic::new(&a, vec![1.0, 0.0], 0.5, now);

        let expected = 0.3 * 0.6 + 0.2 * 0.5 + 0.1 * 0.5;
        assert!((model.score(&a, &topic, now) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_seed_ranks_first_regardless_of_score() {
        let now = Utc::now();
        let model = RankingModel::new(RankingConfig::default());
        let seed = article(SourcePriority::Low, 700, 0, now);
        let strong = article(SourcePriority::High, 0, 2000, now);
        let weak = article(SourcePriority::Medium, 100, 10, now);

        let mut topic = Topic::new(&seed, vec![1.0, 0.0], 0.5, now);
        topic.article_ids.push(weak.id.clone());
        topic.article_ids.push(strong.id.clone());

        let ranked = model.rank_members(&topic, &[seed.clone(), strong.clone(), weak.clone()], now);
        let order: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec![seed.id.as_str(), strong.id.as_str(), weak.id.as_str()]);
        assert!(ranked[0].is_seed);
    }
}
