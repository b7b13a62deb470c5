//! Default values for configuration

use std::collections::BTreeMap;

/// Default embedding backend URL
pub fn default_embedding_url() -> String {
    std::env::var("STORYLINE_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

/// Default embedding dimension (must match model)
pub fn default_embedding_dimension() -> usize {
    3072
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default embedding requests per second
pub fn default_embedding_rps() -> u32 {
    5
}

/// Default: narrative generation enabled
pub fn default_narrative_enabled() -> bool {
    true
}

/// Default narrative backend URL
pub fn default_narrative_url() -> String {
    std::env::var("STORYLINE_NARRATIVE_URL").unwrap_or_else(|_| "http://127.0.0.1:7998".to_string())
}

/// Default narrative model
pub fn default_narrative_model() -> String {
    "gemini-2.5-flash".to_string()
}

/// Default narrative request timeout in seconds
pub fn default_narrative_timeout() -> u64 {
    60
}

/// Default delay between consecutive narrative calls (4 seconds)
pub fn default_narrative_call_delay() -> u64 {
    4000
}

/// Titles above this many words are logged, not rejected
pub fn default_max_title_words() -> usize {
    12
}

/// Default number of member articles sent as narrative context
pub fn default_context_articles() -> usize {
    10
}

/// Default similarity threshold for assigning an article to a topic
pub fn default_similarity_threshold() -> f64 {
    0.70
}

/// Default threshold for auto-merging near-duplicate topics
pub fn default_near_duplicate_threshold() -> f64 {
    0.80
}

/// Default extra similarity required to resurrect a stale topic
pub fn default_resurrection_bonus() -> f64 {
    0.15
}

/// Default maximum age of a stale topic that may still be resurrected
pub fn default_max_resurrection_age_days() -> i64 {
    14
}

/// Default confidence of a freshly created topic
pub fn default_initial_confidence() -> f64 {
    0.5
}

/// Default confidence increment for each new contributing source
pub fn default_confidence_increment() -> f64 {
    0.1
}

/// Default minimum member count before a topic can be titled
pub fn default_min_articles_for_title() -> usize {
    2
}

/// Default minimum confidence before a topic can be titled
pub fn default_confidence_threshold() -> f64 {
    0.6
}

/// Default margin below the similarity threshold that is logged as a near miss
pub fn default_near_miss_margin() -> f64 {
    0.05
}

/// Default number of articles clustered concurrently
pub fn default_clustering_concurrency() -> usize {
    4
}

/// Default ranking weight for recency
pub fn default_recency_weight() -> f64 {
    0.4
}

/// Default ranking weight for source priority
pub fn default_source_priority_weight() -> f64 {
    0.3
}

/// Default ranking weight for similarity to the topic centroid
pub fn default_centroid_similarity_weight() -> f64 {
    0.2
}

/// Default ranking weight for content quality
pub fn default_content_quality_weight() -> f64 {
    0.1
}

/// Default age at which recency decays to zero (30 days)
pub fn default_recency_horizon_hours() -> f64 {
    720.0
}

/// Default word count that earns a full content-quality score
pub fn default_quality_word_target() -> u32 {
    1000
}

/// Default "new" tier: up to 7 days old, 30 articles
pub fn default_new_tier() -> super::TierLimit {
    super::TierLimit {
        max_age_days: Some(7),
        max_articles: 30,
    }
}

/// Default "active" tier: up to 30 days old, 15 articles
pub fn default_active_tier() -> super::TierLimit {
    super::TierLimit {
        max_age_days: Some(30),
        max_articles: 15,
    }
}

/// Default "mature" tier: unbounded age, 10 articles
pub fn default_mature_tier() -> super::TierLimit {
    super::TierLimit {
        max_age_days: None,
        max_articles: 10,
    }
}

/// Default article retention for categories without an override
pub fn default_retention_days() -> i64 {
    30
}

/// Default per-category retention overrides
pub fn default_category_retention() -> BTreeMap<String, i64> {
    ["technology", "finance", "politics"]
        .into_iter()
        .map(|c| (c.to_string(), 30))
        .collect()
}

/// Default time an archived article is kept before it is purged
pub fn default_archived_purge_days() -> i64 {
    30
}

/// Default grace period for unclustered articles
pub fn default_orphan_grace_days() -> i64 {
    3
}

/// Default idle time before an active topic goes stale
pub fn default_topic_stale_days() -> i64 {
    7
}

/// Default time a topic stays stale before it is archived
pub fn default_topic_archive_days() -> i64 {
    30
}

/// Default time a topic stays archived before it is deleted
pub fn default_topic_delete_days() -> i64 {
    90
}

/// Default minimum member count for a stale/archived topic to survive
pub fn default_min_topic_articles() -> usize {
    2
}

/// Default history weight for article growth
pub fn default_growth_weight() -> f64 {
    0.30
}

/// Default history weight for source diversity
pub fn default_source_diversity_weight() -> f64 {
    0.25
}

/// Default history weight for confidence change
pub fn default_confidence_change_weight() -> f64 {
    0.20
}

/// Default history weight for embedding drift
pub fn default_embedding_drift_weight() -> f64 {
    0.15
}

/// Default history weight for elapsed time
pub fn default_time_factor_weight() -> f64 {
    0.10
}

/// Default minimum new articles for full growth significance
pub fn default_min_new_articles() -> usize {
    5
}

/// Default minimum new sources for full source significance
pub fn default_min_new_sources() -> usize {
    2
}

/// Default minimum confidence delta
pub fn default_min_confidence_delta() -> f64 {
    0.15
}

/// Default minimum centroid drift
pub fn default_min_embedding_drift() -> f64 {
    0.20
}

/// Default minimum hours between snapshots
pub fn default_min_elapsed_hours() -> f64 {
    48.0
}

/// New-article count at which growth saturates
pub fn default_growth_saturation() -> f64 {
    20.0
}

/// New-source count at which source diversity saturates
pub fn default_source_saturation() -> f64 {
    5.0
}

/// Confidence delta at which the confidence factor saturates
pub fn default_confidence_saturation() -> f64 {
    0.3
}

/// Drift at which the drift factor saturates
pub fn default_drift_saturation() -> f64 {
    0.4
}

/// Elapsed hours at which the time factor saturates (7 days)
pub fn default_time_saturation_hours() -> f64 {
    168.0
}

/// Default significance threshold
pub fn default_significance_threshold() -> f64 {
    0.60
}

/// Default periodic snapshot interval
pub fn default_periodic_snapshot_days() -> f64 {
    7.0
}

/// Default member count required for a periodic snapshot
pub fn default_periodic_min_articles() -> usize {
    10
}

/// Default margin added above the threshold by a periodic snapshot
pub fn default_periodic_margin() -> f64 {
    0.05
}

/// Default score a dominant factor needs to name the history type
pub fn default_dominance_floor() -> f64 {
    0.7
}

/// Default number of history points returned by a timeline query
pub fn default_timeline_limit() -> usize {
    50
}

/// Default number of topics loaded per history cycle batch
pub fn default_history_batch_size() -> usize {
    50
}

/// Default minutes between scheduled pipeline runs
pub fn default_schedule_interval() -> u64 {
    60
}
