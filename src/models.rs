//! Domain types shared by the engines and the store

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

/// Article lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    PendingClustering,
    Clustered,
    ArchivedExpired,
    ArchivedFromTopic,
    ArchivedOrphan,
    ArchivedTopicDeleted,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 6] = [
        ArticleStatus::PendingClustering,
        ArticleStatus::Clustered,
        ArticleStatus::ArchivedExpired,
        ArticleStatus::ArchivedFromTopic,
        ArticleStatus::ArchivedOrphan,
        ArticleStatus::ArchivedTopicDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::PendingClustering => "pending_clustering",
            ArticleStatus::Clustered => "clustered",
            ArticleStatus::ArchivedExpired => "archived_expired",
            ArticleStatus::ArchivedFromTopic => "archived_from_topic",
            ArticleStatus::ArchivedOrphan => "archived_orphan",
            ArticleStatus::ArchivedTopicDeleted => "archived_topic_deleted",
        }
    }

    pub fn is_archived(&self) -> bool {
        !matches!(
            self,
            ArticleStatus::PendingClustering | ArticleStatus::Clustered
        )
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ArticleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Corrupt(format!("Unknown article status: {}", s)))
    }
}

/// Editorial priority of an article's source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePriority {
    High,
    #[default]
    Medium,
    Low,
}

impl SourcePriority {
    /// Score contribution used by the ranking model
    pub fn weight(&self) -> f64 {
        match self {
            SourcePriority::High => 1.0,
            SourcePriority::Medium => 0.6,
            SourcePriority::Low => 0.3,
        }
    }
}

impl std::fmt::Display for SourcePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourcePriority::High => write!(f, "high"),
            SourcePriority::Medium => write!(f, "medium"),
            SourcePriority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for SourcePriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "high" => Ok(SourcePriority::High),
            "medium" => Ok(SourcePriority::Medium),
            "low" => Ok(SourcePriority::Low),
            _ => Err(Error::Corrupt(format!("Unknown source priority: {}", s))),
        }
    }
}

/// Topic lifecycle status (deletion removes the record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Active,
    Stale,
    Archived,
}

impl TopicStatus {
    pub const ALL: [TopicStatus; 3] = [TopicStatus::Active, TopicStatus::Stale, TopicStatus::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Active => "active",
            TopicStatus::Stale => "stale",
            TopicStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TopicStatus::Active),
            "stale" => Ok(TopicStatus::Stale),
            "archived" => Ok(TopicStatus::Archived),
            _ => Err(Error::Corrupt(format!("Unknown topic status: {}", s))),
        }
    }
}

/// Kind of change captured by a history point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    Initial,
    MajorUpdate,
    SourceExpansion,
    ConfidenceShift,
    Periodic,
    Manual,
}

impl HistoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryType::Initial => "initial",
            HistoryType::MajorUpdate => "major_update",
            HistoryType::SourceExpansion => "source_expansion",
            HistoryType::ConfidenceShift => "confidence_shift",
            HistoryType::Periodic => "periodic",
            HistoryType::Manual => "manual",
        }
    }

    /// Whether the narrative is regenerated before this snapshot is taken
    pub fn triggers_regeneration(&self) -> bool {
        matches!(self, HistoryType::MajorUpdate | HistoryType::SourceExpansion)
    }
}

impl std::fmt::Display for HistoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initial" => Ok(HistoryType::Initial),
            "major_update" => Ok(HistoryType::MajorUpdate),
            "source_expansion" => Ok(HistoryType::SourceExpansion),
            "confidence_shift" => Ok(HistoryType::ConfidenceShift),
            "periodic" => Ok(HistoryType::Periodic),
            "manual" => Ok(HistoryType::Manual),
            _ => Err(Error::Corrupt(format!("Unknown history type: {}", s))),
        }
    }
}

/// A news article as seen by the clustering core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub category: String,
    pub source: String,
    #[serde(default)]
    pub source_priority: SourcePriority,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub word_count: u32,
    pub status: ArticleStatus,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub former_topic_id: Option<String>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Article {
    /// New article waiting to be clustered
    pub fn new(category: impl Into<String>, source: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            source: source.into(),
            source_priority: SourcePriority::default(),
            title: title.into(),
            description: None,
            url: None,
            embedding: None,
            published_at: now,
            ingested_at: now,
            word_count: 0,
            status: ArticleStatus::PendingClustering,
            topic_id: None,
            former_topic_id: None,
            archived_at: None,
        }
    }

    /// Text handed to the embedding provider
    pub fn embedding_text(&self) -> String {
        match self.description.as_deref() {
            Some(desc) if !desc.trim().is_empty() => format!("{} {}", self.title, desc),
            _ => self.title.clone(),
        }
    }
}

/// An evolving cluster of articles about one story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub category: String,
    pub status: TopicStatus,
    /// Member article ids; index 0 is the seed
    pub article_ids: Vec<String>,
    pub sources: BTreeSet<String>,
    pub centroid: Vec<f32>,
    pub confidence: f64,

    pub title: Option<String>,
    pub summary: Option<String>,
    pub key_insights: Vec<String>,
    pub has_title: bool,
    /// Provider's own reliability estimate for the narrative (0..1)
    pub narrative_confidence: Option<f64>,
    pub development_note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub stale_since: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub resurrected_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merged_from: Vec<String>,
    pub title_generated_at: Option<DateTime<Utc>>,
    pub last_regenerated: Option<DateTime<Utc>>,
    pub last_trimmed: Option<DateTime<Utc>>,
    pub discussion_id: Option<String>,

    pub history_point_count: u32,
    pub last_history_point: Option<DateTime<Utc>>,

    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
}

impl Topic {
    /// New active topic seeded by `seed`
    pub fn new(seed: &Article, embedding: Vec<f32>, confidence: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category: seed.category.clone(),
            status: TopicStatus::Active,
            article_ids: vec![seed.id.clone()],
            sources: BTreeSet::from([seed.source.clone()]),
            centroid: embedding,
            confidence,
            title: None,
            summary: None,
            key_insights: Vec::new(),
            has_title: false,
            narrative_confidence: None,
            development_note: None,
            created_at: now,
            last_updated: now,
            stale_since: None,
            archived_at: None,
            resurrected_at: None,
            merged_at: None,
            merged_from: Vec::new(),
            title_generated_at: None,
            last_regenerated: None,
            last_trimmed: None,
            discussion_id: None,
            history_point_count: 0,
            last_history_point: None,
            version: 0,
        }
    }

    pub fn article_count(&self) -> usize {
        self.article_ids.len()
    }

    /// The protected seed article
    pub fn seed_id(&self) -> Option<&str> {
        self.article_ids.first().map(String::as_str)
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Raise confidence by `delta`, capped at 1.0
    pub fn bump_confidence(&mut self, delta: f64) {
        self.confidence = (self.confidence + delta).min(1.0);
    }
}

/// Per-factor significance scores, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignificanceFactors {
    pub growth: f64,
    pub source_diversity: f64,
    pub confidence_change: f64,
    pub embedding_drift: f64,
    pub time_factor: f64,
}

/// Raw change measured since the last snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetrics {
    pub new_articles: i64,
    pub growth_ratio: f64,
    pub new_sources: usize,
    pub confidence_delta: f64,
    pub embedding_drift: f64,
    pub elapsed_hours: f64,
}

/// How a significance score was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignificanceBreakdown {
    /// No earlier snapshot exists
    Initial,
    /// Forced by an operator
    Manual,
    Scored {
        metrics: ChangeMetrics,
        factors: SignificanceFactors,
        /// Weighted sum before any periodic override
        weighted_score: f64,
        periodic_override: bool,
    },
}

/// Immutable snapshot of a topic's narrative and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub id: String,
    pub topic_id: String,
    pub history_type: HistoryType,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub key_insights: Vec<String>,
    pub article_count: usize,
    pub sources: BTreeSet<String>,
    pub confidence: f64,
    pub centroid: Vec<f32>,
    pub significance_score: f64,
    pub breakdown: SignificanceBreakdown,
    pub was_regenerated: bool,
    pub development_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryPoint {
    /// Snapshot the current state of `topic`
    pub fn capture(
        topic: &Topic,
        history_type: HistoryType,
        significance_score: f64,
        breakdown: SignificanceBreakdown,
        was_regenerated: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic_id: topic.id.clone(),
            history_type,
            title: topic.title.clone(),
            summary: topic.summary.clone(),
            key_insights: topic.key_insights.clone(),
            article_count: topic.article_count(),
            sources: topic.sources.clone(),
            confidence: topic.confidence,
            centroid: topic.centroid.clone(),
            significance_score,
            breakdown,
            was_regenerated,
            development_note: topic.development_note.clone(),
            created_at: now,
        }
    }
}
