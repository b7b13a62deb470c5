//! Configuration management for storyline
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Every threshold the engines use lives here exactly once.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Narrative (title/summary) provider configuration
    #[serde(default)]
    pub narrative: NarrativeConfig,

    /// Discussion collaborator configuration
    #[serde(default)]
    pub discussion: DiscussionConfig,

    /// Topic assignment thresholds
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Article ranking weights used when trimming topics
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Topic and article retention policy
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// History significance scoring
    #[serde(default)]
    pub history: HistoryConfig,

    /// Periodic run schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding backend base URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum embedding requests per second
    #[serde(default = "default_embedding_rps")]
    pub requests_per_second: u32,
}

/// Narrative provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Generate titles and regenerate narratives
    #[serde(default = "default_narrative_enabled")]
    pub enabled: bool,

    /// Narrative backend base URL
    #[serde(default = "default_narrative_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_narrative_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_narrative_timeout")]
    pub timeout_secs: u64,

    /// Fixed delay between consecutive narrative calls (milliseconds, 0 disables)
    #[serde(default = "default_narrative_call_delay")]
    pub call_delay_ms: u64,

    /// Titles longer than this are logged
    #[serde(default = "default_max_title_words")]
    pub max_title_words: usize,

    /// Number of member articles sent as context
    #[serde(default = "default_context_articles")]
    pub context_articles: usize,
}

/// Discussion collaborator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscussionConfig {
    /// Webhook receiving topic events; events are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Clustering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum centroid similarity for joining an active topic
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Minimum centroid similarity for auto-merging two topics
    #[serde(default = "default_near_duplicate_threshold")]
    pub near_duplicate_threshold: f64,

    /// Extra similarity required to resurrect a stale topic
    #[serde(default = "default_resurrection_bonus")]
    pub resurrection_bonus: f64,

    /// Stale topics older than this are never resurrected
    #[serde(default = "default_max_resurrection_age_days")]
    pub max_resurrection_age_days: i64,

    /// Confidence of a freshly created topic
    #[serde(default = "default_initial_confidence")]
    pub initial_confidence: f64,

    /// Confidence added when a new source contributes (and on merge)
    #[serde(default = "default_confidence_increment")]
    pub confidence_increment: f64,

    /// Minimum member count before a topic is titled
    #[serde(default = "default_min_articles_for_title")]
    pub min_articles_for_title: usize,

    /// Minimum confidence before a topic is titled
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Candidates this far below the threshold are logged as near misses
    #[serde(default = "default_near_miss_margin")]
    pub near_miss_margin: f64,

    /// Articles processed concurrently per batch
    #[serde(default = "default_clustering_concurrency")]
    pub concurrency: usize,
}

impl ClusteringConfig {
    /// Similarity a stale topic needs to be resurrected
    pub fn resurrection_threshold(&self) -> f64 {
        self.similarity_threshold + self.resurrection_bonus
    }
}

/// Ranking weights (must sum to 1.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_recency_weight")]
    pub recency: f64,

    #[serde(default = "default_source_priority_weight")]
    pub source_priority: f64,

    #[serde(default = "default_centroid_similarity_weight")]
    pub centroid_similarity: f64,

    #[serde(default = "default_content_quality_weight")]
    pub content_quality: f64,

    /// Age at which the recency score reaches zero
    #[serde(default = "default_recency_horizon_hours")]
    pub recency_horizon_hours: f64,

    /// Word count earning a full content-quality score
    #[serde(default = "default_quality_word_target")]
    pub quality_word_target: u32,
}

impl RankingConfig {
    fn weight_sum(&self) -> f64 {
        self.recency + self.source_priority + self.centroid_similarity + self.content_quality
    }
}

/// Article cap for one topic age tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    /// Upper age bound of the tier in days (`None` = unbounded)
    pub max_age_days: Option<i64>,

    /// Maximum number of member articles
    pub max_articles: usize,
}

/// Lifecycle and retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_new_tier")]
    pub new_tier: TierLimit,

    #[serde(default = "default_active_tier")]
    pub active_tier: TierLimit,

    #[serde(default = "default_mature_tier")]
    pub mature_tier: TierLimit,

    /// Retention for categories without an override
    #[serde(default = "default_retention_days")]
    pub default_retention_days: i64,

    /// Per-category retention overrides
    #[serde(default = "default_category_retention")]
    pub category_retention_days: BTreeMap<String, i64>,

    /// Archived articles older than this are deleted
    #[serde(default = "default_archived_purge_days")]
    pub archived_purge_days: i64,

    /// Unclustered articles older than this are archived as orphans
    #[serde(default = "default_orphan_grace_days")]
    pub orphan_grace_days: i64,

    /// Idle days before an active topic goes stale
    #[serde(default = "default_topic_stale_days")]
    pub topic_stale_days: i64,

    /// Days a topic stays stale before it is archived
    #[serde(default = "default_topic_archive_days")]
    pub topic_archive_days: i64,

    /// Days a topic stays archived before it is deleted
    #[serde(default = "default_topic_delete_days")]
    pub topic_delete_days: i64,

    /// Stale/archived topics below this size are dissolved early
    #[serde(default = "default_min_topic_articles")]
    pub min_topic_articles: usize,
}

impl LifecycleConfig {
    /// Retention window for a category
    pub fn retention_days(&self, category: &str) -> i64 {
        self.category_retention_days
            .get(category)
            .copied()
            .unwrap_or(self.default_retention_days)
    }
}

/// History significance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_growth_weight")]
    pub growth_weight: f64,

    #[serde(default = "default_source_diversity_weight")]
    pub source_diversity_weight: f64,

    #[serde(default = "default_confidence_change_weight")]
    pub confidence_change_weight: f64,

    #[serde(default = "default_embedding_drift_weight")]
    pub embedding_drift_weight: f64,

    #[serde(default = "default_time_factor_weight")]
    pub time_factor_weight: f64,

    #[serde(default = "default_min_new_articles")]
    pub min_new_articles: usize,

    #[serde(default = "default_min_new_sources")]
    pub min_new_sources: usize,

    #[serde(default = "default_min_confidence_delta")]
    pub min_confidence_delta: f64,

    #[serde(default = "default_min_embedding_drift")]
    pub min_embedding_drift: f64,

    #[serde(default = "default_min_elapsed_hours")]
    pub min_elapsed_hours: f64,

    #[serde(default = "default_growth_saturation")]
    pub growth_saturation: f64,

    #[serde(default = "default_source_saturation")]
    pub source_saturation: f64,

    #[serde(default = "default_confidence_saturation")]
    pub confidence_saturation: f64,

    #[serde(default = "default_drift_saturation")]
    pub drift_saturation: f64,

    #[serde(default = "default_time_saturation_hours")]
    pub time_saturation_hours: f64,

    /// Composite score needed to record a history point
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,

    #[serde(default = "default_periodic_snapshot_days")]
    pub periodic_snapshot_days: f64,

    #[serde(default = "default_periodic_min_articles")]
    pub periodic_min_articles: usize,

    #[serde(default = "default_periodic_margin")]
    pub periodic_margin: f64,

    /// Score the dominant factor needs to name the history type
    #[serde(default = "default_dominance_floor")]
    pub dominance_floor: f64,

    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: usize,

    #[serde(default = "default_history_batch_size")]
    pub batch_size: usize,
}

impl HistoryConfig {
    fn weight_sum(&self) -> f64 {
        self.growth_weight
            + self.source_diversity_weight
            + self.confidence_change_weight
            + self.embedding_drift_weight
            + self.time_factor_weight
    }
}

/// Periodic run schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between pipeline runs in watch mode
    #[serde(default = "default_schedule_interval")]
    pub interval_minutes: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for storyline data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            requests_per_second: default_embedding_rps(),
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: default_narrative_enabled(),
            url: default_narrative_url(),
            model: default_narrative_model(),
            timeout_secs: default_narrative_timeout(),
            call_delay_ms: default_narrative_call_delay(),
            max_title_words: default_max_title_words(),
            context_articles: default_context_articles(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            near_duplicate_threshold: default_near_duplicate_threshold(),
            resurrection_bonus: default_resurrection_bonus(),
            max_resurrection_age_days: default_max_resurrection_age_days(),
            initial_confidence: default_initial_confidence(),
            confidence_increment: default_confidence_increment(),
            min_articles_for_title: default_min_articles_for_title(),
            confidence_threshold: default_confidence_threshold(),
            near_miss_margin: default_near_miss_margin(),
            concurrency: default_clustering_concurrency(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            recency: default_recency_weight(),
            source_priority: default_source_priority_weight(),
            centroid_similarity: default_centroid_similarity_weight(),
            content_quality: default_content_quality_weight(),
            recency_horizon_hours: default_recency_horizon_hours(),
            quality_word_target: default_quality_word_target(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            new_tier: default_new_tier(),
            active_tier: default_active_tier(),
            mature_tier: default_mature_tier(),
            default_retention_days: default_retention_days(),
            category_retention_days: default_category_retention(),
            archived_purge_days: default_archived_purge_days(),
            orphan_grace_days: default_orphan_grace_days(),
            topic_stale_days: default_topic_stale_days(),
            topic_archive_days: default_topic_archive_days(),
            topic_delete_days: default_topic_delete_days(),
            min_topic_articles: default_min_topic_articles(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            growth_weight: default_growth_weight(),
            source_diversity_weight: default_source_diversity_weight(),
            confidence_change_weight: default_confidence_change_weight(),
            embedding_drift_weight: default_embedding_drift_weight(),
            time_factor_weight: default_time_factor_weight(),
            min_new_articles: default_min_new_articles(),
            min_new_sources: default_min_new_sources(),
            min_confidence_delta: default_min_confidence_delta(),
            min_embedding_drift: default_min_embedding_drift(),
            min_elapsed_hours: default_min_elapsed_hours(),
            growth_saturation: default_growth_saturation(),
            source_saturation: default_source_saturation(),
            confidence_saturation: default_confidence_saturation(),
            drift_saturation: default_drift_saturation(),
            time_saturation_hours: default_time_saturation_hours(),
            significance_threshold: default_significance_threshold(),
            periodic_snapshot_days: default_periodic_snapshot_days(),
            periodic_min_articles: default_periodic_min_articles(),
            periodic_margin: default_periodic_margin(),
            dominance_floor: default_dominance_floor(),
            timeline_limit: default_timeline_limit(),
            batch_size: default_history_batch_size(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_schedule_interval(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!("{} must be between 0.0 and 1.0", name)));
    }
    Ok(())
}

impl Config {
    /// Get the default base directory for storyline (~/.storyline)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".storyline")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("storyline.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("storyline.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let c = &self.clustering;
        check_unit("clustering.similarity_threshold", c.similarity_threshold)?;
        check_unit("clustering.near_duplicate_threshold", c.near_duplicate_threshold)?;
        check_unit("clustering.initial_confidence", c.initial_confidence)?;
        check_unit("clustering.confidence_threshold", c.confidence_threshold)?;
        check_unit("history.significance_threshold", self.history.significance_threshold)?;

        if c.near_duplicate_threshold <= c.similarity_threshold {
            return Err(Error::Config(
                "clustering.near_duplicate_threshold must be greater than clustering.similarity_threshold"
                    .to_string(),
            ));
        }

        if c.concurrency == 0 {
            return Err(Error::Config(
                "clustering.concurrency must be at least 1".to_string(),
            ));
        }

        if (self.ranking.weight_sum() - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "ranking weights must sum to 1.0 (got {:.3})",
                self.ranking.weight_sum()
            )));
        }

        if (self.history.weight_sum() - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "history weights must sum to 1.0 (got {:.3})",
                self.history.weight_sum()
            )));
        }

        let l = &self.lifecycle;
        match (l.new_tier.max_age_days, l.active_tier.max_age_days) {
            (Some(new), Some(active)) if new < active => {}
            _ => {
                return Err(Error::Config(
                    "lifecycle tiers must have increasing max_age_days (new < active)".to_string(),
                ))
            }
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".to_string()));
        }

        Ok(())
    }
}
