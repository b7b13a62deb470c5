//! Document store for articles, topics and topic history (SQLite)
//!
//! Each entity is one row keyed by its id; list and vector fields are JSON
//! text. The engines only rely on point lookups, filtered scans by
//! `(category, status)`, bulk updates by id set and conditional updates.
//! Topics carry a `version` column so read-modify-write cycles can detect a
//! lost update, and status transitions are single compare-and-set UPDATEs.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Article, ArticleStatus, HistoryPoint, SignificanceBreakdown, Topic, TopicStatus,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Fixed-width UTC timestamp; lexicographic order equals time order
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("Bad timestamp {:?}: {}", value, e)))
}

fn parse_opt_ts(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_ts).transpose()
}

fn parse_json<T: DeserializeOwned>(field: &str, value: &str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| Error::Corrupt(format!("Bad {} JSON: {}", field, e)))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Article row as stored
#[derive(Debug, Clone, FromRow)]
struct ArticleRow {
    id: String,
    category: String,
    source: String,
    source_priority: String,
    title: String,
    description: Option<String>,
    url: Option<String>,
    embedding_json: Option<String>,
    published_at: String,
    ingested_at: String,
    word_count: i64,
    status: String,
    topic_id: Option<String>,
    former_topic_id: Option<String>,
    archived_at: Option<String>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        Ok(Article {
            source_priority: row.source_priority.parse()?,
            embedding: row
                .embedding_json
                .as_deref()
                .map(|j| parse_json("embedding", j))
                .transpose()?,
            published_at: parse_ts(&row.published_at)?,
            ingested_at: parse_ts(&row.ingested_at)?,
            word_count: u32::try_from(row.word_count).unwrap_or(0),
            status: row.status.parse()?,
            archived_at: parse_opt_ts(row.archived_at.as_deref())?,
            id: row.id,
            category: row.category,
            source: row.source,
            title: row.title,
            description: row.description,
            url: row.url,
            topic_id: row.topic_id,
            former_topic_id: row.former_topic_id,
        })
    }
}

/// Topic row as stored
#[derive(Debug, Clone, FromRow)]
struct TopicRow {
    id: String,
    category: String,
    status: String,
    article_ids_json: String,
    sources_json: String,
    centroid_json: String,
    confidence: f64,
    title: Option<String>,
    summary: Option<String>,
    key_insights_json: String,
    has_title: bool,
    narrative_confidence: Option<f64>,
    development_note: Option<String>,
    created_at: String,
    last_updated: String,
    stale_since: Option<String>,
    archived_at: Option<String>,
    resurrected_at: Option<String>,
    merged_at: Option<String>,
    merged_from_json: String,
    title_generated_at: Option<String>,
    last_regenerated: Option<String>,
    last_trimmed: Option<String>,
    discussion_id: Option<String>,
    history_point_count: i64,
    last_history_point: Option<String>,
    version: i64,
}

impl TryFrom<TopicRow> for Topic {
    type Error = Error;

    fn try_from(row: TopicRow) -> Result<Self> {
        Ok(Topic {
            status: row.status.parse()?,
            article_ids: parse_json("article_ids", &row.article_ids_json)?,
            sources: parse_json("sources", &row.sources_json)?,
            centroid: parse_json("centroid", &row.centroid_json)?,
            key_insights: parse_json("key_insights", &row.key_insights_json)?,
            merged_from: parse_json("merged_from", &row.merged_from_json)?,
            created_at: parse_ts(&row.created_at)?,
            last_updated: parse_ts(&row.last_updated)?,
            stale_since: parse_opt_ts(row.stale_since.as_deref())?,
            archived_at: parse_opt_ts(row.archived_at.as_deref())?,
            resurrected_at: parse_opt_ts(row.resurrected_at.as_deref())?,
            merged_at: parse_opt_ts(row.merged_at.as_deref())?,
            title_generated_at: parse_opt_ts(row.title_generated_at.as_deref())?,
            last_regenerated: parse_opt_ts(row.last_regenerated.as_deref())?,
            last_trimmed: parse_opt_ts(row.last_trimmed.as_deref())?,
            last_history_point: parse_opt_ts(row.last_history_point.as_deref())?,
            history_point_count: u32::try_from(row.history_point_count).unwrap_or(0),
            id: row.id,
            category: row.category,
            confidence: row.confidence,
            title: row.title,
            summary: row.summary,
            has_title: row.has_title,
            narrative_confidence: row.narrative_confidence,
            development_note: row.development_note,
            discussion_id: row.discussion_id,
            version: row.version,
        })
    }
}

/// History row as stored
#[derive(Debug, Clone, FromRow)]
struct HistoryRow {
    id: String,
    topic_id: String,
    history_type: String,
    title: Option<String>,
    summary: Option<String>,
    key_insights_json: String,
    article_count: i64,
    sources_json: String,
    confidence: f64,
    centroid_json: String,
    significance_score: f64,
    breakdown_json: String,
    was_regenerated: bool,
    development_note: Option<String>,
    created_at: String,
}

impl TryFrom<HistoryRow> for HistoryPoint {
    type Error = Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        let breakdown: SignificanceBreakdown = parse_json("breakdown", &row.breakdown_json)?;
        Ok(HistoryPoint {
            history_type: row.history_type.parse()?,
            key_insights: parse_json("key_insights", &row.key_insights_json)?,
            sources: parse_json("sources", &row.sources_json)?,
            centroid: parse_json("centroid", &row.centroid_json)?,
            article_count: usize::try_from(row.article_count).unwrap_or(0),
            created_at: parse_ts(&row.created_at)?,
            breakdown,
            id: row.id,
            topic_id: row.topic_id,
            title: row.title,
            summary: row.summary,
            confidence: row.confidence,
            significance_score: row.significance_score,
            was_regenerated: row.was_regenerated,
            development_note: row.development_note,
        })
    }
}

/// Atomic topic status transitions (compare-and-set on `status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// active -> stale, only if still idle since before the cutoff
    MarkStale { idle_before: DateTime<Utc> },
    /// stale -> archived, only if stale since before the cutoff
    Archive { stale_before: DateTime<Utc> },
    /// stale -> active, only if it went stale after the cutoff
    Resurrect { stale_after: DateTime<Utc> },
}

/// Which articles a retention pass applies to
#[derive(Debug, Clone, Copy)]
pub enum RetentionScope<'a> {
    /// One category with its own retention window
    Category(&'a str),
    /// Every category not in the list
    Others(&'a [String]),
}

/// Row counts per status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub articles_by_status: BTreeMap<String, i64>,
    pub topics_by_status: BTreeMap<String, i64>,
    pub titled_topics: i64,
    pub history_points: i64,
}

/// News document store handle
#[derive(Clone)]
pub struct NewsStore {
    pool: SqlitePool,
}

impl NewsStore {
    /// Connect to the store configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = Self::open(&config.paths.db_file).await?;
        Ok(store)
    }

    /// Open a store at `db_path`, creating the schema if needed
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        if !store.is_initialized().await? {
            store.init_schema().await?;
        }
        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='topics'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Article Operations =====

    /// Insert an article; returns false if the id already exists
    pub async fn insert_article(&self, article: &Article) -> Result<bool> {
        let embedding_json = article
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles (id, category, source, source_priority, title, description, url,
                embedding_json, published_at, ingested_at, word_count, status, topic_id, former_topic_id, archived_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(&article.category)
        .bind(&article.source)
        .bind(article.source_priority.to_string())
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.url)
        .bind(embedding_json)
        .bind(format_ts(&article.published_at))
        .bind(format_ts(&article.ingested_at))
        .bind(article.word_count as i64)
        .bind(article.status.as_str())
        .bind(&article.topic_id)
        .bind(&article.former_topic_id)
        .bind(article.archived_at.as_ref().map(format_ts))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get article by ID
    pub async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Article::try_from).transpose()
    }

    /// Get several articles, in no particular order; missing ids are skipped
    pub async fn get_articles(&self, ids: &[String]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT * FROM articles WHERE id IN ({})", placeholders(ids.len()));
        let mut builder = sqlx::query_as::<_, ArticleRow>(&query);
        for id in ids {
            builder = builder.bind(id);
        }
        builder
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Article::try_from)
            .collect()
    }

    /// Articles in a status, oldest ingestion first
    pub async fn list_articles_by_status(
        &self,
        status: ArticleStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE status = ? ORDER BY ingested_at, id LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Article::try_from).collect()
    }

    /// Store an article's embedding; embeddings are written exactly once
    pub async fn set_article_embedding(&self, id: &str, embedding: &[f32]) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET embedding_json = ? WHERE id = ? AND embedding_json IS NULL",
        )
        .bind(serde_json::to_string(embedding)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an article as clustered into `topic_id`
    pub async fn attach_article(&self, id: &str, topic_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE articles SET status = ?, topic_id = ?, archived_at = NULL WHERE id = ?",
        )
        .bind(ArticleStatus::Clustered.as_str())
        .bind(topic_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ArticleNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Detach articles from their topic and move them to `status`.
    ///
    /// The current topic is kept as `former_topic_id`. For archived statuses
    /// `archived_at` is stamped unless the article was archived already, so
    /// its purge date does not move; otherwise it is cleared.
    pub async fn detach_articles(
        &self,
        ids: &[String],
        status: ArticleStatus,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query = format!(
            r#"
            UPDATE articles
            SET status = ?1, former_topic_id = COALESCE(topic_id, former_topic_id), topic_id = NULL,
                archived_at = CASE WHEN ?2 IS NULL THEN NULL ELSE COALESCE(archived_at, ?2) END
            WHERE id IN ({})
            "#,
            placeholders(ids.len())
        );
        let archived_at = status.is_archived().then(|| format_ts(&now));
        let mut builder = sqlx::query(&query).bind(status.as_str()).bind(archived_at);
        for id in ids {
            builder = builder.bind(id);
        }
        Ok(builder.execute(&self.pool).await?.rows_affected())
    }

    /// Embeddings of the given articles (articles without one are skipped)
    pub async fn member_embeddings(&self, ids: &[String]) -> Result<Vec<Vec<f32>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT embedding_json FROM articles WHERE id IN ({}) AND embedding_json IS NOT NULL",
            placeholders(ids.len())
        );
        let mut builder = sqlx::query_scalar::<_, String>(&query);
        for id in ids {
            builder = builder.bind(id);
        }
        builder
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|j| parse_json("embedding", j))
            .collect()
    }

    /// Archive live articles ingested before `cutoff`
    pub async fn expire_articles(
        &self,
        scope: RetentionScope<'_>,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let (filter, categories): (String, Vec<&str>) = match scope {
            RetentionScope::Category(category) => ("category = ?".to_string(), vec![category]),
            RetentionScope::Others(known) if known.is_empty() => ("1 = 1".to_string(), Vec::new()),
            RetentionScope::Others(known) => (
                format!("category NOT IN ({})", placeholders(known.len())),
                known.iter().map(String::as_str).collect(),
            ),
        };

        let query = format!(
            r#"
            UPDATE articles SET status = ?, archived_at = ?
            WHERE status IN (?, ?) AND ingested_at < ? AND {}
            "#,
            filter
        );
        let mut builder = sqlx::query(&query)
            .bind(ArticleStatus::ArchivedExpired.as_str())
            .bind(format_ts(&now))
            .bind(ArticleStatus::Clustered.as_str())
            .bind(ArticleStatus::PendingClustering.as_str())
            .bind(format_ts(&cutoff));
        for category in categories {
            builder = builder.bind(category);
        }
        Ok(builder.execute(&self.pool).await?.rows_affected())
    }

    /// Archived articles whose `archived_at` is before `cutoff`
    pub async fn list_purgeable_articles(&self, cutoff: DateTime<Utc>) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE status LIKE 'archived_%' AND archived_at IS NOT NULL AND archived_at < ?
            ORDER BY archived_at
            "#,
        )
        .bind(format_ts(&cutoff))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Article::try_from).collect()
    }

    /// Permanently delete articles
    pub async fn delete_articles(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query = format!("DELETE FROM articles WHERE id IN ({})", placeholders(ids.len()));
        let mut builder = sqlx::query(&query);
        for id in ids {
            builder = builder.bind(id);
        }
        Ok(builder.execute(&self.pool).await?.rows_affected())
    }

    /// Archive unclustered articles ingested before `cutoff`
    pub async fn archive_orphans(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET status = ?, archived_at = ?
            WHERE status = ? AND topic_id IS NULL AND ingested_at < ?
            "#,
        )
        .bind(ArticleStatus::ArchivedOrphan.as_str())
        .bind(format_ts(&now))
        .bind(ArticleStatus::PendingClustering.as_str())
        .bind(format_ts(&cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ===== Topic Operations =====

    /// Insert a new topic
    pub async fn insert_topic(&self, topic: &Topic) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topics (id, category, status, article_ids_json, article_count, sources_json, centroid_json,
                confidence, title, summary, key_insights_json, has_title, narrative_confidence, development_note,
                created_at, last_updated, stale_since, archived_at, resurrected_at, merged_at, merged_from_json,
                title_generated_at, last_regenerated, last_trimmed, discussion_id, history_point_count,
                last_history_point, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&topic.id)
        .bind(&topic.category)
        .bind(topic.status.as_str())
        .bind(serde_json::to_string(&topic.article_ids)?)
        .bind(topic.article_count() as i64)
        .bind(serde_json::to_string(&topic.sources)?)
        .bind(serde_json::to_string(&topic.centroid)?)
        .bind(topic.confidence)
        .bind(&topic.title)
        .bind(&topic.summary)
        .bind(serde_json::to_string(&topic.key_insights)?)
        .bind(topic.has_title)
        .bind(topic.narrative_confidence)
        .bind(&topic.development_note)
        .bind(format_ts(&topic.created_at))
        .bind(format_ts(&topic.last_updated))
        .bind(topic.stale_since.as_ref().map(format_ts))
        .bind(topic.archived_at.as_ref().map(format_ts))
        .bind(topic.resurrected_at.as_ref().map(format_ts))
        .bind(topic.merged_at.as_ref().map(format_ts))
        .bind(serde_json::to_string(&topic.merged_from)?)
        .bind(topic.title_generated_at.as_ref().map(format_ts))
        .bind(topic.last_regenerated.as_ref().map(format_ts))
        .bind(topic.last_trimmed.as_ref().map(format_ts))
        .bind(&topic.discussion_id)
        .bind(topic.history_point_count as i64)
        .bind(topic.last_history_point.as_ref().map(format_ts))
        .bind(topic.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get topic by ID
    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        let row = sqlx::query_as::<_, TopicRow>("SELECT * FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Topic::try_from).transpose()
    }

    /// Filtered scan by category and/or status, oldest first
    pub async fn list_topics(
        &self,
        category: Option<&str>,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, TopicRow>(
            r#"
            SELECT * FROM topics
            WHERE (?1 IS NULL OR category = ?1) AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at, id
            "#,
        )
        .bind(category)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Topic::try_from).collect()
    }

    /// Optimistic write of a whole topic document.
    ///
    /// Succeeds only if the stored version still equals `topic.version`,
    /// which is then bumped. A lost race yields `Error::Conflict`; a deleted
    /// topic yields `Error::TopicNotFound`.
    pub async fn save_topic(&self, topic: &mut Topic) -> Result<()> {
        if update_topic_row(&self.pool, topic).await? == 0 {
            return Err(self.lost_update(topic).await);
        }
        topic.version += 1;
        Ok(())
    }

    /// Save a topic and append its new history point atomically.
    ///
    /// Either both writes land or neither does, so `history_point_count`
    /// always matches the stored points.
    pub async fn save_topic_with_history(&self, topic: &mut Topic, point: &HistoryPoint) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if update_topic_row(&mut *tx, topic).await? == 0 {
            drop(tx);
            return Err(self.lost_update(topic).await);
        }
        insert_history_row(&mut *tx, point).await?;
        tx.commit().await?;

        topic.version += 1;
        Ok(())
    }

    /// Commit a merge: save the survivor, move the removed topic's articles
    /// to it and delete the removed topic, in one transaction.
    ///
    /// The delete is unconditional on status; callers hold both topic locks,
    /// and only the status CAS of the sweep can touch the removed topic.
    pub async fn commit_merge(&self, keep: &mut Topic, remove_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        if update_topic_row(&mut *tx, keep).await? == 0 {
            drop(tx);
            return Err(self.lost_update(keep).await);
        }
        let repointed = sqlx::query("UPDATE articles SET topic_id = ? WHERE topic_id = ?")
            .bind(&keep.id)
            .bind(remove_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(remove_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(Error::TopicNotFound(remove_id.to_string()));
        }
        tx.commit().await?;

        keep.version += 1;
        Ok(repointed)
    }

    /// Error describing why a versioned write matched no row
    async fn lost_update(&self, topic: &Topic) -> Error {
        match self.get_topic(&topic.id).await {
            Ok(Some(current)) => Error::Conflict(format!(
                "topic {} is at version {}, expected {}",
                topic.id, current.version, topic.version
            )),
            Ok(None) => Error::TopicNotFound(topic.id.clone()),
            Err(e) => e,
        }
    }

    /// Apply a status transition if the topic is still in the expected state.
    ///
    /// Returns false when the condition no longer holds (someone else moved
    /// the topic first, or it was deleted).
    pub async fn transition_status(
        &self,
        id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = format_ts(&now);
        let query = match transition {
            Transition::MarkStale { idle_before } => sqlx::query(
                r#"
                UPDATE topics SET status = 'stale', stale_since = ?, version = version + 1
                WHERE id = ? AND status = 'active' AND last_updated < ?
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(format_ts(&idle_before)),
            Transition::Archive { stale_before } => sqlx::query(
                r#"
                UPDATE topics SET status = 'archived', archived_at = ?, version = version + 1
                WHERE id = ? AND status = 'stale' AND stale_since < ?
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(format_ts(&stale_before)),
            Transition::Resurrect { stale_after } => sqlx::query(
                r#"
                UPDATE topics SET status = 'active', stale_since = NULL, resurrected_at = ?1,
                    last_updated = ?1, version = version + 1
                WHERE id = ?2 AND status = 'stale' AND (stale_since IS NULL OR stale_since >= ?3)
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(format_ts(&stale_after)),
        };

        Ok(query.execute(&self.pool).await?.rows_affected() > 0)
    }

    /// Delete a topic if it is still in `status`
    pub async fn delete_topic(&self, id: &str, status: TopicStatus) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ? AND status = ?")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== History Operations =====

    /// Append a history point
    pub async fn insert_history_point(&self, point: &HistoryPoint) -> Result<()> {
        insert_history_row(&self.pool, point).await
    }

    /// Most recent history point of a topic
    pub async fn latest_history_point(&self, topic_id: &str) -> Result<Option<HistoryPoint>> {
        let row = sqlx::query_as::<_, HistoryRow>(
            "SELECT * FROM topic_history WHERE topic_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(HistoryPoint::try_from).transpose()
    }

    /// History points of a topic, newest first
    pub async fn list_history_points(&self, topic_id: &str, limit: usize) -> Result<Vec<HistoryPoint>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT * FROM topic_history WHERE topic_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(topic_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HistoryPoint::try_from).collect()
    }

    /// Number of history points recorded for a topic
    pub async fn count_history_points(&self, topic_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topic_history WHERE topic_id = ?")
            .bind(topic_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Run a raw statement against the store
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    // ===== Stats =====

    /// Row counts across the store
    pub async fn global_stats(&self) -> Result<StoreStats> {
        let articles: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM articles GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let topics: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM topics GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let titled_topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE has_title = 1")
            .fetch_one(&self.pool)
            .await?;
        let history_points: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topic_history")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            articles_by_status: articles.into_iter().collect(),
            topics_by_status: topics.into_iter().collect(),
            titled_topics,
            history_points,
        })
    }
}

/// Versioned UPDATE of a whole topic row; returns the rows affected
async fn update_topic_row<'e, E>(executor: E, topic: &Topic) -> Result<u64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE topics SET
            category = ?, status = ?, article_ids_json = ?, article_count = ?, sources_json = ?,
            centroid_json = ?, confidence = ?, title = ?, summary = ?, key_insights_json = ?,
            has_title = ?, narrative_confidence = ?, development_note = ?, last_updated = ?,
            stale_since = ?, archived_at = ?, resurrected_at = ?, merged_at = ?, merged_from_json = ?,
            title_generated_at = ?, last_regenerated = ?, last_trimmed = ?, discussion_id = ?,
            history_point_count = ?, last_history_point = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&topic.category)
    .bind(topic.status.as_str())
    .bind(serde_json::to_string(&topic.article_ids)?)
    .bind(topic.article_count() as i64)
    .bind(serde_json::to_string(&topic.sources)?)
    .bind(serde_json::to_string(&topic.centroid)?)
    .bind(topic.confidence)
    .bind(&topic.title)
    .bind(&topic.summary)
    .bind(serde_json::to_string(&topic.key_insights)?)
    .bind(topic.has_title)
    .bind(topic.narrative_confidence)
    .bind(&topic.development_note)
    .bind(format_ts(&topic.last_updated))
    .bind(topic.stale_since.as_ref().map(format_ts))
    .bind(topic.archived_at.as_ref().map(format_ts))
    .bind(topic.resurrected_at.as_ref().map(format_ts))
    .bind(topic.merged_at.as_ref().map(format_ts))
    .bind(serde_json::to_string(&topic.merged_from)?)
    .bind(topic.title_generated_at.as_ref().map(format_ts))
    .bind(topic.last_regenerated.as_ref().map(format_ts))
    .bind(topic.last_trimmed.as_ref().map(format_ts))
    .bind(&topic.discussion_id)
    .bind(topic.history_point_count as i64)
    .bind(topic.last_history_point.as_ref().map(format_ts))
    .bind(&topic.id)
    .bind(topic.version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// INSERT of one history point row
async fn insert_history_row<'e, E>(executor: E, point: &HistoryPoint) -> Result<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO topic_history (id, topic_id, history_type, title, summary, key_insights_json,
            article_count, sources_json, confidence, centroid_json, significance_score, breakdown_json,
            was_regenerated, development_note, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&point.id)
    .bind(&point.topic_id)
    .bind(point.history_type.as_str())
    .bind(&point.title)
    .bind(&point.summary)
    .bind(serde_json::to_string(&point.key_insights)?)
    .bind(point.article_count as i64)
    .bind(serde_json::to_string(&point.sources)?)
    .bind(point.confidence)
    .bind(serde_json::to_string(&point.centroid)?)
    .bind(point.significance_score)
    .bind(serde_json::to_string(&point.breakdown)?)
    .bind(point.was_regenerated)
    .bind(&point.development_note)
    .bind(format_ts(&point.created_at))
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryType;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn setup_test_store() -> (NewsStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let store = NewsStore::connect(&config).await.unwrap();
        (store, tmp)
    }

    fn article(category: &str, source: &str) -> Article {
        let mut a = Article::new(category, source, "Headline");
        a.embedding = Some(vec![1.0, 0.0, 0.0]);
        a
    }

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let early = Utc::now();
        let late = early + Duration::milliseconds(1500);
        assert!(format_ts(&early) < format_ts(&late));
        assert_eq!(format_ts(&early).len(), format_ts(&late).len());
    }

    #[tokio::test]
    async fn test_article_crud() {
        let (store, _tmp) = setup_test_store().await;

        let mut a = Article::new("tech", "Wire", "Headline");
        a.url = Some("https://example.com/a".to_string());
        assert!(store.insert_article(&a).await.unwrap());
        assert!(!store.insert_article(&a).await.unwrap());

        let loaded = store.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.url, a.url);
        assert_eq!(loaded.status, ArticleStatus::PendingClustering);
        assert_eq!(format_ts(&loaded.ingested_at), format_ts(&a.ingested_at));

        assert!(store.set_article_embedding(&a.id, &[0.5, 0.5]).await.unwrap());
        // embedding is write-once
        assert!(!store.set_article_embedding(&a.id, &[1.0, 0.0]).await.unwrap());
        let loaded = store.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.embedding, Some(vec![0.5, 0.5]));

        let pending = store
            .list_articles_by_status(ArticleStatus::PendingClustering, None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_topic_optimistic_write() {
        let (store, _tmp) = setup_test_store().await;

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0, 0.0, 0.0], 0.5, Utc::now());
        store.insert_topic(&topic).await.unwrap();

        let mut stale_copy = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(stale_copy.article_ids, topic.article_ids);
        assert_eq!(stale_copy.version, 0);

        topic.article_ids.push("a2".to_string());
        store.save_topic(&mut topic).await.unwrap();
        assert_eq!(topic.version, 1);

        stale_copy.confidence = 0.9;
        let err = store.save_topic(&mut stale_copy).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let loaded = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(loaded.article_count(), 2);
        assert_eq!(loaded.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_save_deleted_topic_is_not_found() {
        let (store, _tmp) = setup_test_store().await;

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0], 0.5, Utc::now());
        store.insert_topic(&topic).await.unwrap();
        assert!(store.delete_topic(&topic.id, TopicStatus::Active).await.unwrap());

        let err = store.save_topic(&mut topic).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0], 0.5, now - Duration::days(10));
        topic.last_updated = now - Duration::days(8);
        store.insert_topic(&topic).await.unwrap();

        let idle_before = now - Duration::days(7);
        assert!(store
            .transition_status(&topic.id, Transition::MarkStale { idle_before }, now)
            .await
            .unwrap());
        // second attempt loses: the topic is no longer active
        assert!(!store
            .transition_status(&topic.id, Transition::MarkStale { idle_before }, now)
            .await
            .unwrap());

        let stale_after = now - Duration::days(14);
        assert!(store
            .transition_status(&topic.id, Transition::Resurrect { stale_after }, now)
            .await
            .unwrap());

        let loaded = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TopicStatus::Active);
        assert!(loaded.stale_since.is_none());
        assert!(loaded.resurrected_at.is_some());
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_resurrect_respects_age_bound() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0], 0.5, now - Duration::days(40));
        topic.status = TopicStatus::Stale;
        topic.stale_since = Some(now - Duration::days(20));
        store.insert_topic(&topic).await.unwrap();

        let stale_after = now - Duration::days(14);
        assert!(!store
            .transition_status(&topic.id, Transition::Resurrect { stale_after }, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_resurrect_without_stale_since() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0], 0.5, now - Duration::days(3));
        topic.status = TopicStatus::Stale;
        topic.stale_since = None;
        store.insert_topic(&topic).await.unwrap();

        let stale_after = now - Duration::days(14);
        assert!(store
            .transition_status(&topic.id, Transition::Resurrect { stale_after }, now)
            .await
            .unwrap());
        let loaded = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TopicStatus::Active);
    }

    #[tokio::test]
    async fn test_history_write_is_atomic_with_topic_save() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let seed = article("tech", "Wire");
        let mut topic = Topic::new(&seed, vec![1.0], 0.5, now - Duration::days(10));
        topic.last_updated = now - Duration::days(8);
        store.insert_topic(&topic).await.unwrap();

        // the sweep moves the topic between our read and our write
        let mut copy = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert!(store
            .transition_status(&topic.id, Transition::MarkStale { idle_before: now - Duration::days(7) }, now)
            .await
            .unwrap());

        copy.history_point_count += 1;
        let point = HistoryPoint::capture(&copy, HistoryType::Initial, 1.0, SignificanceBreakdown::Initial, true, now);
        let err = store.save_topic_with_history(&mut copy, &point).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.count_history_points(&topic.id).await.unwrap(), 0);

        let mut fresh = store.get_topic(&topic.id).await.unwrap().unwrap();
        assert_eq!(fresh.history_point_count, 0);
        fresh.history_point_count += 1;
        store.save_topic_with_history(&mut fresh, &point).await.unwrap();
        assert_eq!(fresh.version, 2);
        assert_eq!(store.count_history_points(&topic.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_merge_ignores_status_of_removed_topic() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let a = article("tech", "Wire");
        let b = article("tech", "Post");
        store.insert_article(&a).await.unwrap();
        store.insert_article(&b).await.unwrap();

        let mut keep = Topic::new(&a, vec![1.0], 0.5, now);
        let mut remove = Topic::new(&b, vec![1.0], 0.5, now - Duration::days(10));
        remove.last_updated = now - Duration::days(8);
        store.insert_topic(&keep).await.unwrap();
        store.insert_topic(&remove).await.unwrap();
        store.attach_article(&a.id, &keep.id).await.unwrap();
        store.attach_article(&b.id, &remove.id).await.unwrap();

        // a concurrent sweep stales the removed topic mid-merge
        assert!(store
            .transition_status(&remove.id, Transition::MarkStale { idle_before: now - Duration::days(7) }, now)
            .await
            .unwrap());

        keep.article_ids.push(b.id.clone());
        assert_eq!(store.commit_merge(&mut keep, &remove.id).await.unwrap(), 1);
        assert_eq!(keep.version, 1);
        assert!(store.get_topic(&remove.id).await.unwrap().is_none());
        let moved = store.get_article(&b.id).await.unwrap().unwrap();
        assert_eq!(moved.topic_id.as_deref(), Some(keep.id.as_str()));

        // a lost survivor write leaves everything untouched
        let other = Topic::new(&b, vec![1.0], 0.5, now);
        store.insert_topic(&other).await.unwrap();
        let mut stale_keep = store.get_topic(&keep.id).await.unwrap().unwrap();
        stale_keep.version -= 1;
        let err = store.commit_merge(&mut stale_keep, &other.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.get_topic(&other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_detach_articles() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let a = article("tech", "Wire");
        let b = article("tech", "Post");
        store.insert_article(&a).await.unwrap();
        store.insert_article(&b).await.unwrap();
        store.attach_article(&a.id, "t2").await.unwrap();
        store.attach_article(&b.id, "t2").await.unwrap();

        let ids = vec![a.id.clone()];
        store
            .detach_articles(&ids, ArticleStatus::ArchivedFromTopic, now)
            .await
            .unwrap();
        let loaded = store.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ArticleStatus::ArchivedFromTopic);
        assert_eq!(loaded.topic_id, None);
        assert_eq!(loaded.former_topic_id.as_deref(), Some("t2"));
        let archived_at = loaded.archived_at.unwrap();

        // archiving again keeps the original purge clock
        store
            .detach_articles(&ids, ArticleStatus::ArchivedTopicDeleted, now + Duration::days(5))
            .await
            .unwrap();
        let loaded = store.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ArticleStatus::ArchivedTopicDeleted);
        assert_eq!(format_ts(&loaded.archived_at.unwrap()), format_ts(&archived_at));

        // requeueing clears it
        store
            .detach_articles(&ids, ArticleStatus::PendingClustering, now)
            .await
            .unwrap();
        let loaded = store.get_article(&a.id).await.unwrap().unwrap();
        assert!(loaded.archived_at.is_none());

        let embeddings = store
            .member_embeddings(&[a.id.clone(), b.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_retention_queries() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let mut old_tech = article("tech", "Wire");
        old_tech.ingested_at = now - Duration::days(40);
        let mut old_sports = article("sports", "Wire");
        old_sports.ingested_at = now - Duration::days(40);
        let fresh = article("sports", "Wire");
        for a in [&old_tech, &old_sports, &fresh] {
            store.insert_article(a).await.unwrap();
        }

        let cutoff = now - Duration::days(30);
        let known = vec!["tech".to_string()];
        assert_eq!(
            store
                .expire_articles(RetentionScope::Category("tech"), cutoff, now)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .expire_articles(RetentionScope::Others(&known), cutoff, now)
                .await
                .unwrap(),
            1
        );

        let purgeable = store
            .list_purgeable_articles(now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purgeable.len(), 2);
        assert!(store.list_purgeable_articles(now - Duration::days(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_append_and_timeline() {
        let (store, _tmp) = setup_test_store().await;
        let now = Utc::now();

        let seed = article("tech", "Wire");
        let topic = Topic::new(&seed, vec![1.0], 0.5, now);
        for (i, kind) in [HistoryType::Initial, HistoryType::Periodic].into_iter().enumerate() {
            let point = HistoryPoint::capture(
                &topic,
                kind,
                1.0,
                SignificanceBreakdown::Initial,
                false,
                now + Duration::hours(i as i64),
            );
            store.insert_history_point(&point).await.unwrap();
        }

        let latest = store.latest_history_point(&topic.id).await.unwrap().unwrap();
        assert_eq!(latest.history_type, HistoryType::Periodic);

        let timeline = store.list_history_points(&topic.id, 10).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[1].history_type, HistoryType::Initial);
        assert_eq!(store.count_history_points(&topic.id).await.unwrap(), 2);
    }
}
