//! Import command implementation
//!
//! Articles are ingested by an external collector and handed over as JSON
//! lines. Each line becomes a `pending_clustering` article.

use crate::error::{Error, Result};
use crate::models::{Article, ArticleStatus, SourcePriority};
use crate::store::NewsStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// One line of an import file
#[derive(Debug, Clone, Deserialize)]
struct ImportRecord {
    #[serde(default)]
    id: Option<String>,
    category: String,
    source: String,
    #[serde(default)]
    source_priority: SourcePriority,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    word_count: Option<u32>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl ImportRecord {
    fn into_article(self, dimension: usize, now: DateTime<Utc>) -> Result<Article> {
        let category = self.category.trim().to_lowercase();
        if category.is_empty() || self.source.trim().is_empty() || self.title.trim().is_empty() {
            return Err(Error::Other("category, source and title are required".to_string()));
        }

        let embedding = match self.embedding {
            Some(v) if v.is_empty() => None,
            Some(v) if v.len() != dimension => {
                return Err(Error::Other(format!(
                    "embedding has {} dimensions, expected {}",
                    v.len(),
                    dimension
                )))
            }
            other => other,
        };

        let word_count = self.word_count.unwrap_or_else(|| {
            self.description
                .as_deref()
                .map_or(0, |d| d.split_whitespace().count() as u32)
        });

        Ok(Article {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            category,
            source: self.source.trim().to_string(),
            source_priority: self.source_priority,
            title: self.title.trim().to_string(),
            description: self.description,
            url: self.url,
            embedding,
            published_at: self.published_at.unwrap_or(now),
            ingested_at: now,
            word_count,
            status: ArticleStatus::PendingClustering,
            topic_id: None,
            former_topic_id: None,
            archived_at: None,
        })
    }
}

/// Import counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub lines: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Queue articles from a JSON-lines file
pub async fn cmd_import(store: &NewsStore, path: &Path, dimension: usize) -> Result<ImportStats> {
    info!("Importing articles from {:?}", path);
    let content = tokio::fs::read_to_string(path).await?;
    let now = Utc::now();
    let mut stats = ImportStats::default();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;

        let article = match serde_json::from_str::<ImportRecord>(line)
            .map_err(Error::from)
            .and_then(|record| record.into_article(dimension, now))
        {
            Ok(article) => article,
            Err(e) => {
                warn!(line = index + 1, "Skipping invalid article: {}", e);
                stats.invalid += 1;
                continue;
            }
        };

        if store.insert_article(&article).await? {
            stats.imported += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    info!(
        imported = stats.imported,
        duplicates = stats.duplicates,
        invalid = stats.invalid,
        "Import complete"
    );
    Ok(stats)
}

/// Print import statistics
pub fn print_import_stats(stats: &ImportStats) {
    println!("\n📥 Import Complete\n");
    println!("  Lines read: {}", stats.lines);
    println!("  Imported: {}", stats.imported);
    println!("  Already known: {}", stats.duplicates);
    println!("  Invalid: {}", stats.invalid);
}
