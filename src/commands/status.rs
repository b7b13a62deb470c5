//! Status and topic listing commands

use crate::config::Config;
use crate::error::Result;
use crate::models::TopicStatus;
use crate::store::{NewsStore, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub embedding_model: String,
    pub narrative_model: String,
    pub narrative_enabled: bool,
    pub discussion_webhook: Option<String>,
    pub stats: StoreStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &NewsStore) -> Result<StatusInfo> {
    info!("Getting status");

    let stats = store.global_stats().await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        embedding_model: config.embedding.model.clone(),
        narrative_model: config.narrative.model.clone(),
        narrative_enabled: config.narrative.enabled,
        discussion_webhook: config.discussion.webhook_url.clone(),
        stats,
    })
}

/// One row of the topic listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: String,
    pub category: String,
    pub status: TopicStatus,
    pub title: Option<String>,
    pub article_count: usize,
    pub source_count: usize,
    pub confidence: f64,
    pub history_points: u32,
    pub created_at: String,
    pub last_updated: String,
}

/// List topics, optionally filtered by category and status
pub async fn cmd_topics(
    store: &NewsStore,
    category: Option<&str>,
    status: Option<&str>,
) -> Result<Vec<TopicSummary>> {
    info!("Listing topics");

    let status = status.map(str::parse::<TopicStatus>).transpose()?;
    let category = category.map(|c| c.trim().to_lowercase());
    let topics = store.list_topics(category.as_deref(), status).await?;

    Ok(topics
        .into_iter()
        .map(|t| TopicSummary {
            article_count: t.article_ids.len(),
            source_count: t.sources.len(),
            created_at: t.created_at.to_rfc3339(),
            last_updated: t.last_updated.to_rfc3339(),
            id: t.id,
            category: t.category,
            status: t.status,
            title: t.title,
            confidence: t.confidence,
            history_points: t.history_point_count,
        })
        .collect())
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 storyline Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nEmbedding Model: {}", status.embedding_model);
    if status.narrative_enabled {
        println!("Narrative Model: {}", status.narrative_model);
    } else {
        println!("Narrative Model: disabled");
    }
    println!(
        "Discussions: {}",
        status.discussion_webhook.as_deref().unwrap_or("log only")
    );

    println!("\nArticles:");
    if status.stats.articles_by_status.is_empty() {
        println!("  none");
    }
    for (state, count) in &status.stats.articles_by_status {
        println!("  {}: {}", state, count);
    }

    println!("\nTopics:");
    if status.stats.topics_by_status.is_empty() {
        println!("  none");
    }
    for (state, count) in &status.stats.topics_by_status {
        println!("  {}: {}", state, count);
    }
    println!("  titled: {}", status.stats.titled_topics);
    println!("\nHistory points: {}", status.stats.history_points);
}

/// Print topic listing to console
pub fn print_topics(topics: &[TopicSummary]) {
    println!("\n🗞  Topics\n");

    if topics.is_empty() {
        println!("No topics yet. Use 'storyline import' then 'storyline cluster'.");
        return;
    }

    for topic in topics {
        println!(
            "• {} [{} / {}]",
            topic.title.as_deref().unwrap_or("(untitled)"),
            topic.category,
            topic.status
        );
        println!("  ID: {}", topic.id);
        println!(
            "  Articles: {}, Sources: {}, Confidence: {:.2}, History: {}",
            topic.article_count, topic.source_count, topic.confidence, topic.history_points
        );
        println!("  Updated: {}", topic.last_updated);
        println!();
    }
}
