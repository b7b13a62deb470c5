//! Per-topic commands: timeline, manual snapshot and operator merge

use crate::cluster::MergeOutcome;
use crate::error::{Error, Result};
use crate::models::HistoryPoint;
use crate::pipeline::Pipeline;
use chrono::Utc;
use tracing::info;

/// Newest-first history of a topic
pub async fn cmd_timeline(pipeline: &Pipeline, topic_id: &str, limit: Option<usize>) -> Result<Vec<HistoryPoint>> {
    info!(topic_id, "Loading timeline");
    pipeline.history().timeline(topic_id, limit).await
}

/// Record a manual history point for a topic
pub async fn cmd_snapshot(pipeline: &Pipeline, topic_id: &str) -> Result<HistoryPoint> {
    pipeline.history().record_manual(topic_id, Utc::now()).await
}

/// Merge `remove_id` into `keep_id`
pub async fn cmd_merge(pipeline: &Pipeline, keep_id: &str, remove_id: &str) -> Result<MergeOutcome> {
    if keep_id == remove_id {
        return Err(Error::Other("cannot merge a topic into itself".to_string()));
    }
    pipeline
        .merge_topics(keep_id, remove_id)
        .await?
        .ok_or_else(|| Error::TopicNotFound(format!("{} or {}", keep_id, remove_id)))
}

/// Print a topic timeline to console
pub fn print_timeline(topic_id: &str, points: &[HistoryPoint]) {
    println!("\n📜 Timeline for {}\n", topic_id);

    if points.is_empty() {
        println!("No history recorded.");
        return;
    }

    for point in points {
        println!(
            "[{}] {} (score {:.2}{})",
            point.created_at.format("%Y-%m-%d %H:%M"),
            point.history_type,
            point.significance_score,
            if point.was_regenerated { ", regenerated" } else { "" }
        );
        println!("  {}", point.title.as_deref().unwrap_or("(untitled)"));
        println!(
            "  Articles: {}, Sources: {}, Confidence: {:.2}",
            point.article_count,
            point.sources.len(),
            point.confidence
        );
        if let Some(note) = &point.development_note {
            println!("  Note: {}", note);
        }
        println!();
    }
}

/// Print a recorded snapshot
pub fn print_snapshot(point: &HistoryPoint) {
    println!("✓ Recorded {} history point {}", point.history_type, point.id);
    println!("  Topic: {}", point.topic_id);
    println!("  Articles: {}", point.article_count);
}

/// Print a merge result
pub fn print_merge(outcome: &MergeOutcome) {
    println!("✓ Merged {} into {}", outcome.removed_topic_id, outcome.kept_topic_id);
    println!("  Articles: {}", outcome.article_count);
}
