//! Batch job commands: cluster, sweep, history and the scheduled run loop

use crate::error::Result;
use crate::history::HistoryCycleStats;
use crate::lifecycle::SweepStats;
use crate::pipeline::{ClusteringStats, Pipeline, RunStats};
use std::time::Duration;
use tracing::{error, info};

/// Cluster every pending article
pub async fn cmd_cluster(pipeline: &Pipeline) -> Result<ClusteringStats> {
    info!("Clustering pending articles");
    pipeline.process_pending_articles().await
}

/// Run the lifecycle sweep
pub async fn cmd_sweep(pipeline: &Pipeline) -> Result<SweepStats> {
    info!("Running lifecycle sweep");
    pipeline.run_lifecycle_sweep().await
}

/// Run the history check cycle
pub async fn cmd_history(pipeline: &Pipeline) -> Result<HistoryCycleStats> {
    info!("Running history check cycle");
    pipeline.run_history_check_cycle().await
}

/// Run the pipeline once, or every `interval` until Ctrl-C when `watch` is set.
///
/// `on_run` receives the stats of each completed run. A failed run is logged
/// and the loop keeps going.
pub async fn cmd_run<F>(pipeline: &Pipeline, watch: bool, interval: Duration, mut on_run: F) -> Result<()>
where
    F: FnMut(&RunStats),
{
    if !watch {
        let stats = pipeline.run_once().await?;
        on_run(&stats);
        return Ok(());
    }

    info!(interval_secs = interval.as_secs(), "Watching for pending work");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match pipeline.run_once().await {
                    Ok(stats) => on_run(&stats),
                    Err(e) => error!("Pipeline run failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

/// Print clustering statistics
pub fn print_cluster_stats(stats: &ClusteringStats) {
    println!("\n🧩 Clustering Complete\n");
    println!("  Articles processed: {}", stats.processed);
    println!("  Topics created: {}", stats.topics_created);
    println!("  Topics updated: {}", stats.topics_updated);
    println!("  Topics resurrected: {}", stats.topics_resurrected);
    println!("  Topics merged: {}", stats.topics_merged);
    println!("  Articles trimmed: {}", stats.articles_trimmed);
    println!("  Titles generated: {}", stats.titles_generated);
    println!("  History points: {}", stats.history_points);

    if stats.skipped_no_embedding > 0 {
        println!("  Waiting for embedding: {}", stats.skipped_no_embedding);
    }
    if stats.embedding_failures > 0 || stats.title_failures > 0 || stats.failed > 0 {
        println!(
            "  ⚠ Failures: {} embedding, {} title, {} other",
            stats.embedding_failures, stats.title_failures, stats.failed
        );
    }
    if stats.discussion_tasks.failed > 0 {
        println!("  ⚠ Discussion notifications failed: {}", stats.discussion_tasks.failed);
    }
}

/// Print sweep statistics
pub fn print_sweep_stats(stats: &SweepStats) {
    println!("\n🧹 Sweep Complete\n");
    println!("  Articles expired: {}", stats.articles_expired);
    println!("  Articles purged: {}", stats.articles_purged);
    println!("  Orphans archived: {}", stats.articles_orphaned);
    println!("  Topics marked stale: {}", stats.topics_staled);
    println!("  Topics archived: {}", stats.topics_archived);
    println!("  Topics deleted: {}", stats.topics_deleted);
    println!(
        "  Small topics pruned: {} ({} articles requeued)",
        stats.topics_pruned, stats.articles_requeued
    );
    if stats.errors > 0 {
        println!("  ⚠ Errors: {}", stats.errors);
    }
}

/// Print history cycle statistics
pub fn print_history_stats(stats: &HistoryCycleStats) {
    println!("\n📜 History Check Complete\n");
    println!("  Topics checked: {}", stats.topics_checked);
    println!("  History points: {}", stats.histories_created);
    for (history_type, count) in &stats.by_type {
        println!("    {}: {}", history_type, count);
    }
    println!("  Narratives regenerated: {}", stats.regenerations);
    if stats.provider_failures > 0 || stats.errors > 0 {
        println!(
            "  ⚠ Failures: {} provider, {} other",
            stats.provider_failures, stats.errors
        );
    }
}

/// Print a full run
pub fn print_run_stats(stats: &RunStats) {
    print_cluster_stats(&stats.clustering);
    print_history_stats(&stats.history);
    print_sweep_stats(&stats.sweep);
}
