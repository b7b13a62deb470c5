//! Significance scoring
//!
//! Pure functions comparing a topic against its last snapshot. Each factor
//! is scaled against a configurable minimum change: below the minimum it
//! rises linearly towards 1.0, at or above the minimum it is re-scaled
//! against a saturation point.

use crate::config::HistoryConfig;
use crate::models::{ChangeMetrics, HistoryPoint, HistoryType, SignificanceBreakdown, SignificanceFactors, Topic};
use crate::vector::cosine_similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    pub score: f64,
    pub history_type: HistoryType,
    pub is_significant: bool,
    pub breakdown: SignificanceBreakdown,
}

/// Score a factor against its minimum and saturation points, clamped to [0, 1]
fn scale(delta: f64, minimum: f64, saturation: f64) -> f64 {
    let score = if delta >= minimum {
        delta / saturation
    } else if minimum > 0.0 {
        delta / minimum
    } else {
        0.0
    };
    score.clamp(0.0, 1.0)
}

/// Measure what changed since `last`
pub fn measure(topic: &Topic, last: &HistoryPoint, now: DateTime<Utc>) -> ChangeMetrics {
    let current = topic.article_count() as i64;
    let previous = last.article_count as i64;
    let new_articles = current - previous;

    let embedding_drift = if topic.centroid.is_empty() || last.centroid.is_empty() {
        0.0
    } else {
        1.0 - cosine_similarity(&last.centroid, &topic.centroid)
    };

    ChangeMetrics {
        new_articles,
        growth_ratio: new_articles as f64 / previous.max(1) as f64,
        new_sources: topic.sources.difference(&last.sources).count(),
        confidence_delta: (topic.confidence - last.confidence).abs(),
        embedding_drift,
        elapsed_hours: (now - last.created_at).num_seconds() as f64 / 3600.0,
    }
}

/// Per-factor scores for the measured change
pub fn factors(config: &HistoryConfig, m: &ChangeMetrics) -> SignificanceFactors {
    let growth = if m.new_articles >= config.min_new_articles as i64 {
        let absolute = (m.new_articles as f64 / config.growth_saturation).min(1.0);
        (0.5 * m.growth_ratio + 0.5 * absolute).clamp(0.0, 1.0)
    } else {
        scale(m.new_articles as f64, config.min_new_articles as f64, config.growth_saturation)
    };

    SignificanceFactors {
        growth,
        source_diversity: scale(
            m.new_sources as f64,
            config.min_new_sources as f64,
            config.source_saturation,
        ),
        confidence_change: scale(
            m.confidence_delta,
            config.min_confidence_delta,
            config.confidence_saturation,
        ),
        embedding_drift: scale(m.embedding_drift, config.min_embedding_drift, config.drift_saturation),
        time_factor: scale(m.elapsed_hours, config.min_elapsed_hours, config.time_saturation_hours),
    }
}

fn weighted(config: &HistoryConfig, f: &SignificanceFactors) -> f64 {
    config.growth_weight * f.growth
        + config.source_diversity_weight * f.source_diversity
        + config.confidence_change_weight * f.confidence_change
        + config.embedding_drift_weight * f.embedding_drift
        + config.time_factor_weight * f.time_factor
}

/// Name the change after its dominant factor. Time never dominates; ties
/// go to the factor listed first.
pub fn classify(config: &HistoryConfig, f: &SignificanceFactors) -> HistoryType {
    let candidates = [
        (f.growth, HistoryType::MajorUpdate),
        (f.source_diversity, HistoryType::SourceExpansion),
        (f.confidence_change, HistoryType::ConfidenceShift),
        (f.embedding_drift, HistoryType::MajorUpdate),
    ];

    let mut dominant = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.0 > dominant.0 {
            dominant = *candidate;
        }
    }

    if dominant.0 > config.dominance_floor {
        dominant.1
    } else {
        HistoryType::MajorUpdate
    }
}

/// Evaluate whether `topic` changed enough since `last` to be snapshotted
pub fn evaluate(config: &HistoryConfig, topic: &Topic, last: Option<&HistoryPoint>, now: DateTime<Utc>) -> Significance {
    let Some(last) = last else {
        return Significance {
            score: 1.0,
            history_type: HistoryType::Initial,
            is_significant: true,
            breakdown: SignificanceBreakdown::Initial,
        };
    };

    let metrics = measure(topic, last, now);
    let factors = factors(config, &metrics);
    let weighted_score = weighted(config, &factors);

    let periodic_override = metrics.elapsed_hours / 24.0 >= config.periodic_snapshot_days
        && topic.article_count() >= config.periodic_min_articles;

    let (score, history_type) = if periodic_override {
        (
            weighted_score.max(config.significance_threshold + config.periodic_margin),
            HistoryType::Periodic,
        )
    } else {
        (weighted_score, classify(config, &factors))
    };

    Significance {
        score,
        history_type,
        is_significant: score >= config.significance_threshold,
        breakdown: SignificanceBreakdown::Scored {
            metrics,
            factors,
            weighted_score,
            periodic_override,
        },
    }
}
