//! Embedding vector math
//!
//! Both helpers are total: degenerate input yields a neutral value instead
//! of an error, so callers can fall back to their previous state.

/// Tolerance used when comparing similarities against thresholds
pub const SIMILARITY_EPSILON: f64 = 1e-6;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either norm is zero or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Whether `similarity` reaches `threshold`, tolerating float rounding
pub fn meets_threshold(similarity: f64, threshold: f64) -> bool {
    similarity + SIMILARITY_EPSILON >= threshold
}

/// Arithmetic mean of the given vectors.
///
/// Returns `None` for an empty slice. Vectors whose dimension differs from
/// the first one are ignored.
pub fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = vectors.first()?.len();
    let mut sum = vec![0.0f64; dim];
    let mut count = 0usize;

    for v in vectors.iter().filter(|v| v.len() == dim) {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x as f64;
        }
        count += 1;
    }

    Some(sum.into_iter().map(|s| (s / count as f64) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_symmetric_and_self() {
        let a = vec![0.3, -1.2, 4.0];
        let b = vec![2.0, 0.5, 1.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-12);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
    }

    #[test]
    fn test_centroid() {
        assert!(centroid(&[]).is_none());
        assert_eq!(centroid(&[vec![1.0, 2.0]]), Some(vec![1.0, 2.0]));
        assert_eq!(
            centroid(&[vec![1.0, 3.0], vec![3.0, 5.0]]),
            Some(vec![2.0, 4.0])
        );
    }

    #[test]
    fn test_centroid_skips_mismatched_dimension() {
        let c = centroid(&[vec![2.0, 2.0], vec![9.0], vec![4.0, 0.0]]).unwrap();
        assert_eq!(c, vec![3.0, 1.0]);
    }

    #[test]
    fn test_meets_threshold_tolerates_rounding() {
        assert!(meets_threshold(0.85 - 1e-9, 0.85));
        assert!(!meets_threshold(0.84, 0.85));
    }
}
