//! Cosine similarity and the embedding-provider collaborator.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fixed dimension of the deterministic pseudo-embedding. A real provider
/// is free to use a different dimension as long as it is constant for the
/// life of the process — the strategy engine only ever compares embeddings
/// produced by the same provider against each other.
pub const PSEUDO_EMBEDDING_DIM: usize = 384;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// External collaborator contract: turn text into a fixed-dimension
/// embedding. Supplied by the gateway's actual embedding-capable provider;
/// if none is configured the cache falls back to [`pseudo_embedding`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` if the
/// lengths differ or either vector has zero norm, rather than producing
/// `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Raw dot product between two equal-length vectors. Returns `0.0` on a
/// length mismatch, matching `cosine_similarity`'s convention.
pub fn dot_product_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum()
}

/// Similarity derived from Euclidean distance as `1 / (1 + distance)`, so
/// identical vectors score `1.0` and similarity falls off monotonically with
/// distance rather than going negative. Returns `0.0` on a length mismatch.
pub fn euclidean_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let distance: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    1.0 / (1.0 + distance)
}

/// A deterministic stand-in for a real embedding, used for tests and for
/// deployments with no embedding provider configured. It carries no
/// semantic meaning whatsoever and must never be treated as one in
/// production; see the design notes on semantic correctness.
pub fn pseudo_embedding(text: &str) -> Vec<f32> {
    let mut hash: i64 = 0i64;
    for c in text.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(c as i64);
    }

    let mut v: Vec<f32> = (0..PSEUDO_EMBEDDING_DIM)
        .map(|i| (0.5 * ((hash as f64) + 7.0 * i as f64).sin()) as f32)
        .collect();

    let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_self_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_negation_is_negative_one() {
        let v = vec![1.0, 2.0, 3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&v, &neg) - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn cosine_mismatched_length_is_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn pseudo_embedding_is_deterministic() {
        assert_eq!(pseudo_embedding("hello"), pseudo_embedding("hello"));
        assert_ne!(pseudo_embedding("hello"), pseudo_embedding("goodbye"));
    }

    #[test]
    fn pseudo_embedding_has_fixed_dimension() {
        assert_eq!(pseudo_embedding("hello").len(), PSEUDO_EMBEDDING_DIM);
        assert_eq!(pseudo_embedding("").len(), PSEUDO_EMBEDDING_DIM);
    }

    #[test]
    fn dot_product_mismatched_length_is_zero() {
        assert_eq!(dot_product_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn euclidean_self_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((euclidean_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn euclidean_mismatched_length_is_zero() {
        assert_eq!(euclidean_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn pseudo_embedding_is_l2_normalized() {
        let v = pseudo_embedding("a reasonably long sentence to embed");
        let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6 || norm == 0.0);
    }
}
