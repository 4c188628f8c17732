//! Vector embedding abstraction layer.
//!
//! The memory store embeds every record's payload text when it is written
//! and embeds the query context on retrieval. Any model can sit behind the
//! [`EmbeddingProvider`] trait; the built-in [`HashingEmbedder`] needs no
//! model files and is deterministic across runs.

use crate::error::{CoreError, Result};
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
///
/// Implementations must be `Send + Sync`; the store calls them from many
/// agent workers at once.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Embedding`] if the model fails to produce a
    /// vector.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A human-readable name for the model.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Feature-hashing provider
// ---------------------------------------------------------------------------

/// Bag-of-words embedder using the hashing trick.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets with a hash-derived sign, and the result is
/// L2-normalised. Texts sharing vocabulary get a positive cosine
/// similarity; unrelated texts land near zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    /// Create an embedder with the given dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(CoreError::Config("embedding dimensions must be at least 1".into()));
        }
        Ok(Self { dims: dimensions })
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vector = vec![0.0_f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let mag: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag > f32::EPSILON {
            for x in &mut vector {
                *x /= mag;
            }
        }
        Ok(Embedding(vector))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "fnv-hashing-bow"
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn embeddings_are_unit_length() {
        let e = HashingEmbedder::new(64).expect("dims");
        let v = e.embed("Bob helped Alice carry water").expect("embed");
        assert_eq!(v.dimensions(), 64);
        let mag: f32 = v.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-4, "expected unit vector, got magnitude {mag}");
    }

    #[test]
    fn deterministic_and_case_insensitive() {
        let e = HashingEmbedder::new(128).expect("dims");
        let a = e.embed("Festival at the Square").expect("embed");
        let b = e.embed("festival at the square").expect("embed");
        assert_eq!(a, b);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let e = HashingEmbedder::new(256).expect("dims");
        let query = e.embed("bakery bread").expect("embed");
        let related = e.embed("bought bread at the bakery").expect("embed");
        let unrelated = e.embed("storm over the harbor").expect("embed");
        assert!(query.cosine_similarity(&related) > query.cosine_similarity(&unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16).expect("dims");
        let v = e.embed("  ").expect("embed");
        assert!(v.0.iter().all(|x| *x == 0.0));
    }
}
