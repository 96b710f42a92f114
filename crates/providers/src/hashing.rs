//! Deterministic hashing embedder
//!
//! Feature-hashing over word tokens: each token is hashed into a bucket of a
//! fixed-size vector with a sign bit, then the vector is L2-normalized. No
//! model weights involved, so it is fast, deterministic across runs, and
//! good enough for tests and offline development where only relative
//! similarity matters.

use async_trait::async_trait;

use ragkit_core::traits::EmbeddingProvider;

/// Default number of hash buckets
pub const DEFAULT_DIMENSION: usize = 384;

/// Embedding provider backed by feature hashing
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash as usize) % self.dimension;
            // Top bit decides the sign so unrelated tokens cancel rather
            // than pile up in the same direction
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn encode(&self, texts: &[String]) -> ragkit_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
