//! Vector similarity search with encode-on-demand
//!
//! One embedding per chunk, computed the first time a search needs it and
//! cached on the chunk. Filters run before any encode work, so excluded
//! chunks never cost an embedding call.
//!
//! Lock discipline: candidate texts are copied out under a read lock, the
//! provider call runs with no lock held, and vectors are written back under
//! a short write lock that skips slots another request already filled.
//! Two concurrent searches can therefore both encode the same uncached
//! chunk; last write wins and the values are equivalent, so the duplicate
//! work is accepted and bounded rather than guarded per chunk.

use std::sync::Arc;

use ragkit_config::constants::similarity::COSINE_EPS;
use ragkit_core::{EmbeddingProvider, Result};

use crate::store::{ChunkStore, SearchFilter};

/// Cosine similarity with an epsilon guard so zero vectors score 0 instead
/// of NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    dot / (na * nb + COSINE_EPS)
}

/// Similarity search over chunk embeddings.
pub struct VectorIndex {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    pub fn new(store: Arc<ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Encode chunks in `ids` that do not yet carry a vector. Chunks that
    /// already have one are skipped: embeddings are computed at most once
    /// per chunk unless explicitly invalidated.
    async fn encode_on_demand(&self, ids: &[String]) -> Result<()> {
        let pending: Vec<(String, String)> = {
            let inner = self.store.read();
            ids.iter()
                .filter_map(|id| {
                    let &index = inner.by_id.get(id)?;
                    let slot = &inner.slots[index];
                    (!slot.tombstone && slot.chunk.vector.is_none())
                        .then(|| (id.clone(), slot.chunk.text.clone()))
                })
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let vectors = self.embedder.encode(&texts).await?;
        tracing::debug!(encoded = vectors.len(), "chunk embeddings computed");

        let mut inner = self.store.write();
        for ((id, _), vector) in pending.into_iter().zip(vectors) {
            if let Some(&index) = inner.by_id.get(&id) {
                let slot = &mut inner.slots[index];
                // another request may have filled this slot meanwhile
                if !slot.tombstone && slot.chunk.vector.is_none() {
                    slot.chunk.vector = Some(vector);
                }
            }
        }
        Ok(())
    }

    /// Clear cached vectors so the next search re-encodes. For explicit
    /// invalidation after text revision; normal mutation paths never call
    /// this.
    pub fn invalidate(&self, ids: &[String]) {
        let mut inner = self.store.write();
        for id in ids {
            if let Some(&index) = inner.by_id.get(id) {
                inner.slots[index].chunk.vector = None;
            }
        }
    }

    /// Hits as (chunk_id, cosine) sorted descending, truncated to `top_k`.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(String, f32)>> {
        let candidates = self.store.filtered_ids(filter);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        self.encode_on_demand(&candidates).await?;

        let query_vec = self
            .embedder
            .encode(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(String, f32)> = {
            let inner = self.store.read();
            candidates
                .iter()
                .filter_map(|id| {
                    let &index = inner.by_id.get(id)?;
                    let vector = inner.slots[index].chunk.vector.as_ref()?;
                    Some((id.clone(), cosine(&query_vec, vector)))
                })
                .collect()
        };

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Embed arbitrary texts through the index's provider. Used by the
    /// refinement orchestrator for MMR over fused candidates.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedder.encode(texts).await
    }
}
