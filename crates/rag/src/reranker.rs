//! Relevance reranking
//!
//! A reranker scores each (query, candidate) pair directly instead of
//! comparing independently computed vectors. The scorer sits behind the
//! [`RelevanceScorer`] trait so a cross-encoder service can slot in; the
//! shipped [`TokenOverlapScorer`] is a cheap local implementation.
//!
//! Reranking must never abort a search: with no scorer configured, or when
//! the scorer fails, every pair gets the neutral score and the input order
//! is preserved.

use std::sync::Arc;

use async_trait::async_trait;

use ragkit_config::constants::reranker::NEUTRAL_SCORE;
use ragkit_core::{ChunkMetadata, Result, RetrievalHit};

use crate::text::jaccard;

/// Scores (query, candidate) pairs jointly. One score per candidate, same
/// order as the input.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

/// Token-overlap scorer: Jaccard between query and candidate word sets.
/// Deterministic and local; a stand-in for a real cross-encoder.
pub struct TokenOverlapScorer;

#[async_trait]
impl RelevanceScorer for TokenOverlapScorer {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        Ok(candidates.iter().map(|c| jaccard(query, c)).collect())
    }
}

/// A reranked result, keeping the pre-rerank score for audit.
#[derive(Debug, Clone)]
pub struct RerankedHit {
    pub id: String,
    pub content: String,
    pub rerank_score: f32,
    pub original_score: f32,
    pub metadata: ChunkMetadata,
}

/// Reranking stage over retrieved hits.
#[derive(Default)]
pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            scorer: Some(scorer),
        }
    }

    /// A reranker with no scoring backend; every pair gets the neutral
    /// score and input order is preserved.
    pub fn disabled() -> Self {
        Self { scorer: None }
    }

    /// Rerank hits, sort by rerank score descending, truncate to `top_k`.
    pub async fn rerank(&self, query: &str, hits: Vec<RetrievalHit>, top_k: usize) -> Vec<RerankedHit> {
        if hits.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<String> = hits.iter().map(|h| h.content.clone()).collect();
        let scores = match &self.scorer {
            Some(scorer) => match scorer.score(query, &candidates).await {
                Ok(scores) if scores.len() == hits.len() => scores,
                Ok(scores) => {
                    tracing::warn!(
                        got = scores.len(),
                        expected = hits.len(),
                        "scorer returned wrong arity, using neutral scores"
                    );
                    vec![NEUTRAL_SCORE; hits.len()]
                }
                Err(e) => {
                    tracing::warn!(error = %e, "scorer unavailable, using neutral scores");
                    vec![NEUTRAL_SCORE; hits.len()]
                }
            },
            None => vec![NEUTRAL_SCORE; hits.len()],
        };

        let mut reranked: Vec<RerankedHit> = hits
            .into_iter()
            .zip(scores)
            .map(|(hit, rerank_score)| RerankedHit {
                id: hit.id,
                content: hit.content,
                rerank_score,
                original_score: hit.score,
                metadata: hit.metadata,
            })
            .collect();

        // stable sort: equal scores keep retrieval order
        reranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(top_k);
        reranked
    }
}
