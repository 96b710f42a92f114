//! Maximal-marginal-relevance context selection
//!
//! Greedy selection that trades query relevance against redundancy with
//! what has already been picked. The first pick is always the candidate
//! closest to the query; each later pick maximizes
//! `lambda * sim(query, c) - (1 - lambda) * max sim(c, selected)`.

use ragkit_config::constants::mmr::DEFAULT_LAMBDA;
use ragkit_core::ChunkMetadata;

use crate::text::numbered_citations;
use crate::vector::cosine;

/// Compact generation context built from an MMR-selected candidate subset.
#[derive(Debug, Clone, Default)]
pub struct SelectedContext {
    /// Numbered citation block: `[1] …` per selected passage
    pub context: String,
    /// Metadata of the selected passages, in selection order
    pub metadata: Vec<ChunkMetadata>,
    /// Indices into the input candidate slice, in selection order
    pub indices: Vec<usize>,
}

/// Greedy MMR over candidate vectors. Returns selected candidate indices in
/// pick order; stops at `top_k` or when candidates run out.
///
/// `lambda = 1` degenerates to plain top-k by query similarity; small
/// lambda values pick the seed then maximize diversity.
pub fn mmr_select(
    query_vec: &[f32],
    candidate_vecs: &[Vec<f32>],
    top_k: usize,
    lambda: f32,
) -> Vec<usize> {
    if candidate_vecs.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let sim_to_query: Vec<f32> = candidate_vecs
        .iter()
        .map(|v| cosine(query_vec, v))
        .collect();

    let mut remaining: Vec<usize> = (0..candidate_vecs.len()).collect();
    let mut selected: Vec<usize> = Vec::new();

    while selected.len() < top_k && !remaining.is_empty() {
        let pick = if selected.is_empty() {
            // seed with the most query-relevant candidate
            argmax(&remaining, |j| sim_to_query[j])
        } else {
            argmax(&remaining, |j| {
                let redundancy = selected
                    .iter()
                    .map(|&i| cosine(&candidate_vecs[j], &candidate_vecs[i]))
                    .fold(f32::MIN, f32::max);
                lambda * sim_to_query[j] - (1.0 - lambda) * redundancy
            })
        };
        selected.push(pick);
        remaining.retain(|&j| j != pick);
    }
    selected
}

/// Index in `candidates` maximizing `score`; ties keep the earliest.
fn argmax(candidates: &[usize], score: impl Fn(usize) -> f32) -> usize {
    let mut best = candidates[0];
    let mut best_score = score(best);
    for &j in &candidates[1..] {
        let s = score(j);
        if s > best_score {
            best_score = s;
            best = j;
        }
    }
    best
}

/// MMR-select from (text, metadata, vector) candidates and render the
/// numbered citation context.
pub fn compress_context(
    query_vec: &[f32],
    texts: &[String],
    metadata: &[ChunkMetadata],
    vectors: &[Vec<f32>],
    top_k: usize,
    lambda: Option<f32>,
) -> SelectedContext {
    let lambda = lambda.unwrap_or(DEFAULT_LAMBDA);
    let indices = mmr_select(query_vec, vectors, top_k, lambda);

    let selected_texts: Vec<String> = indices.iter().map(|&i| texts[i].clone()).collect();
    let selected_meta: Vec<ChunkMetadata> = indices
        .iter()
        .filter_map(|&i| metadata.get(i).cloned())
        .collect();

    SelectedContext {
        context: numbered_citations(&selected_texts),
        metadata: selected_meta,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> Vec<f32> {
        let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / n).collect()
    }

    #[test]
    fn test_empty_candidates() {
        assert!(mmr_select(&[1.0, 0.0], &[], 3, 0.7).is_empty());
    }

    #[test]
    fn test_seed_is_most_relevant() {
        let q = unit(&[1.0, 0.0]);
        let cands = vec![unit(&[0.0, 1.0]), unit(&[1.0, 0.1]), unit(&[0.5, 0.5])];
        let picks = mmr_select(&q, &cands, 1, 0.7);
        assert_eq!(picks, vec![1]);
    }

    #[test]
    fn test_lambda_one_is_pure_top_k_by_similarity() {
        let q = unit(&[1.0, 0.0]);
        let cands = vec![
            unit(&[1.0, 0.05]), // most similar
            unit(&[1.0, 0.10]),
            unit(&[0.0, 1.0]), // least similar
        ];
        let picks = mmr_select(&q, &cands, 3, 1.0);
        assert_eq!(picks, vec![0, 1, 2]);
    }

    #[test]
    fn test_small_lambda_avoids_near_duplicate() {
        let q = unit(&[1.0, 0.0]);
        // candidates 0 and 1 are near-duplicates of each other and of the
        // query; candidate 2 is orthogonal
        let cands = vec![unit(&[1.0, 0.01]), unit(&[1.0, 0.02]), unit(&[0.0, 1.0])];
        let picks = mmr_select(&q, &cands, 2, 0.1);
        // seed is the near-duplicate closest to the query, second pick is
        // the diverse candidate, not the other near-duplicate
        assert_eq!(picks[0], 0);
        assert_eq!(picks[1], 2);
    }

    #[test]
    fn test_stops_when_candidates_exhausted() {
        let q = unit(&[1.0, 0.0]);
        let cands = vec![unit(&[1.0, 0.1])];
        assert_eq!(mmr_select(&q, &cands, 5, 0.7).len(), 1);
    }

    #[test]
    fn test_compress_context_numbers_selected_passages() {
        let q = unit(&[1.0, 0.0]);
        let texts = vec!["first  passage".to_string(), "second".to_string()];
        let meta = vec![ChunkMetadata::default(), ChunkMetadata::default()];
        let vecs = vec![unit(&[1.0, 0.1]), unit(&[0.0, 1.0])];

        let ctx = compress_context(&q, &texts, &meta, &vecs, 2, None);
        assert!(ctx.context.starts_with("[1] first passage"));
        assert!(ctx.context.contains("\n[2] "));
        assert_eq!(ctx.metadata.len(), 2);
        assert_eq!(ctx.indices[0], 0);
    }
}
