//! Rank fusion
//!
//! Two strategies with different jobs:
//! - [`alpha_blend`] merges exactly two ranked lists for one query (the
//!   semantic and lexical rankers) by min-max-normalized weighted sum.
//! - [`rrf_fuse`] merges any number of ranked lists (one per rewritten
//!   query) by reciprocal rank, deduplicating by content fingerprint.

use std::collections::HashMap;

use ragkit_config::constants::fusion::RRF_C;
use ragkit_core::RetrievalHit;

use crate::text::fingerprint;

/// Min-max normalize scores to [0, 1]. A constant-score list normalizes
/// to all zeros rather than dividing by zero.
fn min_max(list: &[(String, f32)]) -> HashMap<&str, f32> {
    if list.is_empty() {
        return HashMap::new();
    }
    let max = list.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max);
    let min = list.iter().map(|(_, s)| *s).fold(f32::MAX, f32::min);
    let range = max - min;
    list.iter()
        .map(|(id, s)| {
            let norm = if range > 0.0 { (s - min) / range } else { 0.0 };
            (id.as_str(), norm)
        })
        .collect()
}

/// Weighted blend of a semantic and a lexical ranking.
///
/// `combined = alpha * sem_norm + (1 - alpha) * lex_norm`, treating an id
/// absent from a list as 0 in that list. `alpha = 1.0` reproduces the
/// semantic order exactly; `alpha = 0.0` reproduces the lexical order.
pub fn alpha_blend(
    semantic: &[(String, f32)],
    lexical: &[(String, f32)],
    alpha: f32,
    top_k: usize,
) -> Vec<(String, f32)> {
    // Degenerate weights must reproduce the single list's order exactly,
    // including items whose normalized score ties at 0, so they bypass the
    // blend instead of relying on tie-breaks.
    if alpha >= 1.0 {
        return single_list(semantic, top_k);
    }
    if alpha <= 0.0 {
        return single_list(lexical, top_k);
    }

    let sem_norm = min_max(semantic);
    let lex_norm = min_max(lexical);

    // union in first-seen order so the stable sort keeps input order on ties
    let mut fused: Vec<(String, f32)> = Vec::new();
    let mut seen: HashMap<&str, ()> = HashMap::new();
    for (id, _) in semantic.iter().chain(lexical.iter()) {
        if seen.insert(id.as_str(), ()).is_some() {
            continue;
        }
        let s = sem_norm.get(id.as_str()).copied().unwrap_or(0.0);
        let l = lex_norm.get(id.as_str()).copied().unwrap_or(0.0);
        fused.push((id.clone(), alpha * s + (1.0 - alpha) * l));
    }

    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(top_k);
    fused
}

fn single_list(list: &[(String, f32)], top_k: usize) -> Vec<(String, f32)> {
    let norm = min_max(list);
    list.iter()
        .take(top_k)
        .map(|(id, _)| (id.clone(), norm.get(id.as_str()).copied().unwrap_or(0.0)))
        .collect()
}

/// Reciprocal rank fusion over many ranked lists.
///
/// Items are deduplicated by a normalized-content fingerprint; each list
/// contributes `1 / (c + rank)` with 1-based ranks and `c = 60`. Ties keep
/// first-encountered order.
pub fn rrf_fuse(rank_lists: &[Vec<RetrievalHit>], k: usize) -> Vec<RetrievalHit> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut items: HashMap<String, RetrievalHit> = HashMap::new();

    for list in rank_lists {
        for (rank, hit) in list.iter().enumerate() {
            let key = fingerprint(&hit.content);
            let entry = scores.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                0.0
            });
            *entry += 1.0 / (RRF_C + (rank + 1) as f32);
            items.entry(key).or_insert_with(|| hit.clone());
        }
    }

    let mut fused: Vec<RetrievalHit> = order
        .into_iter()
        .filter_map(|key| {
            let mut hit = items.remove(&key)?;
            hit.score = scores[&key];
            Some(hit)
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::ChunkMetadata;

    fn scored(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    fn hit(content: &str) -> RetrievalHit {
        RetrievalHit {
            id: content.to_string(),
            content: content.to_string(),
            score: 0.0,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn test_alpha_one_reproduces_semantic_order() {
        let sem = scored(&[("x", 0.9), ("y", 0.5), ("z", 0.1)]);
        let lex = scored(&[("z", 8.0), ("x", 2.0)]);
        let fused = alpha_blend(&sem, &lex, 1.0, 10);
        let ids: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_alpha_zero_reproduces_lexical_order() {
        let sem = scored(&[("x", 0.9), ("y", 0.5)]);
        let lex = scored(&[("z", 8.0), ("x", 2.0), ("w", 1.0)]);
        let fused = alpha_blend(&sem, &lex, 0.0, 10);
        let ids: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        // alpha 0 returns the lexical ranking alone; semantic-only ids are dropped
        assert_eq!(ids, vec!["z", "x", "w"]);
    }

    #[test]
    fn test_constant_score_list_normalizes_to_zero() {
        let sem = scored(&[("x", 0.5), ("y", 0.5)]);
        let lex = scored(&[("y", 3.0), ("x", 1.0)]);
        let fused = alpha_blend(&sem, &lex, 0.5, 10);
        // semantic contributes 0 everywhere, so lexical decides
        assert_eq!(fused[0].0, "y");
    }

    #[test]
    fn test_blend_favors_id_present_in_both_lists() {
        let sem = scored(&[("both", 0.8), ("sem_only", 1.0)]);
        let lex = scored(&[("both", 5.0), ("lex_only", 6.0)]);
        let fused = alpha_blend(&sem, &lex, 0.5, 10);
        assert_eq!(fused[0].0, "both");
    }

    #[test]
    fn test_rrf_unanimous_first_beats_single_first() {
        // X first in both lists, Y first in only one
        let lists = vec![
            vec![hit("X"), hit("Y")],
            vec![hit("X"), hit("Z")],
            vec![hit("Y"), hit("X")],
        ];
        let fused = rrf_fuse(&lists, 10);
        assert_eq!(fused[0].content, "X");
    }

    #[test]
    fn test_rrf_scenario_two_lists_agree_on_first() {
        let lists = vec![vec![hit("X"), hit("A")], vec![hit("X"), hit("B")]];
        let fused = rrf_fuse(&lists, 10);
        assert_eq!(fused[0].content, "X");
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_dedups_by_normalized_content() {
        let lists = vec![
            vec![hit("Same   Passage")],
            vec![hit("same passage")],
        ];
        let fused = rrf_fuse(&lists, 10);
        assert_eq!(fused.len(), 1);
    }

    #[test]
    fn test_rrf_truncates() {
        let lists = vec![vec![hit("a"), hit("b"), hit("c")]];
        assert_eq!(rrf_fuse(&lists, 2).len(), 2);
    }
}
