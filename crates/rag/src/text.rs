//! Small text utilities shared across the engine
//!
//! Whitespace normalization, content fingerprints for cross-list dedup,
//! numbered citation blocks, and the Jaccard majority vote used by
//! self-consistency sampling.

use ragkit_config::constants::refine::DEDUP_KEY_CHARS;

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Head snippet of normalized text, capped at `limit` characters.
pub fn take_head(s: &str, limit: usize) -> String {
    let t = normalize_ws(s);
    let mut out: String = t.chars().take(limit).collect();
    if t.chars().count() > limit {
        out.push('…');
    }
    out
}

/// Stable content key for deduplicating near-identical passages across
/// ranked lists: lowercase head of the normalized text. Chunk ids would be
/// stronger but passages from different sub-queries may carry different ids
/// for the same text.
pub fn fingerprint(s: &str) -> String {
    normalize_ws(s)
        .chars()
        .take(DEDUP_KEY_CHARS)
        .collect::<String>()
        .to_lowercase()
}

/// Render passages as a numbered citation block: `[1] …` per line.
pub fn numbered_citations(snippets: &[String]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, t)| format!("[{}] {}", i + 1, normalize_ws(t)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn token_set(s: &str) -> std::collections::HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over lowercase word sets, split on non-alphanumeric
/// characters.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let sa = token_set(a);
    let sb = token_set(b);
    let inter = sa.intersection(&sb).count();
    let union = sa.union(&sb).count().max(1);
    inter as f32 / union as f32
}

/// Pick the candidate with the greatest average pairwise Jaccard similarity
/// to the others. A cheap consensus proxy, not semantic clustering. Ties go
/// to the earliest candidate.
pub fn majority_vote(candidates: &[String]) -> String {
    match candidates {
        [] => String::new(),
        [only] => only.clone(),
        _ => {
            let mut best_index = 0;
            let mut best_score = f32::MIN;
            for (i, a) in candidates.iter().enumerate() {
                let score: f32 = candidates
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, b)| jaccard(a, b))
                    .sum();
                // strict comparison keeps first occurrence on ties
                if score > best_score {
                    best_score = score;
                    best_index = i;
                }
            }
            candidates[best_index].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("  a\t\nb   c "), "a b c");
    }

    #[test]
    fn test_take_head_appends_ellipsis_only_when_truncated() {
        assert_eq!(take_head("short text", 96), "short text");
        let long = "x".repeat(200);
        let head = take_head(&long, 96);
        assert!(head.ends_with('…'));
        assert_eq!(head.chars().count(), 97);
    }

    #[test]
    fn test_fingerprint_is_case_and_space_insensitive() {
        assert_eq!(fingerprint("Hello   World"), fingerprint("hello world"));
    }

    #[test]
    fn test_numbered_citations() {
        let ctx = numbered_citations(&["first  passage".to_string(), "second".to_string()]);
        assert_eq!(ctx, "[1] first passage\n[2] second");
    }

    #[test]
    fn test_majority_vote_prefers_consensus() {
        let answers = vec![
            "the sky is blue".to_string(),
            "the sky appears blue".to_string(),
            "bananas are yellow".to_string(),
        ];
        let winner = majority_vote(&answers);
        assert!(winner.contains("sky"));
    }

    #[test]
    fn test_majority_vote_tie_takes_first() {
        let answers = vec!["alpha beta".to_string(), "alpha beta".to_string()];
        assert_eq!(majority_vote(&answers), "alpha beta");
    }

    #[test]
    fn test_majority_vote_degenerate_inputs() {
        assert_eq!(majority_vote(&[]), "");
        assert_eq!(majority_vote(&["one".to_string()]), "one");
    }
}
