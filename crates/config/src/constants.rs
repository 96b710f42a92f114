//! Tuning constants shared across the workspace
//!
//! These are the defaults baked into the retrieval pipeline. Most of them
//! can be overridden at runtime through [`crate::Settings`]; the ones that
//! cannot (scoring formulas, dedup key widths) live here so the numbers are
//! defined exactly once.

/// Document chunking
pub mod chunking {
    /// Maximum characters packed into a single chunk
    pub const MAX_CHUNK_CHARS: usize = 700;

    /// Characters carried over from the tail of one chunk into the next
    pub const OVERLAP_CHARS: usize = 80;
}

/// BM25 (Okapi) parameters
pub mod bm25 {
    /// Term-frequency saturation
    pub const K1: f32 = 1.5;

    /// Length normalization strength
    pub const B: f32 = 0.75;
}

/// Score fusion
pub mod fusion {
    /// Reciprocal-rank-fusion constant: contribution is 1 / (RRF_C + rank)
    pub const RRF_C: f32 = 60.0;

    /// Default semantic weight for alpha-blend hybrid scoring
    pub const DEFAULT_ALPHA: f32 = 0.7;

    /// Minimum candidates fetched per ranker before fusion, regardless of
    /// the requested top_k
    pub const CANDIDATE_FLOOR: usize = 20;
}

/// Maximal-marginal-relevance selection
pub mod mmr {
    /// Relevance/diversity trade-off: 1.0 is pure relevance
    pub const DEFAULT_LAMBDA: f32 = 0.7;

    /// Upper bound on passages packed into a generation context
    pub const MAX_CONTEXT_PASSAGES: usize = 8;
}

/// Multi-query refinement
pub mod refine {
    /// Sub-queries sent to retrieval (original question included)
    pub const REWRITE_COUNT: usize = 3;

    /// Answer samples drawn for self-consistency voting
    pub const SAMPLE_COUNT: usize = 3;

    /// Sampling temperatures, one per answer sample
    pub const TEMPERATURES: [f32; 3] = [0.2, 0.4, 0.6];

    /// Rewritten queries are truncated to this many characters
    pub const MAX_QUERY_CHARS: usize = 128;

    /// Characters of normalized text used as the cross-query dedup key
    pub const DEDUP_KEY_CHARS: usize = 96;
}

/// Vector similarity
pub mod similarity {
    /// Added to the norm product so zero vectors score 0 instead of NaN
    pub const COSINE_EPS: f32 = 1e-8;
}

/// Reranking
pub mod reranker {
    /// Score assigned when the scoring provider output cannot be parsed
    pub const NEUTRAL_SCORE: f32 = 0.5;
}

/// Provider call timeouts (milliseconds)
pub mod timeouts {
    pub const EMBED_MS: u64 = 30_000;
    pub const GENERATE_MS: u64 = 60_000;
}
