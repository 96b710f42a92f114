//! Hybrid retrieval and fusion engine
//!
//! The algorithmic core of the workspace:
//! - Paragraph chunking with tail overlap
//! - In-memory chunk store with tombstone deletes and explicit compaction
//! - Vector similarity search with encode-on-demand caching
//! - Lexical BM25 with a mixed-script tokenizer
//! - Alpha-blend and reciprocal-rank fusion
//! - MMR diversity selection into numbered citation contexts
//! - Graceful-degrade relevance reranking
//! - Multi-query refinement with self-consistency and faithfulness checks
//!
//! Providers (embedding, generation) are injected; nothing here is a
//! process-wide singleton.

pub mod chunker;
pub mod engine;
pub mod fusion;
pub mod lexical;
pub mod mmr;
pub mod refine;
pub mod reranker;
pub mod store;
pub mod text;
pub mod vector;

pub use chunker::{Chunker, ChunkerConfig};
pub use engine::{RagEngine, RagEngineConfig};
pub use fusion::{alpha_blend, rrf_fuse};
pub use lexical::{tokenize, LexicalIndex};
pub use mmr::{compress_context, mmr_select, SelectedContext};
pub use refine::{RagPlus, RagPlusConfig, RefinedAnswer};
pub use reranker::{RelevanceScorer, RerankedHit, Reranker, TokenOverlapScorer};
pub use store::{ChunkStore, SearchFilter};
pub use vector::{cosine, VectorIndex};

use thiserror::Error;

/// Engine-local errors
#[derive(Debug, Error)]
pub enum RagError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Index error: {0}")]
    Index(String),
}

impl From<RagError> for ragkit_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Io(msg) => ragkit_core::Error::Validation(msg),
            RagError::Snapshot(msg) => ragkit_core::Error::Parse(msg),
            RagError::Index(msg) => ragkit_core::Error::IndexInconsistency(msg),
        }
    }
}
