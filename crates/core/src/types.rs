//! Shared data model: documents, chunks, queries, hits, snapshots.
//!
//! Chunks are immutable in text once created; only the `disabled` flag and
//! the cached `vector` mutate in place. Index structures elsewhere are
//! derived state and are always rebuildable from these types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Document registry entry. Namespace and tags are the union over the
/// document's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub namespace: Option<String>,
    pub tags: Vec<String>,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Typed chunk metadata.
///
/// `source` carries arbitrary provenance info (file path, title, ...) that
/// callers attach at ingest time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub namespace: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub order: usize,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub source: HashMap<String, String>,
}

/// A chunk of document text. The id is `doc_id:index`; a chunk belongs to
/// exactly one document, identified by the id prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Embedding, absent until first encoded. Skipped in snapshots: a
    /// round-trip is content-preserving, not binary-exact.
    #[serde(skip)]
    pub vector: Option<Vec<f32>>,
}

/// Retrieval mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Lexical,
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Lexical => "lexical",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(SearchMode::Semantic),
            "lexical" | "bm25" => Ok(SearchMode::Lexical),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::Validation(format!("unknown search mode: {other}"))),
        }
    }
}

/// A search request. Validated before any index is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub text: String,
    pub top_k: usize,
    pub mode: SearchMode,
    /// Hybrid blend weight: semantic share in [0, 1].
    pub alpha: f32,
    pub namespace: Option<String>,
    pub tags_any: Option<Vec<String>>,
    pub tags_all: Option<Vec<String>>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: 6,
            mode: SearchMode::Hybrid,
            alpha: 0.7,
            namespace: None,
            tags_any: None,
            tags_all: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn tags_any(mut self, tags: Vec<String>) -> Self {
        self.tags_any = Some(tags);
        self
    }

    pub fn tags_all(mut self, tags: Vec<String>) -> Self {
        self.tags_all = Some(tags);
        self
    }

    /// Reject malformed queries before any index access.
    pub fn validate(&self) -> Result<(), Error> {
        if self.text.trim().is_empty() {
            return Err(Error::Validation("query text is empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(Error::Validation("top_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::Validation(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// A single retrieval result.
///
/// Score scale depends on the mode: cosine similarity in [-1, 1] for
/// semantic, unbounded non-negative BM25 for lexical, blended/fused for
/// hybrid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Serializable store snapshot. Vectors are omitted; importing recomputes
/// them on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub docs: Vec<DocumentInfo>,
    pub chunks: Vec<SnapshotChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

pub const SNAPSHOT_VERSION: u32 = 1;
