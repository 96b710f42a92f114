//! Retrieval backend capability.
//!
//! A single interface for the in-memory engine and any externally hosted
//! index. Implementations are selected by configuration and validated by one
//! shared conformance test suite written against this trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DocumentInfo, RetrievalHit, RetrievalQuery, Snapshot};

/// Result of an ingest call.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub doc_id: String,
    pub chunk_count: usize,
}

/// Chunk storage plus search over it.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Ingest raw text as one document. Empty text yields zero chunks, not
    /// an error. When `doc_id` is `None` an id is generated.
    async fn ingest(
        &self,
        text: &str,
        doc_id: Option<String>,
        namespace: Option<String>,
        tags: Vec<String>,
    ) -> Result<IngestReceipt>;

    /// Execute a validated retrieval query.
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>>;

    /// Documents sorted by chunk_count desc, then doc_id.
    fn list_documents(&self, namespace: Option<&str>) -> Vec<DocumentInfo>;

    /// Delete a document and all its chunks, returning the number removed.
    /// Unknown ids are a no-op returning 0.
    fn delete_document(&self, doc_id: &str) -> usize;

    /// Toggle a chunk's disabled flag. Returns whether the chunk exists;
    /// idempotent with respect to the prior flag value.
    fn set_chunk_disabled(&self, chunk_id: &str, disabled: bool) -> bool;

    /// Content-preserving snapshot (vectors omitted).
    fn export(&self) -> Snapshot;

    /// Replace store contents with a snapshot.
    fn import(&self, snapshot: Snapshot) -> Result<()>;
}
