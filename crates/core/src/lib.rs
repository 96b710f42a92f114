//! Core types and traits for the ragkit retrieval engine
//!
//! This crate provides the foundation used across all other crates:
//! - Provider traits (embedding, generation) for dependency injection
//! - The `RetrievalBackend` capability interface
//! - Data model types: documents, chunks, queries, hits, snapshots
//! - The shared error taxonomy

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{
    EmbeddingProvider, GenerateRequest, GenerationProvider, IngestReceipt, RetrievalBackend,
};
pub use types::{
    Chunk, ChunkMetadata, DocumentInfo, RetrievalHit, RetrievalQuery, SearchMode, Snapshot,
    SnapshotChunk, SNAPSHOT_VERSION,
};
