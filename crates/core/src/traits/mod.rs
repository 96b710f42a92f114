//! Seams for pluggable providers and backends.
//!
//! All external capabilities the engine consumes are expressed as traits so
//! implementations can be swapped and mocked:
//! - `EmbeddingProvider`: text -> fixed-dimension vector
//! - `GenerationProvider`: prompt -> text
//! - `RetrievalBackend`: chunk storage + search capability

mod backend;
mod embedding;
mod generation;

pub use backend::{IngestReceipt, RetrievalBackend};
pub use embedding::EmbeddingProvider;
pub use generation::{GenerateRequest, GenerationProvider};
