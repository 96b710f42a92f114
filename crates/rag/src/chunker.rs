//! Paragraph chunker
//!
//! Splits input on blank lines, normalizes whitespace within paragraphs, and
//! greedily packs paragraphs into chunks under a character budget. When a
//! chunk fills, the next one is seeded with a fixed-length suffix of the
//! previous chunk so adjacent chunks share local context. No semantic
//! boundary detection.

use std::collections::HashMap;
use std::path::Path;

use ragkit_config::constants::chunking;
use ragkit_core::{Chunk, ChunkMetadata};

use crate::text::normalize_ws;
use crate::RagError;

/// Chunker configuration
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,
    /// Tail characters of a filled chunk carried into the next
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: chunking::MAX_CHUNK_CHARS,
            overlap: chunking::OVERLAP_CHARS,
        }
    }
}

/// Paragraph/length-based document chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    fn split_paragraphs(text: &str) -> Vec<String> {
        text.replace("\r\n", "\n")
            .split("\n\n")
            .map(normalize_ws)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Character-boundary suffix of at most `n` chars.
    fn tail(s: &str, n: usize) -> String {
        let count = s.chars().count();
        s.chars().skip(count.saturating_sub(n)).collect()
    }

    /// Split text into chunk strings. Empty input yields an empty vec.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let paras = Self::split_paragraphs(text);
        if paras.is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut buf = String::new();

        for p in paras {
            if buf.chars().count() + p.chars().count() + 1 <= self.config.max_chars {
                if buf.is_empty() {
                    buf = p;
                } else {
                    buf.push(' ');
                    buf.push_str(&p);
                }
            } else {
                if !buf.is_empty() {
                    chunks.push(std::mem::take(&mut buf));
                }
                if let Some(last) = chunks.last() {
                    let prefix = Self::tail(last, self.config.overlap);
                    buf = format!("{} {}", prefix, p).trim().to_string();
                } else {
                    buf = p;
                }
            }
        }
        if !buf.is_empty() {
            chunks.push(buf);
        }
        chunks
    }

    /// Build the full chunk records for one document.
    pub fn chunk_document(
        &self,
        doc_id: &str,
        text: &str,
        namespace: Option<String>,
        tags: Vec<String>,
        source: HashMap<String, String>,
    ) -> Vec<Chunk> {
        let mut tags = tags;
        tags.sort();
        tags.dedup();

        self.chunk_text(text)
            .into_iter()
            .enumerate()
            .map(|(order, text)| Chunk {
                id: format!("{doc_id}:{order}"),
                doc_id: doc_id.to_string(),
                text,
                metadata: ChunkMetadata {
                    namespace: namespace.clone(),
                    tags: tags.clone(),
                    order,
                    disabled: false,
                    source: source.clone(),
                },
                vector: None,
            })
            .collect()
    }

    /// Read a file lossily as UTF-8 and return its text plus source info.
    /// Binary formats are not parsed; non-UTF-8 bytes are replaced.
    pub fn read_file(path: &Path) -> Result<(String, HashMap<String, String>), RagError> {
        let raw = std::fs::read(path).map_err(|e| RagError::Io(format!("{}: {e}", path.display())))?;
        let text = String::from_utf8_lossy(&raw).into_owned();

        let mut source = HashMap::new();
        source.insert("source_path".to_string(), path.display().to_string());
        Ok((text, source))
    }
}
