//! Lexical BM25 index
//!
//! Okapi BM25 over tokenized chunk text. Tables (per-chunk term frequency,
//! global document frequency, average chunk length) are derived state: they
//! are rebuilt in one O(corpus) pass whenever the store generation has
//! moved since the last build, not on every mutation. The rebuild happens
//! under the table write lock, so a concurrent search sees either the old
//! or the new tables, never a partial rebuild.
//!
//! Tokenization handles mixed scripts: ASCII alphanumeric runs become
//! lowercase word tokens; contiguous non-ASCII runs go through Unicode word
//! segmentation with single-character segments dropped as ideographic
//! noise.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use unicode_segmentation::UnicodeSegmentation;

use ragkit_config::constants::bm25::{B, K1};

use crate::store::{ChunkStore, SearchFilter};

/// Mixed-script tokenizer shared by indexing and querying.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut ascii_run = String::new();
    let mut other_run = String::new();

    let flush_ascii = |run: &mut String, out: &mut Vec<String>| {
        if !run.is_empty() {
            out.push(std::mem::take(run));
        }
    };
    let flush_other = |run: &mut String, out: &mut Vec<String>| {
        if !run.is_empty() {
            for word in run.unicode_words() {
                if word.chars().count() > 1 {
                    out.push(word.to_string());
                }
            }
            run.clear();
        }
    };

    for c in text.chars() {
        if c.is_ascii() {
            flush_other(&mut other_run, &mut tokens);
            if c.is_ascii_alphanumeric() {
                ascii_run.push(c.to_ascii_lowercase());
            } else {
                flush_ascii(&mut ascii_run, &mut tokens);
            }
        } else {
            flush_ascii(&mut ascii_run, &mut tokens);
            other_run.push(c);
        }
    }
    flush_ascii(&mut ascii_run, &mut tokens);
    flush_other(&mut other_run, &mut tokens);
    tokens
}

#[derive(Default)]
struct Tables {
    /// Store generation the tables were built at
    built_at: Option<u64>,
    /// chunk id -> term frequency
    tf: HashMap<String, HashMap<String, u32>>,
    /// chunk id -> token count
    lengths: HashMap<String, u32>,
    /// term -> number of chunks containing it
    df: HashMap<String, u32>,
    avgdl: f32,
    corpus_size: usize,
}

/// BM25 index over the chunk store.
pub struct LexicalIndex {
    store: Arc<ChunkStore>,
    tables: RwLock<Tables>,
    k1: f32,
    b: f32,
}

impl LexicalIndex {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self {
            store,
            tables: RwLock::new(Tables::default()),
            k1: K1,
            b: B,
        }
    }

    /// Rebuild tables if the store has mutated since the last build.
    fn ensure_fresh(&self) {
        let generation = self.store.generation();
        if self.tables.read().built_at == Some(generation) {
            return;
        }

        let mut tables = self.tables.write();
        // another search may have rebuilt while we waited for the lock
        if tables.built_at == Some(generation) {
            return;
        }

        let mut fresh = Tables {
            built_at: Some(generation),
            ..Default::default()
        };

        {
            let inner = self.store.read();
            let mut total_len: u64 = 0;
            for i in inner.live() {
                let chunk = &inner.slots[i].chunk;
                let toks = tokenize(&chunk.text);
                total_len += toks.len() as u64;

                let mut freq: HashMap<String, u32> = HashMap::new();
                for t in toks {
                    *freq.entry(t).or_insert(0) += 1;
                }
                for term in freq.keys() {
                    *fresh.df.entry(term.clone()).or_insert(0) += 1;
                }
                fresh
                    .lengths
                    .insert(chunk.id.clone(), freq.values().sum());
                fresh.tf.insert(chunk.id.clone(), freq);
                fresh.corpus_size += 1;
            }
            fresh.avgdl = if fresh.corpus_size > 0 {
                total_len as f32 / fresh.corpus_size as f32
            } else {
                0.0
            };
        }

        tracing::debug!(
            chunks = fresh.corpus_size,
            terms = fresh.df.len(),
            "lexical tables rebuilt"
        );
        *tables = fresh;
    }

    /// Hits as (chunk_id, bm25) sorted descending, truncated to `top_k`.
    /// Only strictly positive scores are returned.
    pub fn search(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Vec<(String, f32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let candidates = self.store.filtered_ids(filter);
        if candidates.is_empty() {
            return Vec::new();
        }

        self.ensure_fresh();
        let tables = self.tables.read();
        let n = tables.corpus_size as f32;

        let mut scored: Vec<(String, f32)> = Vec::new();
        for id in candidates {
            let Some(tf) = tables.tf.get(&id) else {
                continue;
            };
            let dl = *tables.lengths.get(&id).unwrap_or(&0) as f32;
            let dl = dl.max(1.0);

            let mut score = 0.0f32;
            for term in &query_tokens {
                let f = *tf.get(term).unwrap_or(&0) as f32;
                if f == 0.0 {
                    continue;
                }
                let df = *tables.df.get(term).unwrap_or(&0) as f32;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let denom = f + self.k1 * (1.0 - self.b + self.b * dl / tables.avgdl.max(1.0));
                score += idf * f * (self.k1 + 1.0) / denom;
            }
            if score > 0.0 {
                scored.push((id, score));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}
