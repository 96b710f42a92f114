//! The in-memory retrieval engine
//!
//! [`RagEngine`] wires the chunk store, vector index, and lexical index
//! behind the [`RetrievalBackend`] capability. Providers are injected at
//! construction; the engine holds no process-wide state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use ragkit_config::constants::fusion::CANDIDATE_FLOOR;
use ragkit_config::Settings;
use ragkit_core::{
    DocumentInfo, EmbeddingProvider, IngestReceipt, Result, RetrievalBackend, RetrievalHit,
    RetrievalQuery, SearchMode, Snapshot,
};

use crate::chunker::{Chunker, ChunkerConfig};
use crate::fusion::alpha_blend;
use crate::lexical::LexicalIndex;
use crate::reranker::Reranker;
use crate::store::{ChunkStore, SearchFilter};
use crate::vector::VectorIndex;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct RagEngineConfig {
    pub chunker: ChunkerConfig,
    /// Candidates fetched from each ranker before hybrid fusion
    pub candidate_floor: usize,
    /// Rerank retrieved hits before returning them
    pub rerank_enabled: bool,
}

impl Default for RagEngineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            candidate_floor: CANDIDATE_FLOOR,
            rerank_enabled: false,
        }
    }
}

impl RagEngineConfig {
    /// Map loaded settings onto the engine knobs.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chunker: ChunkerConfig {
                max_chars: settings.chunking.max_chars,
                overlap: settings.chunking.overlap_chars,
            },
            candidate_floor: settings.retrieval.candidate_floor,
            rerank_enabled: settings.rerank.enabled,
        }
    }
}

/// Hybrid retrieval engine over an in-memory chunk store.
pub struct RagEngine {
    store: Arc<ChunkStore>,
    vector: VectorIndex,
    lexical: LexicalIndex,
    chunker: Chunker,
    reranker: Reranker,
    config: RagEngineConfig,
}

impl RagEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: RagEngineConfig) -> Self {
        let store = Arc::new(ChunkStore::new());
        Self {
            vector: VectorIndex::new(store.clone(), embedder),
            lexical: LexicalIndex::new(store.clone()),
            chunker: Chunker::new(config.chunker.clone()),
            reranker: Reranker::disabled(),
            store,
            config,
        }
    }

    /// Attach a reranking stage. It only runs when
    /// `config.rerank_enabled` is set.
    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn vector_index(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn document_count(&self) -> usize {
        self.store.document_count()
    }

    pub fn chunk_count(&self) -> usize {
        self.store.chunk_count()
    }

    /// Physically reclaim tombstoned slots. O(live chunks).
    pub fn compact(&self) -> usize {
        self.store.compact()
    }

    /// Ingest a file read lossily as UTF-8, recording its path as source
    /// provenance.
    pub async fn ingest_file(
        &self,
        path: &Path,
        doc_id: Option<String>,
        namespace: Option<String>,
        tags: Vec<String>,
    ) -> Result<IngestReceipt> {
        let (text, source) = Chunker::read_file(path)?;
        self.ingest_with_source(&text, doc_id, namespace, tags, source)
    }

    fn ingest_with_source(
        &self,
        text: &str,
        doc_id: Option<String>,
        namespace: Option<String>,
        tags: Vec<String>,
        source: HashMap<String, String>,
    ) -> Result<IngestReceipt> {
        let doc_id = doc_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunks = self
            .chunker
            .chunk_document(&doc_id, text, namespace, tags, source);
        let chunk_count = self.store.insert_document(&doc_id, chunks);
        tracing::info!(doc_id, chunk_count, "document ingested");
        Ok(IngestReceipt {
            doc_id,
            chunk_count,
        })
    }

    fn filter_of(query: &RetrievalQuery) -> SearchFilter {
        SearchFilter {
            namespace: query.namespace.clone(),
            tags_any: query.tags_any.clone(),
            tags_all: query.tags_all.clone(),
        }
    }

    async fn hybrid(&self, query: &RetrievalQuery, filter: &SearchFilter) -> Result<Vec<(String, f32)>> {
        // both rankers see a candidate floor so fusion has material to work
        // with even for small top_k
        let fetch = query.top_k.max(self.config.candidate_floor);
        let semantic = self.vector.search(&query.text, fetch, filter).await?;
        let lexical = self.lexical.search(&query.text, fetch, filter);
        Ok(alpha_blend(&semantic, &lexical, query.alpha, query.top_k))
    }
}

#[async_trait]
impl RetrievalBackend for RagEngine {
    async fn ingest(
        &self,
        text: &str,
        doc_id: Option<String>,
        namespace: Option<String>,
        tags: Vec<String>,
    ) -> Result<IngestReceipt> {
        self.ingest_with_source(text, doc_id, namespace, tags, HashMap::new())
    }

    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>> {
        query.validate()?;
        let filter = Self::filter_of(query);

        let scored = match query.mode {
            SearchMode::Semantic => self.vector.search(&query.text, query.top_k, &filter).await?,
            SearchMode::Lexical => self.lexical.search(&query.text, query.top_k, &filter),
            SearchMode::Hybrid => self.hybrid(query, &filter).await?,
        };
        let hits = self.store.hydrate(&scored);

        if self.config.rerank_enabled {
            let reranked = self.reranker.rerank(&query.text, hits, query.top_k).await;
            return Ok(reranked
                .into_iter()
                .map(|r| RetrievalHit {
                    id: r.id,
                    content: r.content,
                    score: r.rerank_score,
                    metadata: r.metadata,
                })
                .collect());
        }
        Ok(hits)
    }

    fn list_documents(&self, namespace: Option<&str>) -> Vec<DocumentInfo> {
        self.store.list_documents(namespace)
    }

    fn delete_document(&self, doc_id: &str) -> usize {
        self.store.delete_document(doc_id)
    }

    fn set_chunk_disabled(&self, chunk_id: &str, disabled: bool) -> bool {
        self.store.set_chunk_disabled(chunk_id, disabled)
    }

    fn export(&self) -> Snapshot {
        self.store.export()
    }

    fn import(&self, snapshot: Snapshot) -> Result<()> {
        self.store.import(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_providers::HashingEmbedder;

    fn engine() -> RagEngine {
        RagEngine::new(Arc::new(HashingEmbedder::default()), RagEngineConfig::default())
    }

    async fn seeded() -> RagEngine {
        let e = engine();
        e.ingest(
            "The borrow checker enforces ownership rules in rust programs.",
            Some("rust".to_string()),
            None,
            vec!["lang".to_string()],
        )
        .await
        .unwrap();
        e.ingest(
            "Sourdough bread needs a mature starter and long fermentation.",
            Some("bread".to_string()),
            None,
            vec!["food".to_string()],
        )
        .await
        .unwrap();
        e
    }

    #[test]
    fn test_config_maps_settings_overrides() {
        let mut settings = Settings::default();
        settings.chunking.max_chars = 300;
        settings.chunking.overlap_chars = 40;
        settings.retrieval.candidate_floor = 5;
        settings.rerank.enabled = true;

        let config = RagEngineConfig::from_settings(&settings);
        assert_eq!(config.chunker.max_chars, 300);
        assert_eq!(config.chunker.overlap, 40);
        assert_eq!(config.candidate_floor, 5);
        assert!(config.rerank_enabled);
    }

    #[tokio::test]
    async fn test_ingest_generates_doc_id_when_missing() {
        let e = engine();
        let receipt = e.ingest("some text", None, None, vec![]).await.unwrap();
        assert!(!receipt.doc_id.is_empty());
        assert_eq!(receipt.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_text_zero_chunks() {
        let e = engine();
        let receipt = e.ingest("   ", None, None, vec![]).await.unwrap();
        assert_eq!(receipt.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_queries() {
        let e = seeded().await;
        assert!(e.search(&RetrievalQuery::new("  ")).await.is_err());
        assert!(e.search(&RetrievalQuery::new("q").top_k(0)).await.is_err());
        assert!(e.search(&RetrievalQuery::new("q").alpha(2.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_all_modes_find_the_relevant_chunk() {
        let e = seeded().await;
        for mode in [SearchMode::Semantic, SearchMode::Lexical, SearchMode::Hybrid] {
            let hits = e
                .search(&RetrievalQuery::new("borrow checker ownership").mode(mode))
                .await
                .unwrap();
            assert!(!hits.is_empty(), "mode {mode} returned nothing");
            assert_eq!(hits[0].id, "rust:0", "mode {mode} ranked wrong chunk first");
        }
    }

    #[tokio::test]
    async fn test_tag_filter_scenario() {
        // doc tagged ["food"]; searching with tags_any=["sports"] finds nothing
        let e = seeded().await;
        let hits = e
            .search(
                &RetrievalQuery::new("sourdough starter")
                    .tags_any(vec!["sports".to_string()]),
            )
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_chunk_hidden_in_every_mode() {
        let e = seeded().await;
        assert!(e.set_chunk_disabled("rust:0", true));
        for mode in [SearchMode::Semantic, SearchMode::Lexical, SearchMode::Hybrid] {
            let hits = e
                .search(&RetrievalQuery::new("borrow checker rust").mode(mode))
                .await
                .unwrap();
            assert!(hits.iter().all(|h| h.id != "rust:0"));
        }
    }

    #[tokio::test]
    async fn test_rerank_stage_replaces_scores() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::default());
        let e = RagEngine::new(
            embedder,
            RagEngineConfig {
                rerank_enabled: true,
                ..Default::default()
            },
        )
        .with_reranker(Reranker::disabled());
        e.ingest("alpha beta gamma", Some("d".to_string()), None, vec![])
            .await
            .unwrap();

        let hits = e.search(&RetrievalQuery::new("alpha")).await.unwrap();
        assert!(hits.iter().all(|h| h.score == 0.5));
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "file based ingestion works").unwrap();

        let e = engine();
        let receipt = e
            .ingest_file(&path, Some("f".to_string()), None, vec![])
            .await
            .unwrap();
        assert_eq!(receipt.chunk_count, 1);

        let hits = e
            .search(&RetrievalQuery::new("file ingestion").mode(SearchMode::Lexical))
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.source.get("source_path").unwrap(), path.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_compact_keeps_search_working() {
        let e = seeded().await;
        e.delete_document("bread");
        e.compact();
        let hits = e
            .search(&RetrievalQuery::new("borrow checker").mode(SearchMode::Lexical))
            .await
            .unwrap();
        assert_eq!(hits[0].id, "rust:0");
    }
}
