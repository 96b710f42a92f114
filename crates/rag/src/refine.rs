//! Multi-query refinement orchestrator ("RAG+")
//!
//! A strictly sequential pipeline per call, stateless between calls:
//! rewrite the question into sub-queries, retrieve for each concurrently,
//! RRF-fuse, MMR-compress into a numbered context, sample several answers
//! concurrently, vote, then score faithfulness. The two fan-outs (per-query
//! retrieval, self-consistency sampling) run via `join_all` with the fuse
//! and vote steps as barriers.

use std::sync::Arc;

use futures::future::join_all;

use ragkit_config::constants::fusion::DEFAULT_ALPHA;
use ragkit_config::constants::mmr::MAX_CONTEXT_PASSAGES;
use ragkit_config::constants::refine::{MAX_QUERY_CHARS, REWRITE_COUNT, SAMPLE_COUNT, TEMPERATURES};
use ragkit_config::Settings;
use ragkit_core::{
    ChunkMetadata, EmbeddingProvider, Error, GenerateRequest, GenerationProvider, Result,
    RetrievalBackend, RetrievalQuery, SearchMode,
};

use crate::fusion::rrf_fuse;
use crate::mmr::compress_context;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct RagPlusConfig {
    /// Per-sub-query retrieval depth
    pub top_k: usize,
    pub mode: SearchMode,
    /// Semantic weight carried on each sub-query
    pub alpha: f32,
    /// Sub-queries sent to retrieval, original question included
    pub rewrite_count: usize,
    /// Answer samples drawn for voting
    pub sample_count: usize,
    /// MMR relevance/diversity trade-off
    pub mmr_lambda: Option<f32>,
    /// Upper bound on passages packed into the generation context
    pub max_context_passages: usize,
}

impl Default for RagPlusConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            mode: SearchMode::Hybrid,
            alpha: DEFAULT_ALPHA,
            rewrite_count: REWRITE_COUNT,
            sample_count: SAMPLE_COUNT,
            mmr_lambda: None,
            max_context_passages: MAX_CONTEXT_PASSAGES,
        }
    }
}

impl RagPlusConfig {
    /// Map loaded settings onto the orchestrator knobs.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.retrieval.default_top_k,
            mode: SearchMode::Hybrid,
            alpha: settings.retrieval.default_alpha,
            rewrite_count: settings.refine.rewrite_count,
            sample_count: settings.refine.sample_count,
            mmr_lambda: Some(settings.selection.mmr_lambda),
            max_context_passages: settings.selection.max_context_passages,
        }
    }
}

/// Verified answer with its full audit trail.
#[derive(Debug, Clone)]
pub struct RefinedAnswer {
    pub answer: String,
    /// Always in [0, 1]; 0.0 when the check could not be scored
    pub faithfulness: f32,
    /// Sub-queries actually used, original question first
    pub queries: Vec<String>,
    /// Numbered citation context fed to generation
    pub context: String,
    /// Metadata of the passages selected into the context
    pub context_meta: Vec<ChunkMetadata>,
    /// Metadata of the full fused candidate pool
    pub retrieved_meta: Vec<ChunkMetadata>,
    /// All raw candidate answers, in temperature order
    pub samples: Vec<String>,
}

/// Multi-query refinement over any retrieval backend.
pub struct RagPlus {
    backend: Arc<dyn RetrievalBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    config: RagPlusConfig,
}

impl RagPlus {
    pub fn new(
        backend: Arc<dyn RetrievalBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        config: RagPlusConfig,
    ) -> Self {
        Self {
            backend,
            embedder,
            generator,
            config,
        }
    }

    /// Rewrite the question into up to N diverse short queries. The
    /// original question is always the first entry; rewrites are
    /// deduplicated case-insensitively and capped at 128 characters. A
    /// rewrite provider failure aborts the run.
    async fn rewrite_queries(&self, question: &str) -> Result<Vec<String>> {
        let n = self.config.rewrite_count;
        let prompt = format!(
            "Rewrite the user's question into {n} diverse, short search queries.\n\
             Be specific but concise. Output one per line, no numbering.\n\n\
             User question: {question}\nQueries:"
        );
        let request = GenerateRequest::new(prompt)
            .max_tokens(120)
            .temperature(0.8);
        let output = self.generator.generate(&request).await?;

        let mut queries: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let push = |raw: &str, queries: &mut Vec<String>, seen: &mut Vec<String>| {
            let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || "-•*".contains(c));
            if trimmed.is_empty() {
                return;
            }
            let capped: String = trimmed.chars().take(MAX_QUERY_CHARS).collect();
            let key = capped.to_lowercase();
            if !seen.contains(&key) {
                seen.push(key);
                queries.push(capped);
            }
        };

        // seed with the original so it survives dedup and truncation
        push(question, &mut queries, &mut seen);
        for line in output.lines() {
            push(line, &mut queries, &mut seen);
        }
        queries.truncate(n);
        tracing::debug!(count = queries.len(), "query rewrites ready");
        Ok(queries)
    }

    /// Per-query retrieval fan-out. A failing sub-query is logged and
    /// dropped; its results are simply absent from fusion input.
    async fn retrieve_all(&self, queries: &[String]) -> Vec<Vec<ragkit_core::RetrievalHit>> {
        let futures = queries.iter().map(|q| {
            let query = RetrievalQuery::new(q.clone())
                .top_k(self.config.top_k)
                .mode(self.config.mode)
                .alpha(self.config.alpha);
            async move { (q.clone(), self.backend.search(&query).await) }
        });

        join_all(futures)
            .await
            .into_iter()
            .filter_map(|(q, result)| match result {
                Ok(hits) => Some(hits),
                Err(e) => {
                    tracing::warn!(query = %q, error = %e, "sub-query retrieval failed, dropping");
                    None
                }
            })
            .collect()
    }

    async fn sample_answers(&self, question: &str, context: &str) -> Result<Vec<String>> {
        let system = "Answer precisely using the numbered context. Add [#] after facts.";
        let prompt = format!("Context:\n{context}\n\nQuestion: {question}\nAnswer:");

        let temps = &TEMPERATURES[..self.config.sample_count.min(TEMPERATURES.len())];
        let futures = temps.iter().map(|&t| {
            let request = GenerateRequest::new(prompt.clone())
                .system(system)
                .max_tokens(520)
                .temperature(t);
            async move { self.generator.generate(&request).await }
        });

        join_all(futures).await.into_iter().collect()
    }

    /// Score how well the answer is supported by the context, in [0, 1].
    /// The first whitespace token of the response is parsed as a float;
    /// parse failures, NaN, out-of-range values, and provider errors all
    /// yield exactly 0.0. This step never fails the pipeline.
    async fn faithfulness(&self, question: &str, context: &str, answer: &str) -> f32 {
        let prompt = format!(
            "You are a strict fact-checker. Score how well the answer is supported by the numbered context.\n\
             Return only a number between 0 and 1 (e.g., 0.75).\n\n\
             Context:\n{context}\n\nQuestion: {question}\nAnswer:\n{answer}\n\nScore:"
        );
        let request = GenerateRequest::new(prompt).max_tokens(8).temperature(0.0);

        let raw = match self.generator.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "faithfulness check unavailable, scoring 0.0");
                return 0.0;
            }
        };

        match raw.split_whitespace().next().and_then(|t| t.parse::<f32>().ok()) {
            Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => v,
            _ => {
                tracing::debug!(raw = %crate::text::take_head(&raw, 40), "unparseable faithfulness score");
                0.0
            }
        }
    }

    /// Run the full pipeline for one question.
    pub async fn answer(&self, question: &str) -> Result<RefinedAnswer> {
        if question.trim().is_empty() {
            return Err(Error::Validation("question is empty".to_string()));
        }

        // 1) multi-query rewrite (failure aborts)
        let queries = self.rewrite_queries(question).await?;

        // 2) per-query retrieval, 3) RRF fuse
        let per_query = self.retrieve_all(&queries).await;
        let fused = rrf_fuse(&per_query, self.config.top_k * 2);
        let retrieved_meta: Vec<ChunkMetadata> = fused.iter().map(|h| h.metadata.clone()).collect();

        // 4) MMR compression into a numbered context
        let (context, context_meta) = if fused.is_empty() {
            (String::new(), Vec::new())
        } else {
            let texts: Vec<String> = fused.iter().map(|h| h.content.clone()).collect();
            let metas: Vec<ChunkMetadata> = fused.iter().map(|h| h.metadata.clone()).collect();

            let mut inputs = texts.clone();
            inputs.push(question.to_string());
            let mut vectors = self.embedder.encode(&inputs).await?;
            let query_vec = vectors.pop().unwrap_or_default();

            let out_k = self.config.max_context_passages.min(self.config.top_k);
            let selected = compress_context(
                &query_vec,
                &texts,
                &metas,
                &vectors,
                out_k,
                self.config.mmr_lambda,
            );
            (selected.context, selected.metadata)
        };

        // 5) self-consistency sampling, 6) majority vote
        let samples = self.sample_answers(question, &context).await?;
        let answer = crate::text::majority_vote(&samples);

        // 7) faithfulness check (never fails)
        let faithfulness = self.faithfulness(question, &context, &answer).await;

        Ok(RefinedAnswer {
            answer,
            faithfulness,
            queries,
            context,
            context_meta,
            retrieved_meta,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RagEngine, RagEngineConfig};
    use ragkit_providers::testing::StaticGenerator;
    use ragkit_providers::HashingEmbedder;

    async fn seeded_backend() -> Arc<RagEngine> {
        let engine = RagEngine::new(
            Arc::new(HashingEmbedder::default()),
            RagEngineConfig::default(),
        );
        engine
            .ingest(
                "Reciprocal rank fusion merges ranked lists by summing reciprocal ranks.",
                Some("fusion".to_string()),
                None,
                vec![],
            )
            .await
            .unwrap();
        engine
            .ingest(
                "Sourdough bread rises slowly during long fermentation.",
                Some("bread".to_string()),
                None,
                vec![],
            )
            .await
            .unwrap();
        Arc::new(engine)
    }

    async fn rag_plus(generator: StaticGenerator) -> RagPlus {
        RagPlus::new(
            seeded_backend().await,
            Arc::new(HashingEmbedder::default()),
            Arc::new(generator),
            RagPlusConfig::default(),
        )
    }

    /// Script order: 1 rewrite call, then sample_count answers, then the
    /// faithfulness scorer.
    fn scripted(answers: &[&str], faith: &str) -> StaticGenerator {
        let mut script = vec!["how does rank fusion work\nwhat is rrf".to_string()];
        script.extend(answers.iter().map(|s| s.to_string()));
        script.push(faith.to_string());
        StaticGenerator::new(script)
    }

    #[test]
    fn test_config_maps_settings_overrides() {
        let mut settings = Settings::default();
        settings.retrieval.default_top_k = 4;
        settings.retrieval.default_alpha = 0.3;
        settings.refine.rewrite_count = 2;
        settings.refine.sample_count = 1;
        settings.selection.mmr_lambda = 0.9;
        settings.selection.max_context_passages = 5;

        let config = RagPlusConfig::from_settings(&settings);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.rewrite_count, 2);
        assert_eq!(config.sample_count, 1);
        assert_eq!(config.mmr_lambda, Some(0.9));
        assert_eq!(config.max_context_passages, 5);
    }

    #[tokio::test]
    async fn test_answer_pipeline_end_to_end() {
        let plus = rag_plus(scripted(
            &[
                "RRF sums reciprocal ranks [1]",
                "RRF sums reciprocal ranks across lists [1]",
                "it is about bread",
            ],
            "0.8",
        ))
        .await;

        let out = plus.answer("how does reciprocal rank fusion work?").await.unwrap();

        // original question first, rewrites follow, capped at N
        assert_eq!(out.queries[0], "how does reciprocal rank fusion work?");
        assert!(out.queries.len() <= REWRITE_COUNT);

        // consensus answer wins the vote
        assert!(out.answer.contains("reciprocal ranks"));
        assert_eq!(out.samples.len(), SAMPLE_COUNT);

        // faithfulness parsed from the scripted response
        assert!((out.faithfulness - 0.8).abs() < 1e-6);

        // context is a numbered citation block over retrieved passages
        assert!(out.context.starts_with("[1] "));
        assert!(!out.context_meta.is_empty());
        assert!(!out.retrieved_meta.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let plus = rag_plus(scripted(&["a", "a", "a"], "1.0")).await;
        assert!(plus.answer("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_rewrite_failure_aborts_run() {
        let plus = RagPlus::new(
            seeded_backend().await,
            Arc::new(HashingEmbedder::default()),
            Arc::new(ragkit_providers::testing::FailingGenerator),
            RagPlusConfig::default(),
        );
        let err = plus.answer("question").await.unwrap_err();
        assert!(err.is_provider());
    }

    #[tokio::test]
    async fn test_non_numeric_faithfulness_is_zero() {
        let plus = rag_plus(scripted(&["same answer", "same answer", "same answer"], "definitely supported")).await;
        let out = plus.answer("how does rank fusion work?").await.unwrap();
        assert_eq!(out.faithfulness, 0.0);
    }

    #[tokio::test]
    async fn test_out_of_range_faithfulness_is_zero() {
        let plus = rag_plus(scripted(&["a", "a", "a"], "1.7")).await;
        let out = plus.answer("rank fusion?").await.unwrap();
        assert_eq!(out.faithfulness, 0.0);
    }

    #[tokio::test]
    async fn test_rewrites_deduped_case_insensitively_and_capped() {
        let long = "x".repeat(300);
        let generator = StaticGenerator::new([
            format!("Rank Fusion\nrank fusion\n{long}"),
            "a".to_string(),
            "a".to_string(),
            "a".to_string(),
            "0.5".to_string(),
        ]);
        let plus = rag_plus(generator).await;
        let out = plus.answer("rank fusion").await.unwrap();

        // "rank fusion" duplicates the original question (case-insensitive)
        assert_eq!(out.queries[0], "rank fusion");
        assert!(out.queries.iter().skip(1).all(|q| q.to_lowercase() != "rank fusion"));
        assert!(out.queries.iter().all(|q| q.chars().count() <= MAX_QUERY_CHARS));
        assert!(out.queries.len() <= REWRITE_COUNT);
    }
}
