//! Runtime settings
//!
//! Layered configuration in the usual order: compiled defaults, then an
//! optional TOML file, then `RAGKIT__`-prefixed environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{chunking, fusion, mmr, refine, timeouts};
use crate::ConfigError;

/// Top-level application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Document chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and fusion
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Context selection (MMR)
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Multi-query refinement
    #[serde(default)]
    pub refine: RefineConfig,

    /// Optional cross-encoder style reranking
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Model provider endpoints
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Chunking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chars: usize,

    /// Overlap carried between consecutive chunks
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chunk_chars() -> usize {
    chunking::MAX_CHUNK_CHARS
}

fn default_overlap_chars() -> usize {
    chunking::OVERLAP_CHARS
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not specify top_k
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Semantic weight for hybrid alpha-blend scoring
    #[serde(default = "default_alpha")]
    pub default_alpha: f32,

    /// Candidates fetched per ranker before fusion
    #[serde(default = "default_candidate_floor")]
    pub candidate_floor: usize,
}

fn default_top_k() -> usize {
    6
}

fn default_alpha() -> f32 {
    fusion::DEFAULT_ALPHA
}

fn default_candidate_floor() -> usize {
    fusion::CANDIDATE_FLOOR
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_alpha: default_alpha(),
            candidate_floor: default_candidate_floor(),
        }
    }
}

/// MMR context selection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Relevance/diversity trade-off, 1.0 is pure relevance
    #[serde(default = "default_lambda")]
    pub mmr_lambda: f32,

    /// Maximum passages packed into a generation context
    #[serde(default = "default_max_passages")]
    pub max_context_passages: usize,
}

fn default_lambda() -> f32 {
    mmr::DEFAULT_LAMBDA
}

fn default_max_passages() -> usize {
    mmr::MAX_CONTEXT_PASSAGES
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mmr_lambda: default_lambda(),
            max_context_passages: default_max_passages(),
        }
    }
}

/// Multi-query refinement parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Sub-queries sent to retrieval, original question included
    #[serde(default = "default_rewrite_count")]
    pub rewrite_count: usize,

    /// Answer samples drawn for self-consistency voting
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

fn default_rewrite_count() -> usize {
    refine::REWRITE_COUNT
}

fn default_sample_count() -> usize {
    refine::SAMPLE_COUNT
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            rewrite_count: default_rewrite_count(),
            sample_count: default_sample_count(),
        }
    }
}

/// Reranking parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RerankConfig {
    /// Score retrieved candidates with the generation provider before
    /// context selection. Off by default: it adds one provider round-trip
    /// per candidate.
    #[serde(default)]
    pub enabled: bool,
}

/// Provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, if the endpoint requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat completion model name
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embedding model name
    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Embedding call timeout in milliseconds
    #[serde(default = "default_embed_timeout")]
    pub embed_timeout_ms: u64,

    /// Generation call timeout in milliseconds
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/v1".to_string()
}

fn default_chat_model() -> String {
    "qwen2.5-7b-instruct".to_string()
}

fn default_embed_model() -> String {
    "bge-small-en-v1.5".to_string()
}

fn default_embed_timeout() -> u64 {
    timeouts::EMBED_MS
}

fn default_generate_timeout() -> u64 {
    timeouts::GENERATE_MS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            embed_model: default_embed_model(),
            embed_timeout_ms: default_embed_timeout(),
            generate_timeout_ms: default_generate_timeout(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_chunking()?;
        self.validate_retrieval()?;
        self.validate_selection()?;
        self.validate_refine()?;
        self.validate_provider()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        if self.chunking.max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunking.max_chars".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(ConfigError::InvalidValue {
                field: "chunking.overlap_chars".to_string(),
                message: format!(
                    "Must be smaller than max_chars ({})",
                    self.chunking.max_chars
                ),
            });
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        if self.retrieval.default_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.default_top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.retrieval.default_alpha) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.default_alpha".to_string(),
                message: format!(
                    "Must be between 0.0 and 1.0, got {}",
                    self.retrieval.default_alpha
                ),
            });
        }

        if self.retrieval.candidate_floor < self.retrieval.default_top_k {
            tracing::warn!(
                "retrieval.candidate_floor ({}) is smaller than default_top_k ({}), \
                 fusion will see fewer candidates than requested results",
                self.retrieval.candidate_floor,
                self.retrieval.default_top_k
            );
        }

        Ok(())
    }

    fn validate_selection(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.selection.mmr_lambda) {
            return Err(ConfigError::InvalidValue {
                field: "selection.mmr_lambda".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.selection.mmr_lambda),
            });
        }

        if self.selection.max_context_passages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "selection.max_context_passages".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_refine(&self) -> Result<(), ConfigError> {
        if self.refine.rewrite_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refine.rewrite_count".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.refine.sample_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refine.sample_count".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.refine.sample_count > crate::constants::refine::TEMPERATURES.len() {
            return Err(ConfigError::InvalidValue {
                field: "refine.sample_count".to_string(),
                message: format!(
                    "At most {} samples are supported",
                    crate::constants::refine::TEMPERATURES.len()
                ),
            });
        }

        Ok(())
    }

    fn validate_provider(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.is_empty() {
            return Err(ConfigError::MissingField("provider.base_url".to_string()));
        }

        if self.provider.embed_timeout_ms == 0 || self.provider.generate_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provider.*_timeout_ms".to_string(),
                message: "Timeouts must be at least 1ms".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`RAGKIT__` prefix, `__` separator)
/// 2. The TOML file at `path`, if given
/// 3. Compiled defaults
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(file) = path {
        builder = builder.add_source(File::with_name(file).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("RAGKIT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // try_deserialize leaves unset sections to serde defaults
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.chunking.max_chars, 700);
        assert_eq!(settings.retrieval.candidate_floor, 20);
        assert!(!settings.rerank.enabled);
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.default_alpha = 1.5;
        assert!(settings.validate().is_err());

        settings.retrieval.default_alpha = 0.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let mut settings = Settings::default();
        settings.chunking.overlap_chars = settings.chunking.max_chars;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sample_count_bounded_by_temperature_schedule() {
        let mut settings = Settings::default();
        settings.refine.sample_count = 4;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragkit.toml");
        std::fs::write(
            &path,
            "[retrieval]\ndefault_top_k = 10\n\n[rerank]\nenabled = true\n",
        )
        .unwrap();

        let settings = load_settings(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.retrieval.default_top_k, 10);
        assert!(settings.rerank.enabled);
        // Untouched sections keep their defaults
        assert_eq!(settings.chunking.max_chars, 700);
    }
}
