//! Error taxonomy for the retrieval engine.
//!
//! Four classes with distinct propagation rules:
//! - `Validation`: rejected before any index access.
//! - `Provider`: an external embedding/generation call failed or timed out;
//!   surfaced to the caller of the step that needed it.
//! - `Parse`: recoverable parsing of model output. Call sites are expected to
//!   absorb this class and substitute a documented default; it exists so the
//!   substitution can be logged with a cause.
//! - `IndexInconsistency`: corrupt derived index state. The chunk store is
//!   authoritative and can regenerate any derived index, so recovery is a
//!   full rebuild.

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Index inconsistency: {0}")]
    IndexInconsistency(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures of an external provider call (including timeouts).
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Provider(_))
    }
}
