//! Generation provider seam.

use async_trait::async_trait;

use crate::error::Result;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 256,
            temperature: 0.7,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Prompt -> text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion. Implementations should return a usable (even
    /// degraded) string where possible; callers have no recovery path for a
    /// missing generation other than surfacing the error.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}
