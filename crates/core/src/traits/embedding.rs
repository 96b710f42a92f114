//! Embedding provider seam.

use async_trait::async_trait;

use crate::error::Result;

/// Text -> fixed-dimension vector.
///
/// Implementations must produce stable enough output across calls on
/// identical input for encode-once caching to be meaningful; exact bitwise
/// determinism is not required.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a batch of texts. The output length must equal the input
    /// length and every vector must have `dimension()` components.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension of this provider instance.
    fn dimension(&self) -> usize;
}
