//! Canned providers for tests
//!
//! Kept in the library (not `#[cfg(test)]`) so downstream crates can use
//! them in their own test suites.

use async_trait::async_trait;
use parking_lot::Mutex;

use ragkit_core::traits::{GenerateRequest, GenerationProvider};
use ragkit_core::Error;

/// Generation provider that replays a fixed script of responses.
///
/// Responses are returned in order; once the script is exhausted the last
/// response repeats. An empty script fails every call.
pub struct StaticGenerator {
    script: Vec<String>,
    cursor: Mutex<usize>,
}

impl StaticGenerator {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            cursor: Mutex::new(0),
        }
    }

    /// Number of generate calls served so far
    pub fn calls(&self) -> usize {
        *self.cursor.lock()
    }
}

#[async_trait]
impl GenerationProvider for StaticGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> ragkit_core::Result<String> {
        let mut cursor = self.cursor.lock();
        let index = (*cursor).min(self.script.len().saturating_sub(1));
        *cursor += 1;

        self.script
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Provider("static generator has no responses".to_string()))
    }
}

/// Generation provider that fails every call. For exercising error paths.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> ragkit_core::Result<String> {
        Err(Error::Provider("simulated provider failure".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replays_in_order_then_repeats() {
        let gen = StaticGenerator::new(["first", "second"]);
        let req = GenerateRequest::new("q");
        assert_eq!(gen.generate(&req).await.unwrap(), "first");
        assert_eq!(gen.generate(&req).await.unwrap(), "second");
        assert_eq!(gen.generate(&req).await.unwrap(), "second");
        assert_eq!(gen.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_errors() {
        let gen = StaticGenerator::new(Vec::<String>::new());
        let req = GenerateRequest::new("q");
        assert!(gen.generate(&req).await.is_err());
    }
}
