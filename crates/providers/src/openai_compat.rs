//! OpenAI-compatible HTTP client
//!
//! One client serving both provider traits: `/chat/completions` for
//! generation and `/embeddings` for encoding. Works against vLLM,
//! llama.cpp server, TGI in openai mode, and the hosted APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use ragkit_core::traits::{EmbeddingProvider, GenerateRequest, GenerationProvider};
use ragkit_config::ProviderConfig;

use crate::ProviderError;

/// Client configuration
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base URL, e.g. `http://127.0.0.1:8000/v1`
    pub base_url: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Chat completion model
    pub chat_model: String,
    /// Embedding model
    pub embed_model: String,
    /// Dimension reported by the embedding model
    pub embed_dimension: usize,
    /// Embedding call timeout
    pub embed_timeout: Duration,
    /// Generation call timeout
    pub generate_timeout: Duration,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff, doubles each retry
    pub initial_backoff: Duration,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            api_key: None,
            chat_model: "qwen2.5-7b-instruct".to_string(),
            embed_model: "bge-small-en-v1.5".to_string(),
            embed_dimension: 384,
            embed_timeout: Duration::from_secs(30),
            generate_timeout: Duration::from_secs(60),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl OpenAiCompatConfig {
    /// Build a config from loaded settings
    pub fn from_settings(provider: &ProviderConfig) -> Self {
        Self {
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            chat_model: provider.chat_model.clone(),
            embed_model: provider.embed_model.clone(),
            embed_timeout: Duration::from_millis(provider.embed_timeout_ms),
            generate_timeout: Duration::from_millis(provider.generate_timeout_ms),
            ..Default::default()
        }
    }
}

/// HTTP client for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    /// Create a new client
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, ProviderError> {
        if config.base_url.is_empty() {
            return Err(ProviderError::Configuration(
                "base_url must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn is_retryable(error: &ProviderError) -> bool {
        matches!(error, ProviderError::Network(_) | ProviderError::Timeout(_))
    }

    /// POST with a per-call deadline and exponential-backoff retries
    async fn post_json<Req, Resp>(
        &self,
        url: &str,
        body: &Req,
        deadline: Duration,
    ) -> Result<Resp, ProviderError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    url,
                    attempt,
                    max = self.config.max_retries,
                    "provider request failed, retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_once(url, body, deadline).await {
                Ok(resp) => return Ok(resp),
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::Network("max retries exceeded".to_string())))
    }

    async fn execute_once<Req, Resp>(
        &self,
        url: &str,
        body: &Req,
        deadline: Duration,
    ) -> Result<Resp, ProviderError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let send = async {
            let response = self.request(url).json(body).send().await?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                // 5xx is transient, 4xx is not
                if status.is_server_error() {
                    return Err(ProviderError::Network(format!("HTTP {}: {}", status, text)));
                }
                return Err(ProviderError::Api(format!("HTTP {}: {}", status, text)));
            }

            response
                .json::<Resp>()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
        };

        tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| ProviderError::Timeout(deadline.as_millis() as u64))?
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatClient {
    async fn generate(&self, request: &GenerateRequest) -> ragkit_core::Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let body = ChatRequest {
            model: self.config.chat_model.clone(),
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            stream: false,
        };

        let response: ChatResponse = self
            .post_json(&self.url("/chat/completions"), &body, self.config.generate_timeout)
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

        Ok(choice.message.content)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatClient {
    async fn encode(&self, texts: &[String]) -> ragkit_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response: EmbeddingResponse = self
            .post_json(&self.url("/embeddings"), &body, self.config.embed_timeout)
            .await?;

        if response.data.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                response.data.len()
            ))
            .into());
        }

        // The API does not guarantee input order; sort by index
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_trims_trailing_slash() {
        let config = OpenAiCompatConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenAiCompatClient::new(config).unwrap();
        assert_eq!(
            client.url("/chat/completions"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = OpenAiCompatConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(OpenAiCompatClient::new(config).is_err());
    }

    #[test]
    fn test_chat_request_serialization() {
        let body = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            max_tokens: Some(64),
            temperature: Some(0.2),
            stream: false,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"max_tokens\":64"));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_embedding_response_reordered_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[2.0]},
            {"index":0,"embedding":[1.0]}
        ]}"#;
        let mut resp: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        resp.data.sort_by_key(|d| d.index);
        assert_eq!(resp.data[0].embedding, vec![1.0]);
        assert_eq!(resp.data[1].embedding, vec![2.0]);
    }

    #[test]
    fn test_from_settings_carries_timeouts() {
        let mut provider = ProviderConfig::default();
        provider.embed_timeout_ms = 1234;
        let config = OpenAiCompatConfig::from_settings(&provider);
        assert_eq!(config.embed_timeout, Duration::from_millis(1234));
    }
}
