//! Text embedding via an OpenAI-compatible `/embeddings` endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use vidrec_core::{retry_engine, EngineError, Result, RetryPolicy, SemanticConfig};

/// Pre-trained text-to-vector model
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Model identifier; persisted indexes are only reused for the same model
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// One vector per input text, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EngineError::Embedding("empty embedding response".into()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// HTTP embedding client
#[derive(Clone)]
pub struct EmbeddingClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(config: &SemanticConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EngineError::Embedding(format!("failed to create HTTP client: {}", e)))?;

        info!(
            model = %config.model,
            dimension = config.dimension,
            batch_size = config.batch_size,
            "Initialized embedding client"
        );

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(model = %self.model, count = texts.len(), "Calling embedding API");

        let mut request = self.http_client.post(&self.api_url).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EngineError::Embedding(format!(
                "embedding API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Embedding(format!("invalid response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(EngineError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index);

        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.dimension) {
            return Err(EngineError::Embedding(format!(
                "expected dimension {}, got {}",
                self.dimension,
                bad.embedding.len()
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let embedded = retry_engine(|| self.call_api(chunk), self.retry.clone()).await?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let texts = vec!["query1".to_string(), "query2".to_string()];
        let request = EmbeddingRequest {
            input: &texts,
            model: "all-MiniLM-L6-v2",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "all-MiniLM-L6-v2");
        assert_eq!(json["input"][1], "query2");
    }

    #[test]
    fn test_client_takes_settings_from_config() {
        let config = SemanticConfig {
            dimension: 8,
            batch_size: 0,
            ..SemanticConfig::default()
        };
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.dimension(), 8);
        assert_eq!(client.model_name(), "all-MiniLM-L6-v2");
        assert_eq!(client.batch_size, 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let client = EmbeddingClient::new(&SemanticConfig::default()).unwrap();
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
