use super::EmbeddingProvider;
use crate::backend::{BackendClient, BackendKind};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::ratelimit::CallRateLimiter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedding provider served over HTTP (`POST /v1/embed/text`)
pub struct HttpEmbedder {
    client: BackendClient,
    limiter: CallRateLimiter,
    model_id: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = BackendClient::new(
            BackendKind::Embedding,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            limiter: CallRateLimiter::per_second("embedding", config.requests_per_second),
            model_id: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn validate_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model_id,
                self.dimension,
                embedding.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        self.limiter.wait().await;
        let request = EmbedTextRequest {
            model: &self.model_id,
            inputs: vec![text],
        };
        let response: EmbeddingResponse = self.client.post_json("/v1/embed/text", &request).await?;

        match response.into_embeddings().into_iter().next() {
            Some(embedding) if !embedding.is_empty() => {
                self.validate_dimension(&embedding)?;
                Ok(Some(embedding))
            }
            _ => Ok(None),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
