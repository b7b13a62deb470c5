//! Embedding generation
//!
//! The clustering core never computes embeddings itself; it asks an
//! `EmbeddingProvider` for one vector per article. A `None` answer means the
//! provider had nothing for this text and the article is retried next cycle.

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedding provider based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Arc::new(embedder))
}
