
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, EmbeddingProviderKind};
use crate::embeddings::hashing::HashingEmbedder;
use crate::embeddings::ollama::OllamaClient;
use crate::{RagError, Result};

/// Converts text into fixed-dimension vectors.
///
/// Implementations return exactly one vector per input, in input order, and every
/// vector has [`Embedder::dimension`] components. Any failure to do so is reported
/// as [`RagError::EmbeddingUnavailable`] rather than yielding partial output.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::EmbeddingUnavailable("no embedding returned for query text".to_string())
        })
    }
}

/// Build the embedder selected in the configuration
#[inline]
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let dimension = config.embeddings.dimension as usize;
    match config.embeddings.provider {
        EmbeddingProviderKind::Ollama => {
            let client = OllamaClient::new(config)
                .map_err(|e| RagError::Config(format!("Invalid Ollama settings: {:#}", e)))?;
            Ok(Arc::new(client))
        }
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(dimension))),
    }
}

/// Check a provider response against the request before handing it to callers
pub(crate) fn verify_embeddings(
    expected_count: usize,
    dimension: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(RagError::EmbeddingUnavailable(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected_count,
            vectors.len()
        )));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RagError::EmbeddingUnavailable(format!(
            "Embedding has {} dimensions, expected {}",
            bad.len(),
            dimension
        )));
    }

    Ok(())
}
