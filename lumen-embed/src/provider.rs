//! The embedding provider boundary and shared helpers

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::fastembed_provider::FastEmbedProvider;
use crate::gemini::GeminiProvider;
use crate::hashing::HashingProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension shared by every embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first vector and every other vector must match
    /// it. An empty result has dimension 0.
    ///
    /// # Errors
    /// [`EmbedError::InconsistentDimensions`] when the vectors are ragged.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        if let Some((index, embedding)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != dimension)
        {
            return Err(EmbedError::InconsistentDimensions {
                index,
                expected: dimension,
                actual: embedding.len(),
            });
        }
        Ok(Self {
            embeddings,
            dimension,
        })
    }

    /// Like [`new`](Self::new), additionally checking that there is one vector per input.
    pub fn for_inputs(embeddings: Vec<Vec<f32>>, expected: usize) -> Result<Self> {
        if embeddings.len() != expected {
            return Err(EmbedError::ResponseLength {
                expected,
                actual: embeddings.len(),
            });
        }
        Self::new(embeddings)
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that turn text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order, all of the
/// same dimension. Failures surface as [`EmbedError`]; nothing is retried at this layer.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Generate the embedding for a single text, typically a search query
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or(EmbedError::ResponseLength {
                expected: 1,
                actual: 0,
            })
    }

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier this provider embeds with
    fn model_name(&self) -> &str;
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Build the provider selected by `config`.
///
/// Local models are loaded (and downloaded if necessary) before this returns; remote
/// providers only resolve their API key, so the first network call happens on use.
pub async fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    tracing::info!(
        "Creating {} embedding provider with model {}",
        config.provider.as_str(),
        config.model_name
    );

    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_env(config.clone())?),
        ProviderKind::FastEmbed => Arc::new(FastEmbedProvider::create(config.clone()).await?),
        ProviderKind::Hashing => Arc::new(HashingProvider::new(config.dimension)?),
    };
    Ok(provider)
}
