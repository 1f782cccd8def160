//! Deterministic offline embeddings by token feature hashing.
//!
//! Every lowercase alphanumeric token is hashed with FNV-1a into one of `dimension`
//! buckets; a second hash bit picks the sign so collisions tend to cancel rather than
//! accumulate. The result is L2-normalized. Texts sharing vocabulary land close together,
//! which is enough for tests, demos and air-gapped deployments.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Embedding provider that needs neither a model nor the network.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
    model_name: String,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing dimension must be greater than zero",
            ));
        }
        Ok(Self {
            dimension,
            model_name: format!("fnv-hashing-{dimension}"),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        EmbeddingResult::new(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
