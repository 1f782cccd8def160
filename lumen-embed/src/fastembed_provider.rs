//! Local ONNX embeddings through fastembed.
//!
//! Models are loaded once per process and shared between providers through a global
//! cache keyed by model name. Inference runs on tokio's blocking pool so that the async
//! runtime is never stalled by a forward pass.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn model_cache() -> MutexGuard<'static, HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Map a configured model name onto one of fastembed's built-in models.
pub fn resolve_model(model_name: &str) -> Result<EmbeddingModel> {
    match model_name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            Ok(EmbeddingModel::NomicEmbedTextV15)
        }
        other => Err(EmbedError::invalid_config(format!(
            "unsupported fastembed model '{other}'"
        ))),
    }
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Loads the configured model (downloading it on first use) and returns a ready provider.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let cache_key = config.model_name.to_ascii_lowercase();

        let cached = model_cache()
            .get(&cache_key)
            .map(|(model, dim)| (Arc::clone(model), *dim));
        if let Some((model, dimension)) = cached {
            tracing::info!("Using cached model for: {}", config.model_name);
            return Ok(Self {
                config,
                model,
                dimension,
            });
        }

        let embedding_model = resolve_model(&config.model_name)?;
        let model_name = config.model_name.clone();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model_name);

                let init_options =
                    InitOptions::new(embedding_model).with_show_download_progress(false);
                let mut model = TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;

                // Probe the output dimension
                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(EmbedError::model_init)?;
                let dimension = probe.first().map(|e| e.len()).unwrap_or(0);
                if dimension == 0 {
                    return Err(EmbedError::invalid_config(
                        "Model validation failed: empty embedding",
                    ));
                }

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model = Arc::new(Mutex::new(model));
        model_cache().insert(cache_key, (Arc::clone(&model), dimension));

        Ok(Self {
            config,
            model,
            dimension,
        })
    }

    /// Dimension of the vectors this model produces
    pub fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        model_cache().len()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return EmbeddingResult::new(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let chunk = chunk.to_vec();
            let model = Arc::clone(&self.model);

            let batch = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());
                let mut guard = model.lock().unwrap_or_else(PoisonError::into_inner);
                guard.embed(chunk, None).map_err(EmbedError::embedding_gen)
            })
            .await??;

            all_embeddings.extend(batch);
        }

        if self.config.normalize {
            for embedding in &mut all_embeddings {
                l2_normalize(embedding);
            }
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        EmbeddingResult::for_inputs(all_embeddings, texts.len())
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
