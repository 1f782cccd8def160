//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default remote embedding model.
pub const DEFAULT_GEMINI_MODEL: &str = "models/text-embedding-004";
/// Default local ONNX model served through fastembed.
pub const DEFAULT_FASTEMBED_MODEL: &str = "all-minilm-l6-v2";
/// Default Generative Language API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Environment variable consulted for the Gemini API key.
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
/// `batchEmbedContents` accepts at most this many requests per call.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Bucket count of the hashing provider.
pub const DEFAULT_HASHING_DIMENSION: usize = 256;
/// HTTP timeout for remote providers.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Generative Language API (`batchEmbedContents`)
    #[default]
    Gemini,
    /// Local ONNX model through fastembed
    FastEmbed,
    /// Deterministic token hashing, no model and no network
    Hashing,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::FastEmbed => "fastembed",
            ProviderKind::Hashing => "hashing",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "fastembed" => Ok(ProviderKind::FastEmbed),
            "hashing" => Ok(ProviderKind::Hashing),
            other => Err(EmbedError::invalid_config(format!(
                "unknown embedding provider '{other}' (expected gemini, fastembed or hashing)"
            ))),
        }
    }
}

/// Configuration for an embedding provider.
///
/// Credentials are never stored here: remote providers read their API key from the
/// environment variable named by `api_key_env` when they are created.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend that produces the vectors
    #[builder(default)]
    pub provider: ProviderKind,
    /// Model identifier understood by the backend
    #[builder(default = "DEFAULT_GEMINI_MODEL.to_string()")]
    pub model_name: String,
    /// Maximum number of texts sent to the backend in one call
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
    /// Whether to L2-normalize vectors returned by the backend
    #[builder(default = "false")]
    pub normalize: bool,
    /// Environment variable holding the API key (remote providers)
    #[builder(default = "DEFAULT_API_KEY_ENV.to_string()")]
    pub api_key_env: String,
    /// Endpoint base URL (remote providers)
    #[builder(default = "DEFAULT_GEMINI_BASE_URL.to_string()")]
    pub base_url: String,
    /// Output dimension (hashing provider only)
    #[builder(default = "DEFAULT_HASHING_DIMENSION")]
    pub dimension: usize,
    /// Per-request HTTP timeout in seconds (remote providers)
    #[builder(default = "DEFAULT_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::gemini()
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Gemini `text-embedding-004`, the model the knowledge base is built with by default
    pub fn gemini() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model_name: DEFAULT_GEMINI_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            normalize: false,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            dimension: DEFAULT_HASHING_DIMENSION,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// A local fastembed model
    pub fn fastembed(model_name: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::FastEmbed,
            model_name: model_name.into(),
            batch_size: 16,
            normalize: true,
            ..Self::gemini()
        }
    }

    /// The offline hashing provider with the given output dimension
    pub fn hashing(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hashing,
            model_name: format!("fnv-hashing-{dimension}"),
            dimension,
            normalize: true,
            ..Self::gemini()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model identifier (builder style)
    pub fn with_model<S: Into<String>>(self, model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            ..self
        }
    }

    /// Point a remote provider at a different endpoint (builder style)
    pub fn with_base_url<S: Into<String>>(self, base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Check the settings that every provider relies on
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be greater than zero"));
        }
        match self.provider {
            ProviderKind::Hashing if self.dimension == 0 => Err(EmbedError::invalid_config(
                "dimension must be greater than zero",
            )),
            ProviderKind::Gemini if self.api_key_env.trim().is_empty() => Err(
                EmbedError::invalid_config("api_key_env must name an environment variable"),
            ),
            _ => Ok(()),
        }
    }
}
