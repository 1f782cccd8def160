//! # lumen-embed
//!
//! The embedding gateway: one async trait, [`EmbeddingProvider`], that turns text into
//! fixed-dimension `f32` vectors, plus three implementations selected by [`EmbedConfig`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use lumen_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> lumen_embed::Result<()> {
//! // Reads the API key from GOOGLE_API_KEY
//! let provider = create_provider(&EmbedConfig::gemini()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - [`GeminiProvider`]: Google `text-embedding-004` and friends over HTTPS, batched
//! - [`FastEmbedProvider`]: local ONNX models, cached per process
//! - [`HashingProvider`]: deterministic feature hashing with no model at all
//!
//! Every provider returns one vector per input, in input order, all of one dimension.
//! Violations are reported as [`EmbedError::ResponseLength`] or
//! [`EmbedError::InconsistentDimensions`] rather than passed on. Nothing here retries.

pub mod config;
pub mod error;
pub mod fastembed_provider;
pub mod gemini;
pub mod hashing;
pub mod provider;

// Re-export main types for easy access
pub use config::{EmbedConfig, EmbedConfigBuilder, ProviderKind};
pub use error::{EmbedError, Result};
pub use fastembed_provider::FastEmbedProvider;
pub use gemini::{GeminiProvider, TaskType};
pub use hashing::HashingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, create_provider, l2_normalize};
