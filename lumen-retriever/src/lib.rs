//! lumen-retriever: semantic retrieval over a paragraph corpus
//!
//! This crate turns a plain-text knowledge base into a persisted vector index and answers
//! top-k similarity queries against it, returning the matching passages as grounding
//! context for a language model.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: The [`Retriever`] lifecycle (load or build, rebuild, search)
//! - **[`index`]**: Exhaustive L2 nearest-neighbor index
//! - **[`storage`]**: On-disk artifact (`index.bin` + `chunks.txt`) with consistency checks
//! - **[`config`]**: Retriever settings, loadable from TOML
//! - **[`status`]**: Health reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumen_retriever::{Retriever, RetrieverConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RetrieverConfig::new("data/knowledge_base.txt").with_index_dir("index");
//! let retriever = Retriever::from_config(config).await?;
//!
//! retriever.initialize().await?;
//! let context = retriever.search("how do I reset my password", None).await?;
//! println!("{context}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! corpus → Chunker → EmbeddingProvider → FlatIndex → ArtifactStore
//!                                           ↓
//!                  query → EmbeddingProvider → top-k → passages
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod status;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{Result, RetrieverError};
pub use retrieval::{NO_RESULTS_MESSAGE, Phase, RetrievedPassage, Retriever};
pub use status::RetrieverStatus;
