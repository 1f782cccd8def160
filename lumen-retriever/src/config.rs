//! Retriever configuration
//!
//! Settings come from three places, later ones winning: built-in defaults, an optional
//! TOML file, and command-line flags. API keys are never part of the configuration; the
//! embedding provider reads them from the environment.
//!
//! ```toml
//! corpus_path = "data/knowledge_base.txt"
//! index_dir = "index"
//! default_top_k = 2
//!
//! [embedding]
//! provider = "gemini"
//! model_name = "models/text-embedding-004"
//! ```

use crate::error::{Result, RetrieverError};
use crate::storage::file_store::{DEFAULT_CHUNKS_FILE, DEFAULT_INDEX_FILE};
use lumen_context::ParagraphChunker;
use lumen_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CORPUS_PATH: &str = "data/knowledge_base.txt";
pub const DEFAULT_INDEX_DIR: &str = "index";
pub const DEFAULT_TOP_K: usize = 2;

/// Configuration of a [`Retriever`](crate::retrieval::Retriever).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// UTF-8 corpus file the index is built from
    pub corpus_path: PathBuf,
    /// Directory holding the persisted artifact
    pub index_dir: PathBuf,
    /// File name of the index blob inside `index_dir`
    pub index_file: String,
    /// File name of the chunk list inside `index_dir`
    pub chunks_file: String,
    /// Number of passages returned when a search does not ask for a specific count
    pub default_top_k: usize,
    /// Build or load the index on the first search instead of failing with `IndexNotReady`
    pub lazy_initialize: bool,
    /// Subdivide paragraphs longer than this many characters
    pub max_chunk_chars: Option<usize>,
    /// Embedding provider settings
    pub embedding: EmbedConfig,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            chunks_file: DEFAULT_CHUNKS_FILE.to_string(),
            default_top_k: DEFAULT_TOP_K,
            lazy_initialize: true,
            max_chunk_chars: None,
            embedding: EmbedConfig::default(),
        }
    }
}

impl RetrieverConfig {
    /// Create a configuration for `corpus_path` with all other settings at their defaults.
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            ..Self::default()
        }
    }

    /// Read a TOML configuration file. Missing keys take their default values.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RetrieverError::config(e.to_string()))
    }

    /// Set the directory that holds the persisted artifact.
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = dir.into();
        self
    }

    /// Set the embedding provider configuration.
    pub fn with_embedding_config(mut self, config: EmbedConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the number of passages returned by default.
    pub fn with_default_top_k(mut self, k: usize) -> Self {
        self.default_top_k = k;
        self
    }

    /// Choose between lazy initialization on first search and explicit `initialize()`.
    pub fn with_lazy_initialize(mut self, lazy: bool) -> Self {
        self.lazy_initialize = lazy;
        self
    }

    /// Subdivide paragraphs longer than `max_chars` characters.
    pub fn with_max_chunk_chars(mut self, max_chars: usize) -> Self {
        self.max_chunk_chars = Some(max_chars);
        self
    }

    /// The chunker described by this configuration
    pub fn chunker(&self) -> ParagraphChunker {
        let chunker = ParagraphChunker::new();
        match self.max_chunk_chars {
            Some(limit) => chunker.with_max_chunk_chars(limit),
            None => chunker,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_top_k == 0 {
            return Err(RetrieverError::config("default_top_k must be greater than zero"));
        }
        if self.max_chunk_chars == Some(0) {
            return Err(RetrieverError::config("max_chunk_chars must be greater than zero"));
        }
        if self.index_file == self.chunks_file {
            return Err(RetrieverError::config(
                "index_file and chunks_file must be different files",
            ));
        }
        self.embedding
            .validate()
            .map_err(|e| RetrieverError::config(e.to_string()))
    }
}
