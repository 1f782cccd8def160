//! Health reporting for a running retriever

use crate::retrieval::Phase;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Point-in-time view of a retriever, suitable for health endpoints and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverStatus {
    pub phase: Phase,
    /// Number of chunks in the published index (0 before the first build)
    pub chunk_count: usize,
    /// Embedding dimension of the published index
    pub dimension: Option<usize>,
    pub corpus_path: PathBuf,
    pub artifact_dir: String,
    pub provider: String,
    pub model: String,
}

impl RetrieverStatus {
    /// Whether searches can be answered without building first
    pub fn is_ready(&self) -> bool {
        self.phase != Phase::Uninitialized
    }
}

impl std::fmt::Display for RetrieverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Phase:        {}", self.phase)?;
        writeln!(f, "Ready:        {}", if self.is_ready() { "yes" } else { "no" })?;
        writeln!(f, "Chunks:       {}", self.chunk_count)?;
        match self.dimension {
            Some(dimension) => writeln!(f, "Dimension:    {dimension}")?,
            None => writeln!(f, "Dimension:    -")?,
        }
        writeln!(f, "Corpus:       {}", self.corpus_path.display())?;
        writeln!(f, "Artifact dir: {}", self.artifact_dir)?;
        write!(f, "Embeddings:   {} ({})", self.provider, self.model)
    }
}
