//! Error type shared by the index, the artifact store and the retriever

use lumen_embed::EmbedError;
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Errors surfaced by retrieval operations.
///
/// The type is `Clone` so that every caller waiting on one shared index build receives the
/// same outcome; non-cloneable sources are held behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrieverError {
    /// The corpus yielded no non-empty chunk
    #[error("Corpus {} contains no non-empty chunks", path.display())]
    EmptyCorpus { path: PathBuf },

    /// The corpus file is missing or unreadable
    #[error("Corpus {} is unavailable: {source}", path.display())]
    CorpusUnavailable {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The embedding provider failed
    #[error("Embedding provider failed: {0}")]
    Provider(#[source] Arc<EmbedError>),

    /// A vector does not have the index dimension
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An index was requested over zero vectors
    #[error("Cannot build an index from zero vectors")]
    EmptyIndex,

    /// The persisted artifact failed a structural or consistency check
    #[error("Corrupt index artifact: {reason}")]
    CorruptArtifact { reason: String },

    /// A search arrived before any index was published
    #[error("Index is not ready; initialize the retriever first")]
    IndexNotReady,

    /// A chunk contains the marker used to separate chunks on disk
    #[error("Chunk {ordinal} contains the chunk separator marker")]
    SeparatorCollision { ordinal: usize },

    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl RetrieverError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn corrupt<S: Into<String>>(reason: S) -> Self {
        Self::CorruptArtifact {
            reason: reason.into(),
        }
    }
}

impl From<EmbedError> for RetrieverError {
    fn from(err: EmbedError) -> Self {
        Self::Provider(Arc::new(err))
    }
}

impl From<std::io::Error> for RetrieverError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
