//! Persistence of built indexes
//!
//! A built index is stored as an *artifact*: the vector index together with the chunk
//! sequence it was built from. Both halves must always be loaded together, because a
//! vector's ordinal is the only link back to its text.
//!
//! ## Key Components
//!
//! - **IndexSnapshot**: An immutable, size-checked (index, chunks) pair
//! - **LoadOutcome**: What a load attempt found on disk
//! - **ArtifactStore**: The persistence seam used by the retriever
//! - **FileArtifactStore**: Two files in one directory (`index.bin`, `chunks.txt`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lumen_retriever::index::FlatIndex;
//! use lumen_retriever::storage::{ArtifactStore, FileArtifactStore, IndexSnapshot, LoadOutcome};
//!
//! # async fn example() -> lumen_retriever::Result<()> {
//! let store = FileArtifactStore::new("index");
//! let index = FlatIndex::build(vec![vec![0.0, 1.0], vec![1.0, 0.0]])?;
//! let chunks = vec!["first".to_string(), "second".to_string()];
//! store.save(&index, &chunks).await?;
//!
//! match store.try_load().await? {
//!     LoadOutcome::Loaded(snapshot) => assert_eq!(snapshot.len(), 2),
//!     LoadOutcome::Missing => println!("nothing on disk"),
//!     LoadOutcome::Corrupt { reason } => println!("rebuild needed: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, RetrieverError};
use crate::index::FlatIndex;
use async_trait::async_trait;

pub mod codec;
pub mod file_store;

pub use file_store::FileArtifactStore;

/// An index and the chunks it was built from, guaranteed to be the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    index: FlatIndex,
    chunks: Vec<String>,
}

impl IndexSnapshot {
    /// Pairs `index` with `chunks`.
    ///
    /// # Errors
    /// [`RetrieverError::CorruptArtifact`] when the two differ in length.
    pub fn new(index: FlatIndex, chunks: Vec<String>) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RetrieverError::corrupt(format!(
                "index holds {} vectors but there are {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self { index, chunks })
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Text of the chunk at `ordinal`, if any
    pub fn chunk(&self, ordinal: usize) -> Option<&str> {
        self.chunks.get(ordinal).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

/// Result of looking for a persisted artifact.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A consistent artifact was found
    Loaded(IndexSnapshot),
    /// No artifact exists yet
    Missing,
    /// An artifact exists but cannot be trusted; it should be rebuilt
    Corrupt { reason: String },
}

/// Persistence operations for built indexes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `index` and `chunks`, replacing any previous artifact
    async fn save(&self, index: &FlatIndex, chunks: &[String]) -> Result<()>;

    /// Load the persisted artifact, classifying absence and corruption instead of failing
    async fn try_load(&self) -> Result<LoadOutcome>;

    /// Remove the persisted artifact, if any
    async fn clear(&self) -> Result<()>;

    /// Reject chunks this store cannot persist faithfully
    fn validate_chunks(&self, _chunks: &[String]) -> Result<()> {
        Ok(())
    }

    /// Human-readable location of the artifact
    fn location(&self) -> String;
}
