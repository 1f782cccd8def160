//! Directory-backed artifact store

use super::codec;
use super::{ArtifactStore, IndexSnapshot, LoadOutcome};
use crate::error::{Result, RetrieverError};
use crate::index::FlatIndex;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_INDEX_FILE: &str = "index.bin";
pub const DEFAULT_CHUNKS_FILE: &str = "chunks.txt";

/// Stores an artifact as `index.bin` and `chunks.txt` inside one directory.
///
/// Each file is written to a temporary sibling and renamed into place. The chunk file
/// goes first; its digest is recorded in the index header, so an interruption between
/// the two renames is detected as corruption on the next load.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
    index_file: String,
    chunks_file: String,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            chunks_file: DEFAULT_CHUNKS_FILE.to_string(),
        }
    }

    pub fn with_file_names(
        mut self,
        index_file: impl Into<String>,
        chunks_file: impl Into<String>,
    ) -> Self {
        self.index_file = index_file.into();
        self.chunks_file = chunks_file.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.dir.join(&self.chunks_file)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

/// Reads a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn remove_optional(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save(&self, index: &FlatIndex, chunks: &[String]) -> Result<()> {
        if index.len() != chunks.len() {
            return Err(RetrieverError::corrupt(format!(
                "refusing to save {} vectors with {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        self.validate_chunks(chunks)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let chunk_text = codec::encode_chunks(chunks);
        let digest = codec::chunk_digest(chunk_text.as_bytes());
        let blob = codec::encode_index(index, &digest);

        write_atomic(&self.chunks_path(), chunk_text.as_bytes()).await?;
        write_atomic(&self.index_path(), &blob).await?;

        info!(
            "Saved index with {} vectors of dimension {} to {}",
            index.len(),
            index.dimension(),
            self.dir.display()
        );
        Ok(())
    }

    async fn try_load(&self) -> Result<LoadOutcome> {
        let index_path = self.index_path();
        let chunks_path = self.chunks_path();

        let Some(blob) = read_optional(&index_path).await? else {
            debug!("No index file at {}", index_path.display());
            return Ok(LoadOutcome::Missing);
        };
        let Some(chunk_bytes) = read_optional(&chunks_path).await? else {
            debug!("No chunk file at {}", chunks_path.display());
            return Ok(LoadOutcome::Missing);
        };

        let (header, index) = match codec::decode_index(&blob) {
            Ok(decoded) => decoded,
            Err(err) => {
                return Ok(LoadOutcome::Corrupt {
                    reason: err.to_string(),
                });
            }
        };

        if codec::chunk_digest(&chunk_bytes) != header.chunk_digest {
            return Ok(LoadOutcome::Corrupt {
                reason: format!(
                    "{} does not match the digest recorded in {}",
                    chunks_path.display(),
                    index_path.display()
                ),
            });
        }

        let Ok(chunk_text) = String::from_utf8(chunk_bytes) else {
            return Ok(LoadOutcome::Corrupt {
                reason: format!("{} is not valid UTF-8", chunks_path.display()),
            });
        };
        let chunks = codec::decode_chunks(&chunk_text);

        match IndexSnapshot::new(index, chunks) {
            Ok(snapshot) => {
                info!(
                    "Loaded index with {} chunks from {}",
                    snapshot.len(),
                    self.dir.display()
                );
                Ok(LoadOutcome::Loaded(snapshot))
            }
            Err(err) => Ok(LoadOutcome::Corrupt {
                reason: err.to_string(),
            }),
        }
    }

    async fn clear(&self) -> Result<()> {
        let removed_index = remove_optional(&self.index_path()).await?;
        let removed_chunks = remove_optional(&self.chunks_path()).await?;
        if removed_index || removed_chunks {
            info!("Removed index artifact in {}", self.dir.display());
        }
        Ok(())
    }

    fn validate_chunks(&self, chunks: &[String]) -> Result<()> {
        codec::check_separator(chunks)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
