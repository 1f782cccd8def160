//! The retriever: build-or-load lifecycle and top-k search over one published index.
//!
//! A [`Retriever`] owns exactly one published [`IndexSnapshot`] at a time. Builds never
//! mutate a published snapshot; they produce a new one, persist it, and swap it in under
//! a write lock, so a search always sees either the old index or the new one in full.
//!
//! Builds are single-flight. All callers that need an index while a build is running
//! await the same shared future and observe the same outcome; the embedding provider is
//! asked to embed the corpus once no matter how many callers are waiting.

use crate::config::RetrieverConfig;
use crate::error::{Result, RetrieverError};
use crate::index::FlatIndex;
use crate::status::RetrieverStatus;
use crate::storage::{ArtifactStore, FileArtifactStore, IndexSnapshot, LoadOutcome};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lumen_context::ChunkError;
use lumen_embed::{EmbedError, EmbeddingProvider, create_provider};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Returned by [`Retriever::search`] when nothing could be retrieved.
pub const NO_RESULTS_MESSAGE: &str = "No relevant information found in the knowledge base.";

/// Separator placed between passages in a joined search result.
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Lifecycle phase of a retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No index has been published yet
    Uninitialized,
    /// An index is published and no build is running
    Ready,
    /// A rebuild is running; searches use the previously published index, if any
    Rebuilding,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Ready => "ready",
            Phase::Rebuilding => "rebuilding",
        };
        f.write_str(name)
    }
}

/// One passage returned by [`Retriever::search_passages`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// 1-based position in the result list
    pub rank: usize,
    /// Position of the chunk in the corpus
    pub ordinal: usize,
    pub text: String,
    /// Squared L2 distance between the query and the chunk embedding
    pub distance: f32,
    /// `1 / (1 + distance)`, in `(0, 1]`
    pub relevance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildMode {
    /// Use the persisted artifact when it is consistent, build otherwise
    LoadOrBuild,
    /// Always build from the corpus
    Rebuild,
}

type BuildFuture = Shared<BoxFuture<'static, Result<Arc<IndexSnapshot>>>>;

struct State {
    phase: Phase,
    snapshot: Option<Arc<IndexSnapshot>>,
}

struct RetrieverInner {
    config: RetrieverConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ArtifactStore>,
    state: RwLock<State>,
    flight: Mutex<Option<BuildFuture>>,
}

/// Semantic retriever over a paragraph corpus. Cloning yields another handle to the
/// same index.
#[derive(Clone)]
pub struct Retriever {
    inner: Arc<RetrieverInner>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("corpus_path", &self.inner.config.corpus_path)
            .field("store", &self.inner.store.location())
            .field("provider", &self.inner.provider.provider_name())
            .finish()
    }
}

impl Retriever {
    /// Creates a retriever persisting to the directory named in `config`.
    ///
    /// Nothing is read or embedded until [`initialize`](Self::initialize) or the first
    /// search.
    pub fn new(config: RetrieverConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = FileArtifactStore::new(&config.index_dir)
            .with_file_names(&config.index_file, &config.chunks_file);
        Self::with_store(config, provider, Arc::new(store))
    }

    /// Creates a retriever with a caller-supplied artifact store.
    pub fn with_store(
        config: RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RetrieverInner {
                config,
                provider,
                store,
                state: RwLock::new(State {
                    phase: Phase::Uninitialized,
                    snapshot: None,
                }),
                flight: Mutex::new(None),
            }),
        })
    }

    /// Creates a retriever together with the embedding provider named in `config`.
    pub async fn from_config(config: RetrieverConfig) -> Result<Self> {
        config.validate()?;
        let provider = create_provider(&config.embedding).await?;
        Self::new(config, provider)
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.inner.config
    }

    /// Loads the persisted index or builds one from the corpus.
    ///
    /// Does nothing when an index is already published. Concurrent calls share a single
    /// build. A corrupt artifact is logged and rebuilt; a missing corpus or a provider
    /// failure is returned and leaves the retriever without an index.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.state.read().await.snapshot.is_some() {
            return Ok(());
        }
        self.join_or_start_build().await.map(|_| ())
    }

    /// Builds a fresh index from the corpus and publishes it.
    ///
    /// Waits for any build already in flight, then runs its own. Searches keep using the
    /// previously published index until the new one is saved and swapped in; on failure
    /// the previous index stays published.
    pub async fn rebuild(&self) -> Result<()> {
        let flight = loop {
            let pending = {
                let mut slot = self.lock_flight();
                match slot.as_ref() {
                    Some(pending) => pending.clone(),
                    None => {
                        let flight = self.inner.clone().start_build(BuildMode::Rebuild);
                        *slot = Some(flight.clone());
                        break flight;
                    }
                }
            };
            // The outcome belongs to whoever started that build
            let _ = pending.clone().await;
            self.finish_flight(&pending);
        };
        self.await_flight(flight).await.map(|_| ())
    }

    /// Removes the persisted artifact. The published in-memory index is unaffected.
    pub async fn clear_persisted(&self) -> Result<()> {
        self.inner.store.clear().await
    }

    /// Returns the top-`k` passages for `query` joined by a blank line.
    ///
    /// `k` defaults to the configured `default_top_k`. When no passage can be returned
    /// the result is [`NO_RESULTS_MESSAGE`].
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<String> {
        let passages = self.search_passages(query, k).await?;
        if passages.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }
        Ok(passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR))
    }

    /// Returns the top-`k` passages for `query` with their distances, closest first.
    pub async fn search_passages(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<RetrievedPassage>> {
        let k = k.unwrap_or(self.inner.config.default_top_k);
        let snapshot = self.ready_snapshot().await?;

        let vector = self.inner.provider.embed_text(query).await?;
        if vector.len() != snapshot.dimension() {
            warn!(
                "Query embedding from {} has dimension {} but the index in {} has dimension {}; \
                 the index was built with a different model, run `rebuild`",
                self.inner.provider.model_name(),
                vector.len(),
                self.inner.store.location(),
                snapshot.dimension()
            );
            return Err(RetrieverError::DimensionMismatch {
                expected: snapshot.dimension(),
                actual: vector.len(),
            });
        }
        let neighbors = snapshot.index().query(&vector, k)?;

        let mut passages = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let Some(text) = snapshot.chunk(neighbor.ordinal) else {
                warn!(
                    "Index returned ordinal {} but only {} chunks are loaded; skipping",
                    neighbor.ordinal,
                    snapshot.len()
                );
                continue;
            };
            passages.push(RetrievedPassage {
                rank: passages.len() + 1,
                ordinal: neighbor.ordinal,
                text: text.to_string(),
                distance: neighbor.distance,
                relevance: 1.0 / (1.0 + neighbor.distance),
            });
        }

        debug!(
            "Query matched {} of {} requested passages",
            passages.len(),
            k
        );
        Ok(passages)
    }

    /// The published snapshot, if any
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner.state.read().await.snapshot.clone()
    }

    /// The published chunk sequence; empty before the first successful build
    pub async fn chunks(&self) -> Vec<String> {
        self.snapshot()
            .await
            .map(|s| s.chunks().to_vec())
            .unwrap_or_default()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.read().await.phase
    }

    pub async fn status(&self) -> RetrieverStatus {
        let state = self.inner.state.read().await;
        RetrieverStatus {
            phase: state.phase,
            chunk_count: state.snapshot.as_ref().map_or(0, |s| s.len()),
            dimension: state.snapshot.as_ref().map(|s| s.dimension()),
            corpus_path: self.inner.config.corpus_path.clone(),
            artifact_dir: self.inner.store.location(),
            provider: self.inner.provider.provider_name().to_string(),
            model: self.inner.provider.model_name().to_string(),
        }
    }

    async fn ready_snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot);
        }
        if !self.inner.config.lazy_initialize {
            return Err(RetrieverError::IndexNotReady);
        }
        self.join_or_start_build().await
    }

    async fn join_or_start_build(&self) -> Result<Arc<IndexSnapshot>> {
        let flight = {
            let mut slot = self.lock_flight();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let flight = self.inner.clone().start_build(BuildMode::LoadOrBuild);
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        self.await_flight(flight).await
    }

    async fn await_flight(&self, flight: BuildFuture) -> Result<Arc<IndexSnapshot>> {
        let outcome = flight.clone().await;
        self.finish_flight(&flight);
        outcome
    }

    /// Empties the flight slot if it still holds `flight`.
    fn finish_flight(&self, flight: &BuildFuture) {
        let mut slot = self.lock_flight();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(flight)) {
            *slot = None;
        }
    }

    fn lock_flight(&self) -> MutexGuard<'_, Option<BuildFuture>> {
        self.inner
            .flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl RetrieverInner {
    fn start_build(self: Arc<Self>, mode: BuildMode) -> BuildFuture {
        async move { self.run_build(mode).await }.boxed().shared()
    }

    async fn run_build(&self, mode: BuildMode) -> Result<Arc<IndexSnapshot>> {
        {
            let mut state = self.state.write().await;
            if mode == BuildMode::LoadOrBuild {
                if let Some(snapshot) = &state.snapshot {
                    return Ok(Arc::clone(snapshot));
                }
            } else {
                state.phase = Phase::Rebuilding;
            }
        }

        let outcome = match mode {
            BuildMode::LoadOrBuild => self.load_or_build().await,
            BuildMode::Rebuild => self.build_from_corpus().await,
        };

        let mut state = self.state.write().await;
        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(Arc::clone(&snapshot));
                state.phase = Phase::Ready;
                info!(
                    "Published index with {} chunks of dimension {}",
                    snapshot.len(),
                    snapshot.dimension()
                );
                Ok(snapshot)
            }
            Err(err) => {
                state.phase = if state.snapshot.is_some() {
                    Phase::Ready
                } else {
                    Phase::Uninitialized
                };
                warn!("Index build failed: {err}");
                Err(err)
            }
        }
    }

    async fn load_or_build(&self) -> Result<IndexSnapshot> {
        match self.store.try_load().await? {
            LoadOutcome::Loaded(snapshot) => return Ok(snapshot),
            LoadOutcome::Missing => info!(
                "No persisted index in {}; building from {}",
                self.store.location(),
                self.config.corpus_path.display()
            ),
            LoadOutcome::Corrupt { reason } => warn!(
                "Persisted index in {} is unusable ({reason}); rebuilding",
                self.store.location()
            ),
        }
        self.build_from_corpus().await
    }

    async fn build_from_corpus(&self) -> Result<IndexSnapshot> {
        let path = &self.config.corpus_path;
        let corpus = tokio::fs::read_to_string(path).await.map_err(|source| {
            RetrieverError::CorpusUnavailable {
                path: path.clone(),
                source: Arc::new(source),
            }
        })?;

        let chunks = self
            .config
            .chunker()
            .split(&corpus)
            .map_err(|err| match err {
                ChunkError::EmptyCorpus => RetrieverError::EmptyCorpus { path: path.clone() },
                ChunkError::InvalidLimit => RetrieverError::config(err.to_string()),
            })?;
        self.store.validate_chunks(&chunks)?;

        info!(
            "Embedding {} chunks from {} with {} ({})",
            chunks.len(),
            path.display(),
            self.provider.provider_name(),
            self.provider.model_name()
        );
        let embedded = self.provider.embed_texts(&chunks).await?;
        if embedded.len() != chunks.len() {
            return Err(EmbedError::ResponseLength {
                expected: chunks.len(),
                actual: embedded.len(),
            }
            .into());
        }

        let index = FlatIndex::build(embedded.embeddings)?;
        self.store.save(&index, &chunks).await?;
        IndexSnapshot::new(index, chunks)
    }
}
