//! Integration tests for the retriever lifecycle
//!
//! These tests drive a real `Retriever` with an on-disk artifact in a temporary
//! directory and a deterministic keyword embedding provider:
//! - Building from a corpus and answering queries
//! - Reloading a persisted index without re-embedding
//! - Self-healing when the artifact is damaged
//! - Single-flight initialization under concurrency
//! - Failure handling for the corpus and the provider

use anyhow::Result;
use async_trait::async_trait;
use lumen_embed::{EmbedError, EmbeddingProvider, EmbeddingResult};
use lumen_retriever::storage::file_store::DEFAULT_CHUNKS_FILE;
use lumen_retriever::{NO_RESULTS_MESSAGE, Phase, Retriever, RetrieverConfig, RetrieverError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

const RESET_CHUNK: &str = "Reset your password by visiting /reset.";
const BILLING_CHUNK: &str = "Contact support at help@co.com for billing issues.";
const KEYWORDS: [&str; 5] = ["reset", "password", "contact", "support", "billing"];

/// Embeds text as keyword occurrence counts, one axis per keyword.
#[derive(Default)]
struct KeywordProvider {
    batch_calls: AtomicUsize,
    fail_batches: AtomicBool,
    delay: Option<Duration>,
}

impl KeywordProvider {
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        let provider = Self::default();
        provider.fail_batches.store(true, Ordering::SeqCst);
        provider
    }

    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn embed(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    async fn embed_texts(&self, texts: &[String]) -> lumen_embed::Result<EmbeddingResult> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(EmbedError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        EmbeddingResult::new(texts.iter().map(|t| Self::embed(t)).collect())
    }

    async fn embed_text(&self, text: &str) -> lumen_embed::Result<Vec<f32>> {
        Ok(Self::embed(text))
    }

    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-5"
    }
}

struct Fixture {
    dir: TempDir,
    corpus: PathBuf,
}

impl Fixture {
    fn new(corpus_text: &str) -> Result<Self> {
        let dir = tempdir()?;
        let corpus = dir.path().join("knowledge_base.txt");
        std::fs::write(&corpus, corpus_text)?;
        Ok(Self { dir, corpus })
    }

    fn faq() -> Result<Self> {
        Self::new(&format!("{RESET_CHUNK}\n\n{BILLING_CHUNK}"))
    }

    fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    fn config(&self) -> RetrieverConfig {
        RetrieverConfig::new(&self.corpus).with_index_dir(self.index_dir())
    }

    fn retriever(&self, provider: &Arc<KeywordProvider>) -> Result<Retriever> {
        Ok(Retriever::new(self.config(), provider.clone())?)
    }
}

fn chunk_file(index_dir: &Path) -> PathBuf {
    index_dir.join(DEFAULT_CHUNKS_FILE)
}

/// The reference scenario: a password question retrieves the password paragraph verbatim
#[tokio::test]
async fn test_reset_password_query() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;

    retriever.initialize().await?;
    assert_eq!(retriever.phase().await, Phase::Ready);
    assert_eq!(retriever.chunks().await, vec![RESET_CHUNK, BILLING_CHUNK]);

    let context = retriever.search("how do I reset my password", Some(1)).await?;
    assert_eq!(context, RESET_CHUNK);

    assert!(fixture.index_dir().join("index.bin").exists());
    assert!(chunk_file(&fixture.index_dir()).exists());
    Ok(())
}

/// A query sharing no vocabulary with the corpus still returns k passages
#[tokio::test]
async fn test_unrelated_query_still_returns_k() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;

    let passages = retriever.search_passages("what is the weather today", None).await?;
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].rank, 1);
    assert_eq!(passages[1].rank, 2);
    assert!(passages[0].distance <= passages[1].distance);
    assert!(passages.iter().all(|p| p.relevance > 0.0 && p.relevance <= 1.0));

    let context = retriever.search("what is the weather today", None).await?;
    assert_eq!(context.split("\n\n").count(), 2);
    Ok(())
}

/// Search lazily initializes by default and honours k larger than the corpus
#[tokio::test]
async fn test_lazy_search_and_large_k() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;
    assert_eq!(retriever.phase().await, Phase::Uninitialized);

    let passages = retriever.search_passages("billing support", Some(10)).await?;
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].text, BILLING_CHUNK);
    assert_eq!(passages[0].ordinal, 1);
    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(retriever.phase().await, Phase::Ready);
    Ok(())
}

/// Asking for zero passages yields the fixed no-results message
#[tokio::test]
async fn test_no_passages_returns_message() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;

    assert_eq!(retriever.search("reset", Some(0)).await?, NO_RESULTS_MESSAGE);
    Ok(())
}

/// With lazy initialization disabled a search before initialize() is refused
#[tokio::test]
async fn test_index_not_ready_without_lazy_init() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = Retriever::new(fixture.config().with_lazy_initialize(false), provider.clone())?;

    let result = retriever.search("reset", None).await;
    assert!(matches!(result, Err(RetrieverError::IndexNotReady)));
    assert_eq!(provider.batch_calls(), 0);

    retriever.initialize().await?;
    assert_eq!(retriever.search("reset", Some(1)).await?, RESET_CHUNK);
    Ok(())
}

/// A second retriever over the same directory loads the artifact instead of re-embedding
#[tokio::test]
async fn test_persisted_index_is_reused() -> Result<()> {
    let fixture = Fixture::faq()?;

    let first_provider = Arc::new(KeywordProvider::default());
    let first = fixture.retriever(&first_provider)?;
    first.initialize().await?;
    let before = first.search_passages("password reset", Some(2)).await?;

    let second_provider = Arc::new(KeywordProvider::default());
    let second = fixture.retriever(&second_provider)?;
    second.initialize().await?;
    let after = second.search_passages("password reset", Some(2)).await?;

    assert_eq!(first_provider.batch_calls(), 1);
    assert_eq!(second_provider.batch_calls(), 0);
    assert_eq!(before, after);

    let status = second.status().await;
    assert_eq!(status.chunk_count, 2);
    assert_eq!(status.dimension, Some(KEYWORDS.len()));
    Ok(())
}

/// Deleting one line from chunks.txt makes the next initialize rebuild a consistent index
#[tokio::test]
async fn test_damaged_chunk_file_triggers_rebuild() -> Result<()> {
    let fixture = Fixture::new(&format!(
        "{RESET_CHUNK}\nIt takes about five minutes.\n\n{BILLING_CHUNK}"
    ))?;
    let provider = Arc::new(KeywordProvider::default());
    fixture.retriever(&provider)?.initialize().await?;

    let path = chunk_file(&fixture.index_dir());
    let text = std::fs::read_to_string(&path)?;
    let damaged: Vec<&str> = text.lines().skip(1).collect();
    std::fs::write(&path, damaged.join("\n"))?;

    let rebuilt_provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&rebuilt_provider)?;
    retriever.initialize().await?;

    assert_eq!(rebuilt_provider.batch_calls(), 1);
    let snapshot = retriever.snapshot().await.expect("index published");
    assert_eq!(snapshot.index().len(), snapshot.chunks().len());
    assert_eq!(snapshot.len(), 2);

    // The rebuilt artifact is consistent again
    let third_provider = Arc::new(KeywordProvider::default());
    fixture.retriever(&third_provider)?.initialize().await?;
    assert_eq!(third_provider.batch_calls(), 0);
    Ok(())
}

/// Concurrent initialize calls share one build and one embedding request
#[tokio::test]
async fn test_concurrent_initialize_is_single_flight() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::slow(Duration::from_millis(50)));
    let retriever = fixture.retriever(&provider)?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let retriever = retriever.clone();
            tokio::spawn(async move { retriever.initialize().await })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        handle??;
    }

    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(retriever.phase().await, Phase::Ready);
    Ok(())
}

/// Concurrent lazy searches on a cold retriever also trigger a single build
#[tokio::test]
async fn test_concurrent_cold_searches_share_build() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::slow(Duration::from_millis(50)));
    let retriever = fixture.retriever(&provider)?;

    let results = futures::future::join_all(
        (0..4).map(|_| retriever.search("reset my password", Some(1))),
    )
    .await;

    for result in results {
        assert_eq!(result?, RESET_CHUNK);
    }
    assert_eq!(provider.batch_calls(), 1);
    Ok(())
}

/// An empty corpus fails the build and leaves the retriever uninitialized
#[tokio::test]
async fn test_empty_corpus() -> Result<()> {
    let fixture = Fixture::new("  \n\n \n\n")?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;

    let result = retriever.initialize().await;
    match result {
        Err(RetrieverError::EmptyCorpus { path }) => assert_eq!(path, fixture.corpus),
        other => panic!("expected EmptyCorpus, got {other:?}"),
    }
    assert_eq!(provider.batch_calls(), 0);
    assert_eq!(retriever.phase().await, Phase::Uninitialized);
    Ok(())
}

/// A missing corpus file is reported with its path
#[tokio::test]
async fn test_missing_corpus() -> Result<()> {
    let dir = tempdir()?;
    let config = RetrieverConfig::new(dir.path().join("absent.txt")).with_index_dir(dir.path());
    let retriever = Retriever::new(config, Arc::new(KeywordProvider::default()))?;

    let result = retriever.initialize().await;
    assert!(matches!(result, Err(RetrieverError::CorpusUnavailable { .. })));
    assert_eq!(retriever.phase().await, Phase::Uninitialized);
    Ok(())
}

/// A provider failure propagates and leaves the retriever uninitialized; a later call retries
#[tokio::test]
async fn test_provider_failure_leaves_uninitialized() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::failing());
    let retriever = fixture.retriever(&provider)?;

    let result = retriever.initialize().await;
    assert!(matches!(result, Err(RetrieverError::Provider(_))));
    assert_eq!(retriever.phase().await, Phase::Uninitialized);
    assert!(retriever.snapshot().await.is_none());
    assert!(!fixture.index_dir().join("index.bin").exists());

    provider.fail_batches.store(false, Ordering::SeqCst);
    retriever.initialize().await?;
    assert_eq!(provider.batch_calls(), 2);
    assert_eq!(retriever.phase().await, Phase::Ready);
    Ok(())
}

/// Chunks containing the on-disk separator are rejected before anything is embedded
#[tokio::test]
async fn test_separator_collision_is_rejected() -> Result<()> {
    let fixture = Fixture::new("harmless\n\nsneaky <---CHUNK_SEPARATOR---> text")?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;

    let result = retriever.initialize().await;
    assert!(matches!(
        result,
        Err(RetrieverError::SeparatorCollision { ordinal: 1 })
    ));
    assert_eq!(provider.batch_calls(), 0);
    Ok(())
}

/// Rebuild picks up corpus changes and replaces the persisted artifact
#[tokio::test]
async fn test_rebuild_publishes_new_corpus() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;
    retriever.initialize().await?;

    let support_chunk = "Support is available around the clock.";
    std::fs::write(
        &fixture.corpus,
        format!("{RESET_CHUNK}\n\n{BILLING_CHUNK}\n\n{support_chunk}"),
    )?;

    // initialize() is a no-op once ready
    retriever.initialize().await?;
    assert_eq!(retriever.chunks().await.len(), 2);

    retriever.rebuild().await?;
    assert_eq!(provider.batch_calls(), 2);
    assert_eq!(retriever.chunks().await.len(), 3);
    assert_eq!(retriever.phase().await, Phase::Ready);

    let reloaded = fixture.retriever(&Arc::new(KeywordProvider::default()))?;
    reloaded.initialize().await?;
    assert_eq!(reloaded.chunks().await.len(), 3);
    Ok(())
}

/// A failed rebuild keeps serving the previously published index
#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;
    retriever.initialize().await?;

    provider.fail_batches.store(true, Ordering::SeqCst);
    let result = retriever.rebuild().await;
    assert!(matches!(result, Err(RetrieverError::Provider(_))));

    assert_eq!(retriever.phase().await, Phase::Ready);
    assert_eq!(retriever.search("reset password", Some(1)).await?, RESET_CHUNK);
    Ok(())
}

/// Searches during a rebuild are answered from the previous index
#[tokio::test]
async fn test_search_during_rebuild_uses_previous_index() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::slow(Duration::from_millis(100)));
    let retriever = fixture.retriever(&provider)?;
    retriever.initialize().await?;

    let rebuilding = {
        let retriever = retriever.clone();
        tokio::spawn(async move { retriever.rebuild().await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while retriever.phase().await != Phase::Rebuilding {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    assert_eq!(retriever.search("reset password", Some(1)).await?, RESET_CHUNK);

    rebuilding.await??;
    assert_eq!(retriever.phase().await, Phase::Ready);
    assert_eq!(provider.batch_calls(), 2);
    Ok(())
}

/// Clearing the artifact forces the next retriever to build from scratch
#[tokio::test]
async fn test_clear_persisted() -> Result<()> {
    let fixture = Fixture::faq()?;
    let provider = Arc::new(KeywordProvider::default());
    let retriever = fixture.retriever(&provider)?;
    retriever.initialize().await?;

    retriever.clear_persisted().await?;
    assert!(!fixture.index_dir().join("index.bin").exists());
    // The in-memory index is untouched
    assert_eq!(retriever.search("reset", Some(1)).await?, RESET_CHUNK);

    let fresh_provider = Arc::new(KeywordProvider::default());
    fixture.retriever(&fresh_provider)?.initialize().await?;
    assert_eq!(fresh_provider.batch_calls(), 1);
    Ok(())
}
