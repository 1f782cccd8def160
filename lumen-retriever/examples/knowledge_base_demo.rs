//! End-to-end walk through the retriever lifecycle without network access
//!
//! 1. Write a small knowledge base to a temporary directory
//! 2. Build and persist the index with the hashing provider
//! 3. Answer a few questions
//! 4. Reopen the index from disk

use anyhow::Result;
use lumen_embed::EmbedConfig;
use lumen_retriever::{Retriever, RetrieverConfig};
use tempfile::tempdir;

const KNOWLEDGE_BASE: &str = "\
Reset your password by visiting /reset. The link in the email expires after one hour.

Contact support at help@co.com for billing issues. Invoices are sent on the first of the month.

Office hours are nine to five on weekdays. Weekend requests are answered on Monday.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempdir()?;
    let corpus = temp_dir.path().join("knowledge_base.txt");
    std::fs::write(&corpus, KNOWLEDGE_BASE)?;

    let config = RetrieverConfig::new(&corpus)
        .with_index_dir(temp_dir.path().join("index"))
        .with_embedding_config(EmbedConfig::hashing(256));

    let retriever = Retriever::from_config(config.clone()).await?;
    retriever.initialize().await?;
    println!("{}\n", retriever.status().await);

    for question in [
        "how do I reset my password",
        "who do I email about an invoice",
        "are you open on the weekend",
    ] {
        println!("Q: {question}");
        for passage in retriever.search_passages(question, Some(1)).await? {
            println!(
                "A: {} (relevance {:.3})\n",
                passage.text, passage.relevance
            );
        }
    }

    // A second retriever loads the persisted index instead of re-embedding
    let reopened = Retriever::from_config(config).await?;
    reopened.initialize().await?;
    println!("Reopened index with {} chunks", reopened.chunks().await.len());
    Ok(())
}
