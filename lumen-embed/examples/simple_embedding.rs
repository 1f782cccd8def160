//! Embeds a few texts with the offline hashing provider and compares them

use lumen_embed::{EmbedConfig, EmbeddingProvider, create_provider};

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EmbedConfig::hashing(128);
    let provider = create_provider(&config).await?;
    println!(
        "Provider: {} ({})",
        provider.provider_name(),
        provider.model_name()
    );

    let texts = vec![
        "Reset your password by visiting /reset.".to_string(),
        "Contact support at help@co.com for billing issues.".to_string(),
        "Office hours are nine to five on weekdays.".to_string(),
    ];
    let documents = provider.embed_texts(&texts).await?;
    println!(
        "Embedded {} texts into dimension {}",
        documents.len(),
        documents.dimension
    );

    let query = "how do I reset my password";
    let vector = provider.embed_text(query).await?;
    println!("\nQuery: \"{query}\"");
    for (text, embedding) in texts.iter().zip(&documents.embeddings) {
        println!("  {:.4}  {}", squared_distance(&vector, embedding), text);
    }
    Ok(())
}
