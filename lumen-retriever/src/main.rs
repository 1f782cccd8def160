use clap::{Parser, Subcommand};
use lumen_embed::ProviderKind;
use lumen_embed::config::{DEFAULT_FASTEMBED_MODEL, DEFAULT_GEMINI_MODEL, EmbedConfig};
use lumen_retriever::{Retriever, RetrieverConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// A CLI tool to build and query a lumen knowledge-base index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Corpus file (overrides the configuration file)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Directory holding index.bin and chunks.txt (overrides the configuration file)
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Embedding provider: gemini, fastembed or hashing
    #[arg(long)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the persisted index, building it from the corpus if missing or corrupt
    Build,
    /// Rebuild the index from the corpus unconditionally
    Rebuild {
        /// Delete the persisted artifact before rebuilding
        #[arg(long)]
        clean: bool,
    },
    /// Retrieve the passages most similar to a query
    Search {
        /// Query text
        query: String,
        /// Number of passages to return
        #[arg(short)]
        k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "full")]
        format: OutputFormat,
    },
    /// Show retriever status
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List indexed chunks
    Chunks {
        /// Limit number of results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    ordinal: usize,
    chars: usize,
    text: &'a str,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<RetrieverConfig> {
    let mut config = match &args.config {
        Some(path) => RetrieverConfig::from_toml_file(path)?,
        None => RetrieverConfig::default(),
    };

    if let Some(corpus) = &args.corpus {
        config.corpus_path = corpus.clone();
    }
    if let Some(dir) = &args.index_dir {
        config.index_dir = dir.clone();
    }
    if let Some(provider) = args.provider {
        config.embedding = override_provider(config.embedding, provider);
    }
    Ok(config)
}

/// Switch providers, swapping in that provider's default model when the configured
/// model belongs to another backend.
fn override_provider(embedding: EmbedConfig, provider: ProviderKind) -> EmbedConfig {
    if embedding.provider == provider {
        return embedding;
    }
    match provider {
        ProviderKind::Gemini => EmbedConfig {
            provider,
            model_name: DEFAULT_GEMINI_MODEL.to_string(),
            ..embedding
        },
        ProviderKind::FastEmbed => EmbedConfig {
            provider,
            model_name: DEFAULT_FASTEMBED_MODEL.to_string(),
            ..embedding
        },
        ProviderKind::Hashing => EmbedConfig::hashing(embedding.dimension),
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let retriever = Retriever::from_config(config).await?;

    match args.command {
        Commands::Build => {
            retriever.initialize().await?;
            let status = retriever.status().await;
            println!(
                "Index ready: {} chunks of dimension {} in {}",
                status.chunk_count,
                status.dimension.unwrap_or(0),
                status.artifact_dir
            );
        }
        Commands::Rebuild { clean } => {
            if clean {
                retriever.clear_persisted().await?;
            }
            retriever.rebuild().await?;
            let status = retriever.status().await;
            println!(
                "Rebuilt index: {} chunks of dimension {} in {}",
                status.chunk_count,
                status.dimension.unwrap_or(0),
                status.artifact_dir
            );
        }
        Commands::Search { query, k, format } => match format {
            OutputFormat::Full => {
                println!("{}", retriever.search(&query, k).await?);
            }
            OutputFormat::Json => {
                let passages = retriever.search_passages(&query, k).await?;
                println!("{}", serde_json::to_string_pretty(&passages)?);
            }
            OutputFormat::Summary => {
                let passages = retriever.search_passages(&query, k).await?;
                println!("Found {} passages:", passages.len());
                for passage in passages {
                    let preview: String = passage.text.chars().take(80).collect();
                    println!(
                        "  #{} | Chunk: {} | Distance: {:.4} | Relevance: {:.3} | {}",
                        passage.rank,
                        passage.ordinal,
                        passage.distance,
                        passage.relevance,
                        preview.replace('\n', " ")
                    );
                }
            }
        },
        Commands::Status { format } => {
            retriever.initialize().await?;
            let status = retriever.status().await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Summary | OutputFormat::Full => println!("{status}"),
            }
        }
        Commands::Chunks { limit, format } => {
            retriever.initialize().await?;
            let mut chunks = retriever.chunks().await;
            if let Some(limit) = limit {
                chunks.truncate(limit);
            }

            let output: Vec<ChunkOutput> = chunks
                .iter()
                .enumerate()
                .map(|(ordinal, text)| ChunkOutput {
                    ordinal,
                    chars: text.chars().count(),
                    text,
                })
                .collect();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Summary => {
                    println!("Found {} chunks:", output.len());
                    for chunk in output {
                        let preview: String = chunk.text.chars().take(80).collect();
                        println!(
                            "  #{} | {} chars | {}",
                            chunk.ordinal,
                            chunk.chars,
                            preview.replace('\n', " ")
                        );
                    }
                }
                OutputFormat::Full => {
                    for chunk in output {
                        println!("Chunk #{} ({} chars)", chunk.ordinal, chunk.chars);
                        println!("{}", chunk.text);
                        println!("---");
                    }
                }
            }
        }
    }

    Ok(())
}
