use clap::Parser;
use lumen_context::{PARAGRAPH_DELIMITER, ParagraphChunker};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to preview how a corpus file is split into retrievable chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the corpus file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Paragraph delimiter.
    #[arg(short, long, default_value = PARAGRAPH_DELIMITER)]
    delimiter: String,

    /// Subdivide paragraphs longer than this many characters.
    #[arg(short, long)]
    max_chunk_chars: Option<usize>,
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    ordinal: usize,
    chars: usize,
    text: &'a str,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let corpus = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    // clap hands over the delimiter literally, so accept escaped newlines from the shell
    let delimiter = args.delimiter.replace("\\n", "\n");
    let mut chunker = ParagraphChunker::new().with_delimiter(delimiter);
    if let Some(limit) = args.max_chunk_chars {
        chunker = chunker.with_max_chunk_chars(limit);
    }

    let paragraphs = chunker.paragraphs(&corpus)?;
    let output: Vec<ChunkOutput> = paragraphs
        .iter()
        .map(|p| ChunkOutput {
            ordinal: p.ordinal,
            chars: p.text.chars().count(),
            text: &p.text,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
