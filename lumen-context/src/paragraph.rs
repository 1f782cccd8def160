//! Paragraph chunking for knowledge-base corpora.
//!
//! A corpus is a plain UTF-8 document in which retrievable passages are separated by
//! blank lines. [`ParagraphChunker`] turns such a document into an ordered sequence of
//! trimmed, non-empty chunks. The position of a chunk in that sequence (its *ordinal*)
//! is the only key the vector index keeps, so the order produced here is load-bearing:
//! the same corpus must always yield the same chunks in the same order.
//!
//! # Example
//!
//! ```
//! use lumen_context::ParagraphChunker;
//!
//! let corpus = "Reset your password by visiting /reset.\n\nContact support at help@co.com for billing issues.";
//! let chunks = ParagraphChunker::default().split(corpus).unwrap();
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0], "Reset your password by visiting /reset.");
//! ```
//!
//! # Oversized paragraphs
//!
//! By default a paragraph is kept whole no matter how long it is. When a character
//! limit is configured with [`ParagraphChunker::with_max_chunk_chars`], paragraphs above
//! the limit are divided on line breaks first, then on spaces, and finally cut on
//! character boundaries. Neighbouring pieces are packed back together as long as they
//! fit, so the limit produces as few chunks as possible.

use serde::Serialize;

/// Blank-line boundary that separates paragraphs.
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

/// Delimiters tried, in order, when a paragraph exceeds the configured limit.
const OVERSIZE_DELIMITERS: &[&str] = &["\n", " "];

/// Errors produced while chunking a corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// The corpus contained no non-empty paragraph.
    #[error("corpus contains no non-empty chunks")]
    EmptyCorpus,

    /// A zero character limit was configured.
    #[error("max_chunk_chars must be greater than zero")]
    InvalidLimit,
}

/// A chunk together with its ordinal, as reported by tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    /// Position of the chunk in the split sequence (0-indexed).
    pub ordinal: usize,
    /// Trimmed chunk text.
    pub text: String,
}

/// Splits corpus text into paragraph chunks.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    delimiter: String,
    max_chunk_chars: Option<usize>,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self {
            delimiter: PARAGRAPH_DELIMITER.to_string(),
            max_chunk_chars: None,
        }
    }
}

impl ParagraphChunker {
    /// Creates a chunker that splits on blank lines and never subdivides paragraphs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom paragraph delimiter instead of the blank line.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Subdivide paragraphs longer than `max_chunk_chars` characters.
    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = Some(max_chunk_chars);
        self
    }

    /// The configured character limit, if any.
    pub fn max_chunk_chars(&self) -> Option<usize> {
        self.max_chunk_chars
    }

    /// Splits `corpus` into ordered, trimmed, non-empty chunks.
    ///
    /// Windows line endings are normalized before splitting so that `\r\n\r\n` is
    /// recognised as a paragraph break.
    ///
    /// # Errors
    /// - [`ChunkError::EmptyCorpus`] when no chunk survives trimming
    /// - [`ChunkError::InvalidLimit`] when a zero character limit was configured
    pub fn split(&self, corpus: &str) -> Result<Vec<String>, ChunkError> {
        if self.max_chunk_chars == Some(0) {
            return Err(ChunkError::InvalidLimit);
        }

        let normalized = corpus.replace("\r\n", "\n");
        let mut chunks = Vec::new();

        for candidate in normalized.split(self.delimiter.as_str()) {
            let trimmed = candidate.trim();
            if trimmed.is_empty() {
                continue;
            }
            match self.max_chunk_chars {
                Some(limit) => chunks.extend(
                    split_oversized(trimmed, limit, OVERSIZE_DELIMITERS)
                        .into_iter()
                        .map(|piece| piece.trim().to_string())
                        .filter(|piece| !piece.is_empty()),
                ),
                None => chunks.push(trimmed.to_string()),
            }
        }

        if chunks.is_empty() {
            return Err(ChunkError::EmptyCorpus);
        }
        Ok(chunks)
    }

    /// Like [`split`](Self::split), but pairs every chunk with its ordinal.
    pub fn paragraphs(&self, corpus: &str) -> Result<Vec<Paragraph>, ChunkError> {
        Ok(self
            .split(corpus)?
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Paragraph { ordinal, text })
            .collect())
    }
}

/// Splits `corpus` with the default blank-line chunker.
pub fn split(corpus: &str) -> Result<Vec<String>, ChunkError> {
    ParagraphChunker::default().split(corpus)
}

fn split_oversized(text: &str, limit: usize, delimiters: &[&str]) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let Some((delimiter, finer)) = delimiters.split_first() else {
        return hard_split(text, limit);
    };

    let delimiter_len = delimiter.chars().count();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in text.split(delimiter) {
        for part in split_oversized(segment, limit, finer) {
            let part_len = part.chars().count();
            if current.is_empty() {
                current = part;
                current_len = part_len;
            } else if current_len + delimiter_len + part_len <= limit {
                current.push_str(delimiter);
                current.push_str(&part);
                current_len += delimiter_len + part_len;
            } else {
                pieces.push(std::mem::replace(&mut current, part));
                current_len = part_len;
            }
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn hard_split(text: &str, limit: usize) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(limit)
        .map(|chars| chars.iter().collect())
        .collect()
}
