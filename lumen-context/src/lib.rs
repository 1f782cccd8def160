//! Corpus chunking for the lumen retrieval engine.
//!
//! See [`paragraph`] for the splitting rules.

pub mod paragraph;

pub use paragraph::{ChunkError, PARAGRAPH_DELIMITER, Paragraph, ParagraphChunker, split};
