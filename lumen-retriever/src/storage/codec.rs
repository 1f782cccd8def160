//! On-disk encodings of the index blob and the chunk file.
//!
//! Index blob layout (all integers little-endian):
//!
//! ```text
//! offset  size  field
//! 0       4     magic "LMIX"
//! 4       4     format version (u32)
//! 8       4     metric tag (u32, 1 = L2)
//! 12      4     dimension d (u32)
//! 16      8     vector count N (u64)
//! 24      32    BLAKE3 digest of the chunk file bytes
//! 56      4·N·d vectors, row-major f32
//! ```
//!
//! The chunk file is UTF-8 text with chunks joined by [`CHUNK_SEPARATOR`].

use crate::error::{Result, RetrieverError};
use crate::index::{FlatIndex, Metric};

pub const INDEX_MAGIC: &[u8; 4] = b"LMIX";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 56;

/// Marker placed between chunks in the chunk file.
pub const CHUNK_SEPARATOR: &str = "\n<---CHUNK_SEPARATOR--->\n";

/// Marker text that must not occur inside a chunk.
pub const SEPARATOR_MARKER: &str = "<---CHUNK_SEPARATOR--->";

/// BLAKE3 digest of a chunk file, stored in the index header.
pub type ChunkDigest = [u8; 32];

/// Parsed index blob header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub metric: Metric,
    pub dimension: usize,
    pub count: usize,
    pub chunk_digest: ChunkDigest,
}

pub fn chunk_digest(chunk_file: &[u8]) -> ChunkDigest {
    *blake3::hash(chunk_file).as_bytes()
}

/// Serializes the chunk sequence.
pub fn encode_chunks(chunks: &[String]) -> String {
    chunks.join(CHUNK_SEPARATOR)
}

/// Parses a chunk file. Pieces are trimmed and empty pieces dropped.
pub fn decode_chunks(text: &str) -> Vec<String> {
    text.split(CHUNK_SEPARATOR)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fails with [`RetrieverError::SeparatorCollision`] on the first chunk holding the marker.
pub fn check_separator(chunks: &[String]) -> Result<()> {
    match chunks.iter().position(|c| c.contains(SEPARATOR_MARKER)) {
        Some(ordinal) => Err(RetrieverError::SeparatorCollision { ordinal }),
        None => Ok(()),
    }
}

/// Serializes `index` with a header binding it to the chunk file with `digest`.
pub fn encode_index(index: &FlatIndex, digest: &ChunkDigest) -> Vec<u8> {
    let values = index.as_slice();
    let mut out = Vec::with_capacity(HEADER_LEN + values.len() * 4);

    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&index.metric().tag().to_le_bytes());
    out.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    out.extend_from_slice(digest);

    let le_bits: Vec<u32> = values.iter().map(|v| v.to_bits().to_le()).collect();
    out.extend_from_slice(bytemuck::cast_slice(&le_bits));
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<IndexHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(RetrieverError::corrupt(format!(
            "index blob is {} bytes, shorter than its {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if &bytes[0..4] != INDEX_MAGIC {
        return Err(RetrieverError::corrupt("index blob has the wrong magic bytes"));
    }

    let version = read_u32(bytes, 4);
    if version != FORMAT_VERSION {
        return Err(RetrieverError::corrupt(format!(
            "unsupported index format version {version}"
        )));
    }
    let metric = Metric::from_tag(read_u32(bytes, 8))
        .ok_or_else(|| RetrieverError::corrupt("unknown metric tag"))?;
    let dimension = read_u32(bytes, 12) as usize;
    let count = usize::try_from(read_u64(bytes, 16))
        .map_err(|_| RetrieverError::corrupt("vector count does not fit in memory"))?;

    let mut chunk_digest = [0u8; 32];
    chunk_digest.copy_from_slice(&bytes[24..HEADER_LEN]);

    Ok(IndexHeader {
        version,
        metric,
        dimension,
        count,
        chunk_digest,
    })
}

/// Parses an index blob, checking the payload length against the header.
pub fn decode_index(bytes: &[u8]) -> Result<(IndexHeader, FlatIndex)> {
    let header = decode_header(bytes)?;

    let expected_len = header
        .count
        .checked_mul(header.dimension)
        .and_then(|values| values.checked_mul(4))
        .and_then(|payload| payload.checked_add(HEADER_LEN))
        .ok_or_else(|| RetrieverError::corrupt("index header sizes overflow"))?;
    if bytes.len() != expected_len {
        return Err(RetrieverError::corrupt(format!(
            "index blob is {} bytes, header describes {expected_len}",
            bytes.len()
        )));
    }

    let le_bits: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes[HEADER_LEN..]);
    let values = le_bits
        .into_iter()
        .map(|bits| f32::from_bits(u32::from_le(bits)))
        .collect();

    let index = FlatIndex::from_raw(header.dimension, values).map_err(|err| match err {
        RetrieverError::EmptyIndex => RetrieverError::corrupt("index blob holds no vectors"),
        other => other,
    })?;
    Ok((header, index))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}
