//! Sliding-window text chunker.
//!
//! Splits a document's text into overlapping [`Chunk`]s of at most
//! `chunk_size` characters. Consecutive windows overlap by
//! `floor(overlap_ratio × chunk_size)` characters.
//!
//! Each chunk receives a deterministic id derived from its document id
//! and index.
//!
//! # Algorithm
//!
//! 1. `overlap = floor(chunk_size × overlap_ratio)`,
//!    `step = max(chunk_size − overlap, 1)`.
//! 2. Place a window `[start, min(start + chunk_size, len))` at `start = 0`.
//! 3. Emit it. If the window reached the end of the text, stop.
//! 4. Otherwise advance `start` by `step` and repeat while `start < len`.
//!
//! Offsets are counted in Unicode scalar values, never bytes, so a window
//! never splits a multi-byte character.
//!
//! # Example
//!
//! ```rust
//! use ragbench_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(1000, 0.5).unwrap();
//! let text = "x".repeat(2500);
//! let chunks = chunk_text("doc-1", &text, &params);
//! let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(spans, vec![(0, 1000), (500, 1500), (1000, 2000), (1500, 2500)]);
//! ```


use crate::error::{CoreError, Result};
use crate::models::{Chunk, Document};

/// Validated chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap_ratio: f64,
}

impl ChunkParams {
    /// Fails with [`CoreError::InvalidParameter`] unless `chunk_size > 0`
    /// and `overlap_ratio ∈ [0, 1)`.
    pub fn new(chunk_size: usize, overlap_ratio: f64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoreError::InvalidParameter(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&overlap_ratio) {
            return Err(CoreError::InvalidParameter(format!(
                "overlap_ratio must be in [0, 1), got {}",
                overlap_ratio
            )));
        }
        Ok(Self {
            chunk_size,
            overlap_ratio,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap_ratio(&self) -> f64 {
        self.overlap_ratio
    }

    /// Characters shared by two consecutive windows.
    pub fn overlap(&self) -> usize {
        ((self.chunk_size as f64) * self.overlap_ratio).floor() as usize
    }

    /// Distance between consecutive window starts. Always at least 1.
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap()).max(1)
    }
}

/// Chunk a document, validating the raw parameters first.
///
/// Empty text yields an empty sequence, not an error.
pub fn chunk(document: &Document, chunk_size: usize, overlap_ratio: f64) -> Result<Vec<Chunk>> {
    let params = ChunkParams::new(chunk_size, overlap_ratio)?;
    Ok(chunk_document(document, &params))
}

/// Chunk a document with pre-validated parameters.
pub fn chunk_document(document: &Document, params: &ChunkParams) -> Vec<Chunk> {
    chunk_text(&document.id, &document.text, params)
}

/// Chunk every document of a corpus, preserving document order.
pub fn chunk_corpus(documents: &[Document], params: &ChunkParams) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_document(doc, params))
        .collect()
}

/// Split `text` into sliding windows.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - `start_i < start_{i+1} ≤ end_i` for consecutive chunks.
/// - `end_i − start_i ≤ chunk_size`; only the last chunk may be shorter.
/// - The last chunk ends at the end of the text.
pub fn chunk_text(document_id: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < len {
        let end = (start + params.chunk_size).min(len);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(document_id, chunks.len(), start, end, piece));
        if end == len {
            break;
        }
        start += params.step();
    }

    chunks
}

/// Create a single [`Chunk`] with a deterministic id.
fn make_chunk(document_id: &str, index: usize, start: usize, end: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("{}#{}", document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        start,
        end,
        text: text.to_string(),
        embedding: None,
    }
}

/// Rebuild the original text from an ordered chunk sequence by dropping
/// the overlapping prefix of every chunk after the first.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for c in chunks {
        let skip = covered.saturating_sub(c.start);
        out.extend(c.text.chars().skip(skip));
        covered = covered.max(c.end);
    }
    out
}
