//! Text chunking with overlap for embedding.

use crate::error::ChunkError;
use crate::models::{Chunk, ChunkingConfig};

/// Splits text into fixed-size, overlapping windows measured in characters.
///
/// Windows start `chunk_size - overlap` characters apart. The last window is
/// pulled back so that it ends exactly at the end of the text, so no chunk is
/// shorter than `chunk_size` unless the whole text is.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(ChunkError::InvalidParameters {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkError> {
        Self::new(config.chunk_size, config.overlap)
    }

    /// Create a chunker with default settings (1000 / 100).
    pub fn with_defaults() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks. Empty text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::new();
        let mut next_start = 0usize;

        loop {
            let (start, end) = if next_start + self.chunk_size >= total_chars {
                (total_chars.saturating_sub(self.chunk_size), total_chars)
            } else {
                (next_start, next_start + self.chunk_size)
            };

            chunks.push(Chunk {
                index: chunks.len() as u32,
                text: text[boundaries[start]..boundaries[end]].to_string(),
                start,
                end,
            });

            if end == total_chars {
                break;
            }
            next_start += step;
        }

        chunks
    }
}

/// Split `text` with explicit parameters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    Ok(TextChunker::new(chunk_size, overlap)?.split(text))
}
