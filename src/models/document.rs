use serde::{Deserialize, Serialize};

use crate::error::VectorStoreError;
use crate::utils::calculate_checksum;

/// Hex characters of the content hash kept in a chunk id.
const CHUNK_HASH_LEN: usize = 12;

/// A window of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub text: String,
    /// Character offset of the first char (inclusive).
    pub start: usize,
    /// Character offset one past the last char.
    pub end: usize,
}

/// Metadata stored next to every chunk vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub start_offset: u64,
    pub end_offset: u64,
    pub uploaded_at: String,
}

impl ChunkMetadata {
    pub fn for_chunk(filename: &str, chunk: &Chunk, total_chunks: u32, uploaded_at: &str) -> Self {
        Self {
            filename: filename.to_string(),
            chunk_index: chunk.index,
            total_chunks,
            start_offset: chunk.start as u64,
            end_offset: chunk.end as u64,
            uploaded_at: uploaded_at.to_string(),
        }
    }
}

/// Build the store id for a chunk: `{filename}_{chunk_index}_{short content hash}`.
///
/// Re-uploading identical content yields identical ids, so store writes can be retried.
pub fn chunk_id(filename: &str, chunk_index: u32, text: &str) -> String {
    let checksum = calculate_checksum(text.as_bytes());
    let short = &checksum[..CHUNK_HASH_LEN];
    format!("{filename}_{chunk_index}_{short}")
}

/// A set of chunks ready to be written to a vector store.
///
/// All four columns have the same length; the constructor is the only way to build one.
#[derive(Debug, Clone)]
pub struct StoreBatch {
    documents: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Vec<ChunkMetadata>,
    ids: Vec<String>,
}

/// One row of a [`StoreBatch`].
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl StoreBatch {
    pub fn new(
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        ids: Vec<String>,
    ) -> Result<Self, VectorStoreError> {
        let n = documents.len();
        if embeddings.len() != n || metadatas.len() != n || ids.len() != n {
            return Err(VectorStoreError::LengthMismatch {
                documents: n,
                embeddings: embeddings.len(),
                metadatas: metadatas.len(),
                ids: ids.len(),
            });
        }

        Ok(Self {
            documents,
            embeddings,
            metadatas,
            ids,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_records(self) -> impl Iterator<Item = StoreRecord> {
        self.ids
            .into_iter()
            .zip(self.documents)
            .zip(self.embeddings)
            .zip(self.metadatas)
            .map(|(((id, document), embedding), metadata)| StoreRecord {
                id,
                document,
                embedding,
                metadata,
            })
    }
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub filename: String,
    pub chunk_index: u32,
    /// Cosine similarity, higher is nearer.
    pub score: f32,
}
