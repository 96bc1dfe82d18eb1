//! Vector store abstraction layer.
//!
//! A trait over the chunk stores (Qdrant, PostgreSQL/pgvector, in-process
//! memory) so the pipeline can switch backends by configuration.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{RetrievedChunk, StoreBatch, VectorDriver, VectorStoreConfig};

/// Payload field holding the source filename of a chunk.
pub const FILENAME_FIELD: &str = "filename";

/// Collection/table information
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Operations every chunk store supports.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Returns None if the collection doesn't exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Get or create the collection. Idempotent.
    async fn open_collection(&self) -> Result<(), VectorStoreError>;

    /// Upsert a batch of chunks. Re-adding the same ids overwrites them.
    async fn add(&self, batch: StoreBatch) -> Result<(), VectorStoreError>;

    /// Nearest chunks by cosine similarity, best first.
    ///
    /// A non-empty `documents` restricts hits to chunks of those filenames.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError>;

    /// Distinct filenames of all stored chunks.
    async fn list_documents(&self) -> Result<BTreeSet<String>, VectorStoreError>;

    /// Get the collection/table name.
    fn collection(&self) -> &str;
}

/// Create a vector store backend based on configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, embedding_dim)?;
            Ok(Box::new(backend))
        }
        VectorDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config, embedding_dim).await?;
            Ok(Box::new(backend))
        }
        VectorDriver::Memory => Ok(Box::new(MemoryBackend::new(&config.collection))),
    }
}
