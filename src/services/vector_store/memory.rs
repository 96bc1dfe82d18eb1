//! In-process vector store using cosine similarity.
//!
//! Nothing is persisted. Useful offline and as the store behind tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{RetrievedChunk, StoreBatch, StoreRecord};

#[derive(Debug)]
pub struct MemoryBackend {
    collection: String,
    /// `None` until the collection is opened: chunk id → record.
    points: RwLock<Option<HashMap<String, StoreRecord>>>,
}

impl MemoryBackend {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            points: RwLock::new(None),
        }
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let points = self.points.read().await;
        Ok(points.as_ref().map(|p| CollectionInfo {
            points_count: p.len() as u64,
        }))
    }

    async fn open_collection(&self) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().await;
        points.get_or_insert_with(HashMap::new);
        Ok(())
    }

    async fn add(&self, batch: StoreBatch) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().await;
        let store = points.as_mut().ok_or_else(|| {
            VectorStoreError::CollectionError(format!(
                "collection '{}' does not exist",
                self.collection
            ))
        })?;

        for record in batch.into_records() {
            store.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let points = self.points.read().await;
        let Some(store) = points.as_ref() else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<RetrievedChunk> = store
            .values()
            .filter(|r| documents.is_empty() || documents.contains(&r.metadata.filename))
            .map(|r| RetrievedChunk {
                id: r.id.clone(),
                text: r.document.clone(),
                filename: r.metadata.filename.clone(),
                chunk_index: r.metadata.chunk_index,
                score: cosine_similarity(&r.embedding, &query_vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit as usize);
        Ok(scored)
    }

    async fn list_documents(&self) -> Result<BTreeSet<String>, VectorStoreError> {
        let points = self.points.read().await;
        Ok(points
            .iter()
            .flat_map(|store| store.values())
            .map(|r| r.metadata.filename.clone())
            .collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
