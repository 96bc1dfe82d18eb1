//! Qdrant vector store backend implementation.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PayloadIncludeSelector, PointId,
    PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CollectionInfo, FILENAME_FIELD, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{RetrievedChunk, StoreBatch, StoreRecord, VectorStoreConfig};

const SCROLL_PAGE: u32 = 256;

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    /// Qdrant point ids must be integers or UUIDs, so chunk ids are mapped to
    /// a name-based UUID and kept verbatim in the payload.
    pub fn point_id(chunk_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }

    fn to_point(record: StoreRecord) -> PointStruct {
        let meta = record.metadata;
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert("chunk_id".to_string(), record.id.clone().into());
        payload.insert("document".to_string(), record.document.into());
        payload.insert(FILENAME_FIELD.to_string(), meta.filename.into());
        payload.insert("chunk_index".to_string(), i64::from(meta.chunk_index).into());
        payload.insert("total_chunks".to_string(), i64::from(meta.total_chunks).into());
        payload.insert("start_offset".to_string(), (meta.start_offset as i64).into());
        payload.insert("end_offset".to_string(), (meta.end_offset as i64).into());
        payload.insert("uploaded_at".to_string(), meta.uploaded_at.into());

        PointStruct::new(Self::point_id(&record.id), record.embedding, payload)
    }

    fn document_filter(documents: &[String]) -> Option<Filter> {
        if documents.is_empty() {
            return None;
        }
        let conditions: Vec<Condition> = documents
            .iter()
            .map(|name| Condition::matches(FILENAME_FIELD, name.clone()))
            .collect();
        Some(Filter::should(conditions))
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(n) => Some(*n),
        _ => None,
    }
}

fn is_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not found") || lower.contains("doesn't exist")
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if is_not_found(&msg) {
                    Ok(None)
                } else {
                    Err(VectorStoreError::Unavailable(msg))
                }
            }
        }
    }

    async fn open_collection(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
        if exists {
            return Ok(());
        }

        info!(collection = %self.collection, dim = self.embedding_dim, "creating collection");
        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        match self.client.create_collection(create_collection).await {
            Ok(_) => Ok(()),
            // Lost a creation race with another writer.
            Err(e) if e.to_string().contains("already exists") => Ok(()),
            Err(e) => Err(VectorStoreError::Unavailable(e.to_string())),
        }
    }

    async fn add(&self, batch: StoreBatch) -> Result<(), VectorStoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let points: Vec<PointStruct> = batch.into_records().map(Self::to_point).collect();
        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::WriteError(e.to_string()))?;

        debug!(collection = %self.collection, count, "upserted points");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        if let Some(filter) = Self::document_filter(documents) {
            search_builder = search_builder.filter(filter);
        }

        let results = match self.client.search_points(search_builder).await {
            Ok(results) => results,
            Err(e) if is_not_found(&e.to_string()) => return Ok(Vec::new()),
            Err(e) => return Err(VectorStoreError::SearchError(e.to_string())),
        };

        let chunks = results
            .result
            .into_iter()
            .map(|point| {
                let payload = &point.payload;
                RetrievedChunk {
                    id: payload_str(payload, "chunk_id").unwrap_or_default(),
                    text: payload_str(payload, "document").unwrap_or_default(),
                    filename: payload_str(payload, FILENAME_FIELD).unwrap_or_default(),
                    chunk_index: payload_int(payload, "chunk_index").unwrap_or(0) as u32,
                    score: point.score,
                }
            })
            .collect();

        Ok(chunks)
    }

    async fn list_documents(&self) -> Result<BTreeSet<String>, VectorStoreError> {
        let mut filenames = BTreeSet::new();
        if self.collection_info().await?.is_none() {
            return Ok(filenames);
        }

        let mut offset: Option<PointId> = None;
        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(PayloadIncludeSelector {
                    fields: vec![FILENAME_FIELD.to_string()],
                })
                .with_vectors(false);

            if let Some(off) = offset {
                scroll_builder = scroll_builder.offset(off);
            }

            let response = self
                .client
                .scroll(scroll_builder)
                .await
                .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

            filenames.extend(
                response
                    .result
                    .iter()
                    .filter_map(|point| payload_str(&point.payload, FILENAME_FIELD)),
            );

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(filenames)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
