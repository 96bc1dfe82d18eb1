//! Deterministic stand-ins for the external services, shared by tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::generation::Generator;
use super::pipeline::RagPipeline;
use super::vector_store::{CollectionInfo, MemoryBackend, VectorStore};
use crate::error::{EmbeddingError, GenerationError, VectorStoreError};
use crate::models::{EmptyContextPolicy, QueryConfig, RetrievedChunk, StoreBatch};

/// Bag-of-words embedder: each lower-cased word bumps one hashed dimension.
pub struct HashEmbedder {
    fail: bool,
    document_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl HashEmbedder {
    pub const DIMENSION: usize = 256;

    pub fn new() -> Self {
        Self {
            fail: false,
            document_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; Self::DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x100000001b3)
                });
            vector[(hash % Self::DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::ServerError("status 500: boom".to_string()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::ServerError("status 500: boom".to_string()));
        }
        Ok(Self::vector(text))
    }
}

/// Records every call and answers with [`RecordingGenerator::ANSWER`].
#[derive(Default)]
pub struct RecordingGenerator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingGenerator {
    pub const ANSWER: &'static str = "generated answer";

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), context.to_vec()));
        Ok(Self::ANSWER.to_string())
    }
}

/// A store that cannot be reached.
pub struct DownStore;

fn down() -> VectorStoreError {
    VectorStoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl VectorStore for DownStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Err(down())
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        Err(down())
    }

    async fn open_collection(&self) -> Result<(), VectorStoreError> {
        Err(down())
    }

    async fn add(&self, _batch: StoreBatch) -> Result<(), VectorStoreError> {
        Err(down())
    }

    async fn search(
        &self,
        _query_vector: Vec<f32>,
        _limit: u64,
        _documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        Err(down())
    }

    async fn list_documents(&self) -> Result<BTreeSet<String>, VectorStoreError> {
        Err(down())
    }

    fn collection(&self) -> &str {
        "down"
    }
}

/// A pipeline over the memory store with handles to inspect the fakes.
pub fn pipeline_with(
    policy: EmptyContextPolicy,
) -> (RagPipeline, Arc<HashEmbedder>, Arc<RecordingGenerator>) {
    let embedder = Arc::new(HashEmbedder::new());
    let generator = Arc::new(RecordingGenerator::default());
    let query = QueryConfig {
        empty_context: policy,
        ..Default::default()
    };

    let pipeline = RagPipeline::new(
        embedder.clone(),
        Arc::new(MemoryBackend::new("documents")),
        generator.clone(),
        TextChunker::with_defaults(),
        query,
    );
    (pipeline, embedder, generator)
}
