//! Upload and question answering pipeline.
//!
//! Upload: extract → normalize → chunk → embed → store.
//! Query: validate → embed query → search → generate (or short-circuit).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::chunker::TextChunker;
use super::embedding::{Embedder, EmbeddingClient};
use super::extractor::ExtractorRegistry;
use super::generation::{GenerationClient, Generator};
use super::vector_store::{VectorStore, create_backend};
use crate::error::{ExtractError, PipelineError};
use crate::models::{
    Answer, ChunkMetadata, Config, EmptyContextPolicy, IngestReport, QueryConfig, Question,
    RetrievedChunk, StoreBatch, chunk_id,
};
use crate::utils::{file_extension, has_meaningful_content, normalize_extracted};

/// The services one upload or query runs through.
///
/// Holds no per-document state; one instance is shared by every request.
pub struct RagPipeline {
    extractors: Arc<ExtractorRegistry>,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    query: QueryConfig,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        chunker: TextChunker,
        query: QueryConfig,
    ) -> Self {
        Self {
            extractors: Arc::new(ExtractorRegistry::with_defaults()),
            chunker,
            embedder,
            store,
            generator,
            query,
        }
    }

    /// Build the Gemini clients and the configured store backend.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        let embedder = EmbeddingClient::new(&config.gemini, &config.embedding)?;
        let generator = GenerationClient::new(&config.gemini, &config.generation)?;
        let store = create_backend(
            &config.vector_store,
            u64::from(config.embedding.dimension),
        )
        .await?;

        Ok(Self::new(
            Arc::new(embedder),
            Arc::from(store),
            Arc::new(generator),
            chunker,
            config.query.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Whether `filename` has an extension the pipeline can extract.
    pub fn accepts(&self, filename: &str) -> bool {
        file_extension(filename).is_some_and(|ext| self.extractors.supports(&ext))
    }

    /// Extract, chunk, embed and store the file at `path` under `filename`.
    pub async fn ingest(&self, path: &Path, filename: &str) -> Result<IngestReport, PipelineError> {
        let started = Instant::now();

        let extension = file_extension(filename).unwrap_or_default();
        if !self.extractors.supports(&extension) {
            return Err(ExtractError::Unsupported(extension).into());
        }

        let text = self.extract(path, &extension, filename).await?;
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            return Err(PipelineError::EmptyText(filename.to_string()));
        }
        debug!(
            filename,
            chunks = chunks.len(),
            chunk_size = self.chunker.chunk_size(),
            overlap = self.chunker.overlap(),
            "chunked document"
        );

        self.store.open_collection().await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        let uploaded_at = chrono::Utc::now().to_rfc3339();
        let total = chunks.len() as u32;
        let metadatas = chunks
            .iter()
            .map(|c| ChunkMetadata::for_chunk(filename, c, total, &uploaded_at))
            .collect();
        let ids = chunks
            .iter()
            .map(|c| chunk_id(filename, c.index, &c.text))
            .collect();

        let batch = StoreBatch::new(texts, embeddings, metadatas, ids)?;
        self.store.add(batch).await?;

        let report = IngestReport {
            filename: filename.to_string(),
            characters: text.chars().count(),
            chunks: chunks.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            filename,
            chunks = report.chunks,
            characters = report.characters,
            duration_ms = report.duration_ms,
            "document ingested"
        );
        Ok(report)
    }

    async fn extract(
        &self,
        path: &Path,
        extension: &str,
        filename: &str,
    ) -> Result<String, PipelineError> {
        let registry = Arc::clone(&self.extractors);
        let path = path.to_path_buf();
        let ext = extension.to_string();

        let extracted = tokio::task::spawn_blocking(move || registry.extract(&path, &ext))
            .await
            .map_err(|e| ExtractError::failed(extension, format!("extraction task failed: {e}")))?;

        let raw = match extracted {
            Ok(raw) => raw,
            Err(ExtractError::NoText(_)) => {
                return Err(PipelineError::EmptyText(filename.to_string()));
            }
            Err(e) => {
                warn!(filename, error = %e, "extraction failed");
                return Err(e.into());
            }
        };

        let text = normalize_extracted(&raw);
        if !has_meaningful_content(&text) {
            return Err(PipelineError::EmptyText(filename.to_string()));
        }
        Ok(text)
    }

    /// Embed `query` and return the nearest chunks, restricted to `documents`
    /// when it is non-empty.
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: u32,
        documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        self.store.open_collection().await?;
        let vector = self.embedder.embed_query(query).await?;
        let hits = self
            .store
            .search(vector, u64::from(n_results), documents)
            .await?;
        Ok(hits)
    }

    /// Answer a question from the stored documents.
    pub async fn answer(&self, question: &Question) -> Result<Answer, PipelineError> {
        let started = Instant::now();

        let query = question.query.trim();
        if query.is_empty() {
            return Err(PipelineError::Validation("query must not be empty".to_string()));
        }
        let n_results = question.n_results.unwrap_or(self.query.n_results);
        if n_results == 0 {
            return Err(PipelineError::Validation(
                "n_results must be at least 1".to_string(),
            ));
        }
        let documents: Vec<String> = question
            .document_names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let sources = self.retrieve(query, n_results, &documents).await?;
        debug!(hits = sources.len(), filter = documents.len(), "retrieved context");

        let (response, generated) = if sources.is_empty()
            && self.query.empty_context == EmptyContextPolicy::ShortCircuit
        {
            info!("no relevant context, skipping generation");
            (self.query.no_context_message.clone(), false)
        } else {
            let context: Vec<String> = sources.iter().map(|c| c.text.clone()).collect();
            (self.generator.generate(query, &context).await?, true)
        };

        let answer = Answer {
            query: question.query.clone(),
            response,
            sources,
            generated,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            sources = answer.sources.len(),
            generated = answer.generated,
            duration_ms = answer.duration_ms,
            "question answered"
        );
        Ok(answer)
    }

    /// Stored document names, sorted.
    pub async fn documents(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self.store.list_documents().await?.into_iter().collect())
    }
}
