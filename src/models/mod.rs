mod config;
mod document;
mod query;

pub use config::{
    CONFIG_FILE, ChunkingConfig, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_FALLBACK_ANSWER, DEFAULT_GEMINI_URL,
    DEFAULT_GENERATION_MODEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_NO_CONTEXT_MESSAGE,
    DEFAULT_QDRANT_URL, EmbeddingConfig, EmptyContextPolicy, GeminiConfig, GenerationConfig,
    MetricsConfig, OutputConfig, QueryConfig, ResolvedConfig, ServerConfig, VectorDriver,
    VectorStoreConfig,
};
pub use document::{Chunk, ChunkMetadata, RetrievedChunk, StoreBatch, StoreRecord, chunk_id};
pub use query::{Answer, IngestReport, OutputFormat, Question};
