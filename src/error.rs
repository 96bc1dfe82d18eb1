//! Error types for the document question answering service.

use thiserror::Error;

use crate::client::ApiFailure;
use crate::utils::retry::Retryable;

/// Errors related to text extraction from uploaded files.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("{format} extraction failed: {message}")]
    Failed { format: String, message: String },

    #[error("{0} extraction produced no text")]
    NoText(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn failed(format: impl Into<String>, message: impl ToString) -> Self {
        ExtractError::Failed {
            format: format.into(),
            message: message.to_string(),
        }
    }
}

/// Errors related to chunking parameters.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid chunk parameters: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidParameters { chunk_size: usize, overlap: usize },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    ConnectionError(String),

    #[error("embedding service error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("embedding API key is not configured")]
    MissingApiKey,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::MissingApiKey => false,
        }
    }
}

impl From<ApiFailure> for EmbeddingError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::MissingApiKey => EmbeddingError::MissingApiKey,
            ApiFailure::Timeout => EmbeddingError::Timeout,
            ApiFailure::Connect(msg) => EmbeddingError::ConnectionError(msg),
            ApiFailure::Status { status, body } => {
                EmbeddingError::ServerError(format!("status {status}: {body}"))
            }
            ApiFailure::Request(e) => EmbeddingError::RequestError(e),
            ApiFailure::Decode(msg) => EmbeddingError::InvalidResponse(msg),
        }
    }
}

/// Errors related to answer generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to connect to generation service: {0}")]
    ConnectionError(String),

    #[error("generation service error: {0}")]
    ServerError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation timeout")]
    Timeout,

    #[error("generation API key is not configured")]
    MissingApiKey,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ConnectionError(_) | GenerationError::Timeout => true,
            GenerationError::ServerError(msg) => is_transient_status(msg),
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GenerationError::InvalidResponse(_) | GenerationError::MissingApiKey => false,
        }
    }
}

impl From<ApiFailure> for GenerationError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::MissingApiKey => GenerationError::MissingApiKey,
            ApiFailure::Timeout => GenerationError::Timeout,
            ApiFailure::Connect(msg) => GenerationError::ConnectionError(msg),
            ApiFailure::Status { status, body } => {
                GenerationError::ServerError(format!("status {status}: {body}"))
            }
            ApiFailure::Request(e) => GenerationError::RequestError(e),
            ApiFailure::Decode(msg) => GenerationError::InvalidResponse(msg),
        }
    }
}

/// Server errors that might be transient: 429 and 5xx.
fn is_transient_status(msg: &str) -> bool {
    let code = msg
        .strip_prefix("status ")
        .and_then(|rest| rest.get(..3))
        .and_then(|code| code.parse::<u16>().ok());

    match code {
        Some(code) => code == 429 || (500..600).contains(&code),
        None => {
            let lower = msg.to_lowercase();
            lower.contains("unavailable") || lower.contains("too many requests")
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("write error: {0}")]
    WriteError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error(
        "batch length mismatch: documents={documents}, embeddings={embeddings}, metadatas={metadatas}, ids={ids}"
    )]
    LengthMismatch {
        documents: usize,
        embeddings: usize,
        metadatas: usize,
        ids: usize,
    },

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

/// Errors raised by the ingest and query pipeline, tagged by stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("document contains no extractable text: {0}")]
    EmptyText(String),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] VectorStoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl PipelineError {
    /// Name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validate",
            PipelineError::Extract(_) | PipelineError::EmptyText(_) => "extract",
            PipelineError::Chunk(_) => "chunk",
            PipelineError::Embedding(_) => "embed",
            PipelineError::Store(VectorStoreError::SearchError(_)) => "retrieve",
            PipelineError::Store(_) => "store",
            PipelineError::Generation(_) => "generate",
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
