mod chunker;
mod embedding;
pub mod extractor;
mod generation;
mod metrics;
mod pipeline;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{TextChunker, chunk_text};
pub use embedding::{Embedder, EmbeddingClient};
pub use extractor::{ExtractionStrategy, ExtractorRegistry, FormatExtractor};
pub use generation::{GenerationClient, Generator, build_prompt};
pub use metrics::{MetricsStore, MetricsSummary, Operation};
pub use pipeline::RagPipeline;
pub use vector_store::{CollectionInfo, VectorStore, create_backend};
