//! Query and ingest result models.

use serde::{Deserialize, Serialize};

use super::document::RetrievedChunk;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A question plus the documents it may draw context from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Question {
    pub query: String,

    /// Restrict retrieval to these filenames; empty means all documents.
    #[serde(default)]
    pub document_names: Vec<String>,

    /// Overrides the configured result count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_results: Option<u32>,
}

impl Question {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_documents(mut self, names: Vec<String>) -> Self {
        self.document_names = names;
        self
    }

    pub fn with_n_results(mut self, n: u32) -> Self {
        self.n_results = Some(n);
        self
    }
}

/// Result of answering a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub response: String,
    /// Chunks handed to the model, nearest first.
    pub sources: Vec<RetrievedChunk>,
    /// False when the model was skipped because nothing was retrieved.
    pub generated: bool,
    pub duration_ms: u64,
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub filename: String,
    pub characters: usize,
    pub chunks: usize,
    pub duration_ms: u64,
}
