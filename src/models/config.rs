use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::query::OutputFormat;
use crate::error::ConfigError;

pub const APP_NAME: &str = "docqa";
pub const PROJECT_CONFIG_DIR: &str = ".docqa";
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
pub const DEFAULT_GENERATION_MODEL: &str = "models/gemini-1.5-flash";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;
pub const DEFAULT_FALLBACK_ANSWER: &str = "No answer available.";
pub const DEFAULT_NO_CONTEXT_MESSAGE: &str =
    "No relevant information found in the uploaded documents.";

/// Gemini allows at most 100 requests per batchEmbedContents call.
pub const MAX_EMBEDDING_BATCH: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration after merging every layer, with the files that contributed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: Config,
    pub global_path: Option<PathBuf>,
    pub project_path: Option<PathBuf>,
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn project_config_dir() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|p| p.join(PROJECT_CONFIG_DIR))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join(APP_NAME))
    }

    pub fn metrics_db_path() -> Option<PathBuf> {
        Self::data_dir().map(|p| p.join("metrics.db"))
    }

    /// Load defaults, then the global file, then the project file, then the environment.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let global_path = Self::global_path().filter(|p| p.exists());
        let project_path = Self::project_config_dir()
            .map(|d| d.join(CONFIG_FILE))
            .filter(|p| p.exists());

        let mut merged = toml::Table::new();
        for path in global_path.iter().chain(project_path.iter()) {
            let layer = read_table(path)?;
            merge_tables(&mut merged, layer);
        }

        let config = Self::from_table(merged)?;

        Ok(ResolvedConfig {
            config,
            global_path,
            project_path,
        })
    }

    /// Deserialize merged file layers over the defaults, then apply the environment.
    fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let mut config: Config = toml::Value::Table(table).try_into()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(key) = env_non_empty("GEMINI_API_KEY").or_else(|| env_non_empty("GOOGLE_API_KEY"))
        {
            self.gemini.api_key = Some(key);
        }
        if let Some(url) = env_non_empty("DOCQA_VECTOR_URL") {
            self.vector_store.url = url;
        }
        if let Some(collection) = env_non_empty("DOCQA_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Some(bind) = env_non_empty("DOCQA_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if chunking.overlap >= chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.overlap, chunking.chunk_size
            )));
        }
        if self.query.n_results == 0 {
            return Err(ConfigError::ValidationError(
                "query.n_results must be at least 1".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 || self.embedding.batch_size > MAX_EMBEDDING_BATCH {
            return Err(ConfigError::ValidationError(format!(
                "embedding.batch_size must be between 1 and {MAX_EMBEDDING_BATCH}"
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Write a default config file to the global location.
    pub fn init_global() -> Result<PathBuf, ConfigError> {
        let path = Self::global_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        Self::default().save_to(&path)?;
        Ok(path)
    }

    /// Write a default config file to `./.docqa/config.toml`.
    pub fn init_project() -> Result<PathBuf, ConfigError> {
        let dir = Self::project_config_dir().ok_or_else(|| {
            ConfigError::PathError("could not determine current directory".to_string())
        })?;
        let path = dir.join(CONFIG_FILE);
        Self::default().save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Recursively merge `overlay` into `base`; scalar values in `overlay` win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let toml::Value::Table(overlay_inner) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(base_inner)) = base.get_mut(&key) {
            merge_tables(base_inner, overlay_inner);
            continue;
        }
        base.insert(key, toml::Value::Table(overlay_inner));
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_gemini_url() -> String {
    DEFAULT_GEMINI_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_url(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    MAX_EMBEDDING_BATCH
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_fallback_answer() -> String {
    DEFAULT_FALLBACK_ANSWER.to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
    /// In-process store; contents are lost when the process exits.
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// PostgreSQL schema holding the collection table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_store_timeout() -> u64 {
    30
}

impl VectorStoreConfig {
    pub fn qualified_table_name(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}.{}", schema, self.collection),
            None => self.collection.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    100
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

/// What to do when retrieval finds no context for a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Answer with `no_context_message` without calling the model.
    #[default]
    ShortCircuit,
    /// Call the model with an empty context.
    Generate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_n_results")]
    pub n_results: u32,

    #[serde(default)]
    pub empty_context: EmptyContextPolicy,

    #[serde(default = "default_no_context_message")]
    pub no_context_message: String,
}

fn default_n_results() -> u32 {
    5
}

fn default_no_context_message() -> String {
    DEFAULT_NO_CONTEXT_MESSAGE.to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            empty_context: EmptyContextPolicy::default(),
            no_context_message: default_no_context_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Directory for temporary upload files; the system temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,

    /// Origins allowed to call the API from a browser. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}
