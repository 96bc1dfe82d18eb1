use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::{debug, info};

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{RetrievedChunk, StoreBatch, VectorStoreConfig};

pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    collection: String,
    schema: Option<String>,
    embedding_dim: u64,
}

impl PgVectorBackend {
    pub async fn new(
        config: &VectorStoreConfig,
        embedding_dim: u64,
    ) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.qualified_table_name(),
            collection: config.collection.clone(),
            schema: config.schema.clone(),
            embedding_dim,
        };

        backend.check_pgvector_extension().await?;

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    fn schema_name(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

fn create_table_sql(table: &str, dim: u64) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            start_offset BIGINT NOT NULL,
            end_offset BIGINT NOT NULL,
            uploaded_at TEXT NOT NULL,
            embedding vector({dim}) NOT NULL
        )
        "#
    )
}

fn index_sql(collection: &str, table: &str) -> [String; 2] {
    [
        format!(
            "CREATE INDEX IF NOT EXISTS {collection}_embedding_idx ON {table} USING hnsw (embedding vector_cosine_ops)"
        ),
        format!("CREATE INDEX IF NOT EXISTS {collection}_filename_idx ON {table} (filename)"),
    ]
}

fn search_sql(table: &str, filtered: bool, limit: u64) -> String {
    let where_clause = if filtered {
        "WHERE filename = ANY($2)"
    } else {
        ""
    };
    format!(
        r#"
        SELECT id, document, filename, chunk_index,
               1 - (embedding <=> $1) AS score
        FROM {table}
        {where_clause}
        ORDER BY embedding <=> $1
        LIMIT {limit}
        "#
    )
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let table_exists: Option<(String,)> = sqlx::query_as(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
        )
        .bind(self.schema_name())
        .bind(&self.collection)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        if table_exists.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) as count FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(Some(CollectionInfo {
            points_count: row.0 as u64,
        }))
    }

    async fn open_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        info!(table = %self.table_name, dim = self.embedding_dim, "creating table");

        if let Some(ref schema) = self.schema {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
        }

        sqlx::query(&create_table_sql(&self.table_name, self.embedding_dim))
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        for statement in &index_sql(&self.collection, &self.table_name) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
        }

        Ok(())
    }

    async fn add(&self, batch: StoreBatch) -> Result<(), VectorStoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, document, filename, chunk_index, total_chunks,
                            start_offset, end_offset, uploaded_at, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                document = EXCLUDED.document,
                filename = EXCLUDED.filename,
                chunk_index = EXCLUDED.chunk_index,
                total_chunks = EXCLUDED.total_chunks,
                start_offset = EXCLUDED.start_offset,
                end_offset = EXCLUDED.end_offset,
                uploaded_at = EXCLUDED.uploaded_at,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        );

        let count = batch.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::WriteError(e.to_string()))?;

        for record in batch.into_records() {
            let meta = record.metadata;
            let embedding = Vector::from(record.embedding);

            sqlx::query(&query)
                .bind(&record.id)
                .bind(&record.document)
                .bind(&meta.filename)
                .bind(meta.chunk_index as i32)
                .bind(meta.total_chunks as i32)
                .bind(meta.start_offset as i64)
                .bind(meta.end_offset as i64)
                .bind(&meta.uploaded_at)
                .bind(&embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::WriteError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::WriteError(e.to_string()))?;

        debug!(table = %self.table_name, count, "upserted rows");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        if self.collection_info().await?.is_none() {
            return Ok(Vec::new());
        }

        let embedding = Vector::from(query_vector);
        let query = search_sql(&self.table_name, !documents.is_empty(), limit);

        let mut query_builder = sqlx::query(&query).bind(&embedding);
        if !documents.is_empty() {
            query_builder = query_builder.bind(documents);
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let results = rows
            .into_iter()
            .map(|row: PgRow| {
                let chunk_index: i32 = row.get("chunk_index");
                let score: f64 = row.get("score");
                RetrievedChunk {
                    id: row.get("id"),
                    text: row.get("document"),
                    filename: row.get("filename"),
                    chunk_index: chunk_index as u32,
                    score: score as f32,
                }
            })
            .collect();

        Ok(results)
    }

    async fn list_documents(&self) -> Result<BTreeSet<String>, VectorStoreError> {
        if self.collection_info().await?.is_none() {
            return Ok(BTreeSet::new());
        }

        let query = format!("SELECT DISTINCT filename FROM {}", self.table_name);
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("rag.documents", 768);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS rag.documents ("));
        assert!(sql.contains("id TEXT PRIMARY KEY"));
        assert!(sql.contains("embedding vector(768) NOT NULL"));
    }

    #[test]
    fn test_index_sql() {
        let [embedding, filename] = index_sql("documents", "rag.documents");
        assert!(embedding.contains("documents_embedding_idx ON rag.documents USING hnsw"));
        assert!(filename.ends_with("ON rag.documents (filename)"));
    }

    #[test]
    fn test_search_sql_filter() {
        let unfiltered = search_sql("documents", false, 5);
        assert!(!unfiltered.contains("WHERE"));
        assert!(unfiltered.contains("LIMIT 5"));

        let filtered = search_sql("documents", true, 3);
        assert!(filtered.contains("WHERE filename = ANY($2)"));
        assert!(filtered.contains("ORDER BY embedding <=> $1"));
    }
}
