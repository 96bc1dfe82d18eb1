//! Embedding client for document chunks and queries.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::client::GeminiClient;
use crate::client::wire::{
    BatchEmbedContentsRequest, BatchEmbedContentsResponse, Content, EmbedContentRequest,
    EmbedContentResponse, TaskType,
};
use crate::client::model_path;
use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, GeminiConfig};
use crate::utils::{RetryConfig, retry};

/// Turns text into vectors.
///
/// Documents and queries are embedded with different task hints, so the two
/// entry points are not interchangeable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Gemini embedding client.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    api: GeminiClient,
    model: String,
    dimension: usize,
    batch_size: usize,
    timeout: Duration,
    retry: RetryConfig,
}

impl EmbeddingClient {
    pub fn new(gemini: &GeminiConfig, config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api = GeminiClient::new(gemini)?;

        Ok(Self {
            api,
            model: model_path(&config.model),
            dimension: config.dimension as usize,
            batch_size: config.batch_size.max(1) as usize,
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryConfig::new(gemini.max_retries),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = self.api.endpoint(&self.model, "batchEmbedContents");
        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: self.model.clone(),
                    content: Content::text(text.as_str()),
                    task_type: TaskType::RetrievalDocument,
                })
                .collect(),
        };

        let response: BatchEmbedContentsResponse = retry(&self.retry, || async {
            self.api
                .post(&url, &request, self.timeout)
                .await
                .map_err(EmbeddingError::from)
        })
        .await?;

        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            self.check_vector(vector)?;
        }

        Ok(vectors)
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        if vector.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        if vector.len() != self.dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected dimension {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "no texts to embed".to_string(),
            ));
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = batch_index, size = batch.len(), "embedding batch");
            all_embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = self.api.endpoint(&self.model, "embedContent");
        let request = EmbedContentRequest {
            model: self.model.clone(),
            content: Content::text(text),
            task_type: TaskType::RetrievalQuery,
        };

        let response: EmbedContentResponse = retry(&self.retry, || async {
            self.api
                .post(&url, &request, self.timeout)
                .await
                .map_err(EmbeddingError::from)
        })
        .await?;

        let vector = response
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding".to_string()))?;
        self.check_vector(&vector)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::Uri;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    fn gemini(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = EmbeddingClient::new(&gemini(None), &EmbeddingConfig::default());
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }

    #[test]
    fn test_client_creation() {
        let config = EmbeddingConfig {
            model: "embedding-001".to_string(),
            batch_size: 0,
            ..Default::default()
        };
        let client = EmbeddingClient::new(&gemini(Some("key")), &config).unwrap();

        assert_eq!(client.model(), "models/embedding-001");
        assert_eq!(client.dimension(), 768);
        assert_eq!(client.batch_size, 1);
    }

    #[test]
    fn test_check_vector() {
        let config = EmbeddingConfig {
            dimension: 3,
            ..Default::default()
        };
        let client = EmbeddingClient::new(&gemini(Some("key")), &config).unwrap();

        assert!(client.check_vector(&[0.1, 0.2, 0.3]).is_ok());
        assert!(matches!(
            client.check_vector(&[]),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            client.check_vector(&[0.1]),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_documents_rejects_empty_input() {
        let client = EmbeddingClient::new(&gemini(Some("key")), &EmbeddingConfig::default()).unwrap();
        let result = client.embed_documents(&[]).await;
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Reply {
        Exact,
        DropOne,
        WrongDimension,
    }

    /// Local stand-in for the embedding API. Records the path and task types of
    /// every call.
    #[derive(Clone)]
    struct StubApi {
        reply: Reply,
        dimension: usize,
        calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl StubApi {
        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// `[chars, 0, 0, ..]`, so callers can check that order is preserved.
    fn embedding_for(request: &Value, dimension: usize) -> Value {
        let text = request["content"]["parts"][0]["text"].as_str().unwrap_or_default();
        let mut values = vec![0.0f32; dimension];
        values[0] = text.chars().count() as f32;
        json!({ "values": values })
    }

    fn task_type(request: &Value) -> String {
        request["taskType"].as_str().unwrap_or_default().to_string()
    }

    async fn stub_handler(
        State(stub): State<StubApi>,
        uri: Uri,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let dimension = match stub.reply {
            Reply::WrongDimension => stub.dimension - 1,
            _ => stub.dimension,
        };
        let path = uri.path().to_string();

        match body["requests"].as_array() {
            Some(requests) => {
                let tasks = requests.iter().map(task_type).collect();
                stub.calls.lock().unwrap().push((path, tasks));

                let mut embeddings: Vec<Value> =
                    requests.iter().map(|r| embedding_for(r, dimension)).collect();
                if stub.reply == Reply::DropOne {
                    embeddings.pop();
                }
                Json(json!({ "embeddings": embeddings }))
            }
            None => {
                stub.calls.lock().unwrap().push((path, vec![task_type(&body)]));
                Json(json!({ "embedding": embedding_for(&body, dimension) }))
            }
        }
    }

    async fn start_stub(reply: Reply, dimension: usize) -> (String, StubApi) {
        let stub = StubApi {
            reply,
            dimension,
            calls: Arc::default(),
        };
        let app = Router::new().fallback(stub_handler).with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/v1beta"), stub)
    }

    fn client_for(base_url: String, dimension: u32, batch_size: u32) -> EmbeddingClient {
        let gemini = GeminiConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            max_retries: 1,
        };
        let config = EmbeddingConfig {
            dimension,
            batch_size,
            timeout_secs: 5,
            ..Default::default()
        };
        EmbeddingClient::new(&gemini, &config).unwrap()
    }

    #[tokio::test]
    async fn test_documents_and_queries_use_their_own_endpoints() {
        let (base_url, stub) = start_stub(Reply::Exact, 3).await;
        let client = client_for(base_url, 3, 2);

        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let vectors = client.embed_documents(&texts).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let vector = client.embed_query("hello").await.unwrap();
        assert_eq!(vector, vec![5.0, 0.0, 0.0]);

        let calls = stub.calls();
        assert_eq!(calls.len(), 4);
        let document = "RETRIEVAL_DOCUMENT".to_string();
        for (call, size) in calls[..3].iter().zip([2, 2, 1]) {
            assert_eq!(call.0, "/v1beta/models/embedding-001:batchEmbedContents");
            assert_eq!(call.1, vec![document.clone(); size]);
        }
        assert_eq!(calls[3].0, "/v1beta/models/embedding-001:embedContent");
        assert_eq!(calls[3].1, vec!["RETRIEVAL_QUERY".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_with_missing_embedding_is_rejected() {
        let (base_url, stub) = start_stub(Reply::DropOne, 3).await;
        let client = client_for(base_url, 3, 10);

        let texts = vec!["first".to_string(), "second".to_string()];
        match client.embed_documents(&texts).await {
            Err(EmbeddingError::InvalidResponse(message)) => {
                assert_eq!(message, "expected 2 embeddings, got 1");
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let (base_url, _) = start_stub(Reply::WrongDimension, 3).await;
        let client = client_for(base_url, 3, 10);

        match client.embed_query("hello").await {
            Err(EmbeddingError::InvalidResponse(message)) => {
                assert_eq!(message, "expected dimension 3, got 2");
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }

        let texts = vec!["hello".to_string()];
        assert!(matches!(
            client.embed_documents(&texts).await,
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }
}
