use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use tracing::{debug, info};

use super::AppState;
use super::error::ApiError;
use super::protocol::{DocumentsResponse, HealthResponse, QueryResponse, UploadResponse};
use crate::error::{ExtractError, PipelineError};
use crate::models::Question;
use crate::services::Operation;
use crate::utils::{file_extension, sanitize_filename, write_temp_upload};

/// Multipart fields that may carry the uploaded document.
const FILE_FIELDS: [&str; 2] = ["file", "pdf_file"];

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok".to_string(),
    })
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::bad_request("Expected a multipart/form-data upload"))?;

    let (raw_name, bytes) = read_file_field(&mut multipart, state.max_upload_bytes).await?;
    let filename = sanitize_filename(&raw_name);
    if filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !state.pipeline.accepts(&filename) {
        let extension = file_extension(&filename).unwrap_or_default();
        return Err(PipelineError::Extract(ExtractError::Unsupported(extension)).into());
    }
    debug!(%filename, bytes = bytes.len(), "upload received");

    let started = Instant::now();
    let result = ingest_upload(&state, &filename, bytes).await;
    state.record(Operation::Upload, started, result.is_ok());

    let report = result?;
    Ok(Json(UploadResponse::ok(format!(
        "File '{}' uploaded and processed successfully ({} chunks)",
        report.filename, report.chunks
    ))))
}

async fn read_file_field(
    multipart: &mut Multipart,
    max_bytes: u64,
) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let is_file = field.name().is_some_and(|name| FILE_FIELDS.contains(&name));
        if !is_file {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        if bytes.len() as u64 > max_bytes {
            return Err(ApiError::PayloadTooLarge(max_bytes));
        }
        return Ok((name, bytes));
    }

    Err(ApiError::bad_request("No file part in the request"))
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(max_bytes)
    } else {
        ApiError::bad_request(format!("Malformed upload: {}", e.body_text()))
    }
}

async fn ingest_upload(
    state: &AppState,
    filename: &str,
    bytes: Bytes,
) -> Result<crate::models::IngestReport, ApiError> {
    let extension = file_extension(filename).unwrap_or_default();
    let dir = state.upload_dir.clone();

    // The temp file is removed when `temp` drops, whatever the outcome.
    let temp = tokio::task::spawn_blocking(move || {
        write_temp_upload(dir.as_deref(), &extension, &bytes)
    })
    .await
    .map_err(ApiError::internal)?
    .map_err(ApiError::internal)?;

    let report = state.pipeline.ingest(temp.path(), filename).await?;
    Ok(report)
}

pub async fn query(
    State(state): State<AppState>,
    payload: Result<Json<Question>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(question) = payload.map_err(|e| {
        debug!(error = %e, "rejected query body");
        ApiError::bad_request("Invalid JSON body")
    })?;
    if question.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query cannot be empty"));
    }

    let started = Instant::now();
    let result = state.pipeline.answer(&question).await;
    state.record(Operation::Query, started, result.is_ok());

    let answer = result?;
    info!(
        sources = answer.sources.len(),
        generated = answer.generated,
        "query served"
    );
    Ok(Json(QueryResponse {
        success: true,
        query: answer.query,
        response: answer.response,
    }))
}

pub async fn documents(State(state): State<AppState>) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = state.pipeline.documents().await?;
    Ok(Json(DocumentsResponse {
        success: true,
        documents,
    }))
}

/// JSON body for a known path called with the wrong method.
pub async fn method_not_allowed(uri: Uri) -> ApiError {
    let path = uri.path().trim_end_matches('/');
    let accepted = match path {
        "/api/upload" | "/api/query" => "POST",
        _ => "GET",
    };
    ApiError::MethodNotAllowed(accepted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::models::{EmptyContextPolicy, QueryConfig};
    use crate::server::router;
    use crate::services::testing::{DownStore, HashEmbedder, RecordingGenerator, pipeline_with};
    use crate::services::vector_store::MemoryBackend;
    use crate::services::{RagPipeline, TextChunker, VectorStore};

    const BOUNDARY: &str = "docqa-test-boundary";

    fn multipart_body(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
        Request::post("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, contents)))
            .unwrap()
    }

    fn query_request(body: &str) -> Request<Body> {
        Request::post("/api/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn app_with(
        policy: EmptyContextPolicy,
    ) -> (axum::Router, Arc<HashEmbedder>, Arc<RecordingGenerator>) {
        let (pipeline, embedder, generator) = pipeline_with(policy);
        let app = router(AppState::new(Arc::new(pipeline)));
        (app, embedder, generator)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(
            &app,
            Request::get("/api/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_text_file() {
        let (app, embedder, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(
            &app,
            upload_request("file", "policy.txt", b"Refunds are accepted within thirty days."),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["success"], true);
        assert!(json["message"].as_str().unwrap().contains("1 chunks"));
        assert_eq!(embedder.document_calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_accepts_legacy_field_name() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(
            &app,
            upload_request("pdf_file", "notes.txt", b"Legacy form field."),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{json}");
    }

    #[tokio::test]
    async fn test_upload_unsupported_type() {
        let (app, embedder, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, upload_request("file", "setup.exe", b"MZ\x90\x00")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Unsupported file type: .exe");
        assert_eq!(embedder.document_calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_missing_file_part() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, upload_request("other", "a.txt", b"text")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "No file part in the request");
    }

    #[tokio::test]
    async fn test_upload_empty_filename() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, upload_request("file", "", b"text")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "No file selected");
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let (pipeline, _, _) = pipeline_with(EmptyContextPolicy::ShortCircuit);
        let state = AppState::new(Arc::new(pipeline)).with_max_upload_bytes(64);
        let app = router(state);

        let (status, json) = send(&app, upload_request("file", "big.txt", &[b'a'; 4096])).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_upload_whitespace_only_document() {
        let (app, embedder, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, upload_request("file", "blank.txt", b" \n\n \t ")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "No text could be extracted from the document");
        assert_eq!(embedder.document_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_service_calls() {
        let (app, embedder, generator) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, query_request(r#"{"query": "   "}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(embedder.query_calls(), 0);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_query_body() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, query_request("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_query_without_documents_short_circuits() {
        let (app, _, generator) = app_with(EmptyContextPolicy::ShortCircuit);
        let (status, json) = send(&app, query_request(r#"{"query": "what is the policy?"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["query"], "what is the policy?");
        assert_eq!(
            json["response"],
            QueryConfig::default().no_context_message.as_str()
        );
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_query_echoed_as_sent() {
        let (app, _, generator) = app_with(EmptyContextPolicy::Generate);
        let (status, json) = send(&app, query_request(r#"{"query": "  late fees?\n"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["query"], "  late fees?\n");
        assert_eq!(generator.calls()[0].0, "late fees?");
    }

    #[tokio::test]
    async fn test_query_with_generate_policy_calls_model() {
        let (app, _, generator) = app_with(EmptyContextPolicy::Generate);
        let (status, json) = send(&app, query_request(r#"{"query": "anything?"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], RecordingGenerator::ANSWER);
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_upload_then_query() {
        let (app, _, generator) = app_with(EmptyContextPolicy::ShortCircuit);
        send(
            &app,
            upload_request("file", "refunds.txt", b"Refunds are accepted within thirty days."),
        )
        .await;

        let (status, json) = send(
            &app,
            query_request(r#"{"query": "refunds accepted?", "document_names": ["refunds.txt"]}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], RecordingGenerator::ANSWER);
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "refunds accepted?");
        assert!(calls[0].1[0].contains("thirty days"));
    }

    #[tokio::test]
    async fn test_documents_sorted() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);
        for name in ["zeta.txt", "alpha.txt", "zeta.txt"] {
            let (status, _) = send(&app, upload_request("file", name, b"Some text here.")).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, json) = send(
            &app,
            Request::get("/api/documents").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["documents"], serde_json::json!(["alpha.txt", "zeta.txt"]));
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let pipeline = RagPipeline::new(
            Arc::new(HashEmbedder::new()),
            Arc::new(DownStore),
            Arc::new(RecordingGenerator::default()),
            TextChunker::with_defaults(),
            QueryConfig::default(),
        );
        let app = router(AppState::new(Arc::new(pipeline)));

        let (status, json) = send(&app, query_request(r#"{"query": "hello"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["message"], "Vector store is unavailable");

        let (status, _) = send(
            &app,
            Request::get("/api/documents").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, upload_request("file", "a.txt", b"Some text.")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_wrong_method_returns_json() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);

        let (status, json) = send(
            &app,
            Request::get("/api/query").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "This endpoint accepts POST requests only.");

        let (status, json) = send(
            &app,
            Request::post("/api/documents/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["message"], "This endpoint accepts GET requests only.");
    }

    #[tokio::test]
    async fn test_trailing_slash_paths() {
        let (app, _, _) = app_with(EmptyContextPolicy::ShortCircuit);

        let mut request = upload_request("file", "guide.txt", b"Slash-terminated upload.");
        *request.uri_mut() = "/api/upload/".parse().unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            &app,
            Request::get("/api/documents/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["documents"], serde_json::json!(["guide.txt"]));

        let mut request = query_request(r#"{"query": "slash?"}"#);
        *request.uri_mut() = "/api/query/".parse().unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    fn preflight(path: &str, origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri(path)
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin_by_default() {
        let (app, _, generator) = app_with(EmptyContextPolicy::Generate);
        let response = app
            .clone()
            .oneshot(preflight("/api/query/", "http://localhost:5500"))
            .await
            .unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST"));
        assert!(generator.calls().is_empty());

        let response = app
            .oneshot(
                Request::get("/api/documents")
                    .header(header::ORIGIN, "http://localhost:5500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_cors_restricted_to_configured_origins() {
        let (pipeline, _, _) = pipeline_with(EmptyContextPolicy::ShortCircuit);
        let state = AppState::new(Arc::new(pipeline))
            .with_cors_origins(vec!["http://localhost:5500".to_string()]);
        let app = router(state);

        let response = app
            .clone()
            .oneshot(preflight("/api/upload/", "http://localhost:5500"))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5500"
        );

        let response = app
            .oneshot(preflight("/api/upload/", "http://elsewhere.test"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    /// Upload through the router with a dedicated temp dir; returns the status
    /// and how many files were left behind.
    async fn upload_into_dir(pipeline: RagPipeline, contents: &[u8]) -> (StatusCode, usize) {
        let uploads = tempfile::tempdir().unwrap();
        let state = AppState::new(Arc::new(pipeline))
            .with_upload_dir(Some(uploads.path().to_path_buf()));

        let (status, _) = send(&router(state), upload_request("file", "report.txt", contents)).await;
        let leftover = std::fs::read_dir(uploads.path()).unwrap().count();
        (status, leftover)
    }

    fn pipeline_over(embedder: HashEmbedder, store: Arc<dyn VectorStore>) -> RagPipeline {
        RagPipeline::new(
            Arc::new(embedder),
            store,
            Arc::new(RecordingGenerator::default()),
            TextChunker::with_defaults(),
            QueryConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_temp_upload_removed_after_success() {
        let (pipeline, _, _) = pipeline_with(EmptyContextPolicy::ShortCircuit);
        let (status, leftover) = upload_into_dir(pipeline, b"Quarterly figures.").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_temp_upload_removed_after_embedding_failure() {
        let pipeline = pipeline_over(
            HashEmbedder::failing(),
            Arc::new(MemoryBackend::new("documents")),
        );
        let (status, leftover) = upload_into_dir(pipeline, b"Quarterly figures.").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_temp_upload_removed_when_store_unavailable() {
        let pipeline = pipeline_over(HashEmbedder::new(), Arc::new(DownStore));
        let (status, leftover) = upload_into_dir(pipeline, b"Quarterly figures.").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_temp_upload_removed_after_empty_extraction() {
        let (pipeline, _, _) = pipeline_with(EmptyContextPolicy::ShortCircuit);
        let (status, leftover) = upload_into_dir(pipeline, b"   \n ").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(leftover, 0);
    }
}
