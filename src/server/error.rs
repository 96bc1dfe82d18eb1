use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use super::protocol::ErrorResponse;
use crate::error::{ExtractError, PipelineError, VectorStoreError};

/// Failure of an HTTP request. Rendered as `{success: false, message}`; only
/// user-safe text reaches the client.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(u64),
    /// Wrong method; carries the one the endpoint accepts.
    MethodNotAllowed(&'static str),
    Pipeline(PipelineError),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(detail: impl ToString) -> Self {
        ApiError::Internal(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(e) => match e {
                PipelineError::Validation(_) | PipelineError::Extract(ExtractError::Unsupported(_)) => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::Store(
                    VectorStoreError::Unavailable(_) | VectorStoreError::PgVectorExtensionError(_),
                ) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::PayloadTooLarge(limit) => {
                format!("File is too large. The limit is {} bytes", limit)
            }
            ApiError::MethodNotAllowed(method) => {
                format!("This endpoint accepts {} requests only.", method)
            }
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Pipeline(e) => pipeline_message(e),
        }
    }
}

fn pipeline_message(e: &PipelineError) -> String {
    match e {
        PipelineError::Validation(message) => message.clone(),
        PipelineError::Extract(ExtractError::Unsupported(ext)) if ext.is_empty() => {
            "Unsupported file type".to_string()
        }
        PipelineError::Extract(ExtractError::Unsupported(ext)) => {
            format!("Unsupported file type: .{}", ext)
        }
        PipelineError::Extract(_) => "Failed to extract text from the document".to_string(),
        PipelineError::EmptyText(_) => "No text could be extracted from the document".to_string(),
        PipelineError::Chunk(_) => "Failed to split the document into chunks".to_string(),
        PipelineError::Embedding(_) => "Failed to generate embeddings".to_string(),
        PipelineError::Store(
            VectorStoreError::Unavailable(_) | VectorStoreError::PgVectorExtensionError(_),
        ) => "Vector store is unavailable".to_string(),
        PipelineError::Store(VectorStoreError::SearchError(_)) => {
            "Failed to search the documents".to_string()
        }
        PipelineError::Store(_) => "Failed to store the document".to_string(),
        PipelineError::Generation(_) => "Failed to generate a response".to_string(),
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Pipeline(e) if status.is_server_error() => {
                error!(stage = e.stage(), error = %e, "request failed");
            }
            ApiError::Pipeline(e) => warn!(stage = e.stage(), error = %e, "request rejected"),
            ApiError::Internal(detail) => error!(error = %detail, "request failed"),
            ApiError::BadRequest(message) => warn!(%message, "request rejected"),
            ApiError::PayloadTooLarge(limit) => warn!(limit, "upload too large"),
            ApiError::MethodNotAllowed(_) => {}
        }
        (status, Json(ErrorResponse::new(self.message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, GenerationError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(PipelineError::Validation("empty".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(PipelineError::Extract(ExtractError::Unsupported("exe".into()))),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(PipelineError::EmptyText("scan.pdf".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(PipelineError::Embedding(EmbeddingError::Timeout)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(PipelineError::Store(VectorStoreError::Unavailable(
                    "refused".into(),
                ))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(PipelineError::Store(VectorStoreError::WriteError("disk".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::PayloadTooLarge(10), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::MethodNotAllowed("POST"), StatusCode::METHOD_NOT_ALLOWED),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_messages_hide_internal_detail() {
        let error = ApiError::from(PipelineError::Generation(GenerationError::ServerError(
            "status 403: API key sk-secret rejected".into(),
        )));
        assert_eq!(error.message(), "Failed to generate a response");

        let error = ApiError::internal("/tmp/upload-abc.pdf: permission denied");
        assert_eq!(error.message(), "Internal server error");
    }

    #[test]
    fn test_unsupported_message_names_extension() {
        let error = ApiError::from(PipelineError::Extract(ExtractError::Unsupported("exe".into())));
        assert_eq!(error.message(), "Unsupported file type: .exe");
    }
}
