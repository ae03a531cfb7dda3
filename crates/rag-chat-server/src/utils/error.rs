use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures of the retrieve/generate pipeline and the session memory.
///
/// The three gateway kinds are kept apart all the way up to the caller so it
/// can decide between retrying, degrading and failing the request.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("Generation failed: {0:#}")]
    Generation(anyhow::Error),

    #[error("Compaction failed: {0:#}")]
    Compaction(anyhow::Error),

    #[error("Invalid session key: {0:?}")]
    InvalidSessionKey(String),
}

impl RagError {
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Retrieval(_) => "RetrievalFailure",
            RagError::Generation(_) => "GenerationFailure",
            RagError::Compaction(_) => "CompactionFailure",
            RagError::InvalidSessionKey(_) => "InvalidSessionKey",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error(transparent)]
    Rag(#[from] RagError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Ingestion(msg) => {
                tracing::warn!("Ingestion error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "IngestionFailure", msg)
            }
            ApiError::Rag(err) => {
                let status = match &err {
                    RagError::Retrieval(_) => StatusCode::BAD_GATEWAY,
                    RagError::Generation(_) | RagError::Compaction(_) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    RagError::InvalidSessionKey(_) => StatusCode::BAD_REQUEST,
                };
                tracing::error!(kind = err.kind(), "{}", err);
                (status, err.kind(), err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
