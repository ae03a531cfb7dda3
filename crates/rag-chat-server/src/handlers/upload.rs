use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::chat::{UploadQuery, UploadResponse};
use crate::services::DocumentService;
use crate::utils::error::ApiError;

pub async fn upload_handler(
    State(document_service): State<Arc<DocumentService>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    info!("File upload request received for session {}", query.session_id);

    if query.session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".to_string()));
    }

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::BadRequest("file required".to_string()))?;
    let filename = filename.unwrap_or_else(|| "upload".to_string());

    match document_service
        .ingest(&query.session_id, &filename, &file_data)
        .await
    {
        Ok(chunks) => {
            info!("Indexed {} chunks from {}", chunks, filename);
            Ok(Json(UploadResponse {
                status: "uploaded".to_string(),
                chunks,
            }))
        }
        Err(e) => {
            error!("Failed to process {}: {:#}", filename, e);
            Err(ApiError::Ingestion(format!("{:#}", e)))
        }
    }
}
