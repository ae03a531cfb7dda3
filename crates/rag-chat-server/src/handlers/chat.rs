use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

use crate::models::chat::ChatQuery;
use crate::services::ChatService;
use crate::utils::error::ApiError;

/// Answers one question against the session's documents and history.
///
/// The answer is produced in full before the body starts, so a failure is
/// always reported with an error status rather than a truncated body.
pub async fn chat_stream_handler(
    State(chat_service): State<Arc<ChatService>>,
    Query(query): Query<ChatQuery>,
) -> Result<Response, ApiError> {
    if query.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    info!("Chat request for session {}", query.session_id);

    let result = chat_service.ask(&query.session_id, &query.question).await?;

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(result.answer_text) });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}
