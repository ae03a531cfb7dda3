use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::conversation::{MemoryManager, StoreStats};

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    sessions: StoreStats,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "status": "working" }))
}

pub async fn health_check(
    State(memory): State<Arc<MemoryManager>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions: memory.stats(),
        }),
    )
}
