use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChunkRow {
    pub content: String,
    pub similarity: f32,
}
