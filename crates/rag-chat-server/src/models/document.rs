use serde::{Deserialize, Serialize};

/// A passage returned by the vector store for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    /// Similarity as reported by the store (higher is closer)
    pub score: f32,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}
