//! Capability traits for the external collaborators the core talks to.

use anyhow::Result;

use crate::models::{ChatMessage, RetrievedChunk};

/// Single-call completion over an ordered message list.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the model reply already normalized into a `ChatMessage`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatMessage>;
}

/// Text embedding model.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Namespace-partitioned similarity search over document chunks.
///
/// `search` must never return chunks from another namespace and must be
/// idempotent for identical inputs against the same index state.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` chunks ordered by descending similarity.
    async fn search(&self, query: &str, namespace: &str, k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Inserts chunk texts under `namespace`, returns how many were stored.
    async fn upsert(&self, namespace: &str, chunks: &[String]) -> Result<usize>;
}
