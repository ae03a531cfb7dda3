use anyhow::{anyhow, Result};
use pgvector::Vector;
use std::sync::Arc;

use crate::database::Repository;
use crate::models::RetrievedChunk;
use crate::services::providers::{EmbeddingProvider, VectorStore};

/// pgvector-backed store; namespaces are a filtered column of one table.
pub struct PgVectorStore {
    repository: Arc<Repository>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl PgVectorStore {
    pub fn new(repository: Arc<Repository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedder,
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for PgVectorStore {
    async fn search(&self, query: &str, namespace: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let rows = self
            .repository
            .search_namespace(namespace, Vector::from(embedding), k as i64)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RetrievedChunk::new(row.content, row.similarity))
            .collect())
    }

    async fn upsert(&self, namespace: &str, chunks: &[String]) -> Result<usize> {
        let embeddings = self.embedder.embed_batch(chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(anyhow!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            ));
        }

        self.repository
            .insert_chunks(namespace, chunks, embeddings)
            .await
    }
}
