// Namespace-scoped in-memory vector storage
// Chunks live for the process lifetime; nothing is persisted

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::RetrievedChunk;
use crate::services::providers::{EmbeddingProvider, VectorStore};
use crate::utils::cosine_similarity;

#[derive(Clone, Debug)]
struct StoredChunk {
    text: String,
    embedding: Vec<f32>,
}

/// Vector store backed by a per-namespace list of embedded chunks.
/// Search is a brute-force cosine scan, which is fine for session-sized corpora.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    namespaces: DashMap<String, Vec<StoredChunk>>,
    max_chunks_per_namespace: usize,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, max_chunks_per_namespace: usize) -> Self {
        Self {
            embedder,
            namespaces: DashMap::new(),
            max_chunks_per_namespace: max_chunks_per_namespace.max(1),
        }
    }

    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: &str, namespace: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.namespace_len(namespace) == 0 {
            debug!("Namespace {} has no chunks, returning empty result", namespace);
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        // Scores are computed under the shard read lock, then released
        let mut scored = match self.namespaces.get(namespace) {
            Some(chunks) => chunks
                .iter()
                .map(|chunk| {
                    cosine_similarity(&query_embedding, &chunk.embedding)
                        .map(|score| RetrievedChunk::new(chunk.text.clone(), score))
                })
                .collect::<Result<Vec<_>>>()?,
            None => return Ok(Vec::new()),
        };

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);

        debug!(
            "Found {} chunks in namespace {} (k={})",
            scored.len(),
            namespace,
            k
        );
        Ok(scored)
    }

    async fn upsert(&self, namespace: &str, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(anyhow!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            ));
        }

        let mut entry = self.namespaces.entry(namespace.to_string()).or_default();
        if entry.len() + chunks.len() > self.max_chunks_per_namespace {
            return Err(anyhow!(
                "Maximum chunk capacity reached for namespace {}: {} + {} > {}",
                namespace,
                entry.len(),
                chunks.len(),
                self.max_chunks_per_namespace
            ));
        }

        entry.extend(
            chunks
                .iter()
                .zip(embeddings)
                .map(|(text, embedding)| StoredChunk {
                    text: text.clone(),
                    embedding,
                }),
        );

        Ok(chunks.len())
    }
}
