use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::document::{DocumentParser, TextChunker};
use crate::services::providers::VectorStore;

/// Upload path: parse -> chunk -> embed + upsert under the session namespace
pub struct DocumentService {
    vector_store: Arc<dyn VectorStore>,
    chunker: TextChunker,
}

impl DocumentService {
    pub fn new(vector_store: Arc<dyn VectorStore>, chunker: TextChunker) -> Self {
        Self {
            vector_store,
            chunker,
        }
    }

    /// Returns the number of chunks stored
    pub async fn ingest(&self, namespace: &str, filename: &str, bytes: &[u8]) -> Result<usize> {
        info!(
            "Processing upload {} ({} bytes) for namespace {}",
            filename,
            bytes.len(),
            namespace
        );

        if namespace.is_empty() {
            bail!("Namespace must not be empty");
        }

        let parsed = DocumentParser::parse_bytes(filename, bytes)?;
        debug!(
            "Extracted {} chars ({:?}, pages={:?})",
            parsed.content.len(),
            parsed.kind,
            parsed.pages
        );

        let chunks = self.chunker.chunk(&parsed.content)?;
        if chunks.is_empty() {
            bail!("Document {} contains no extractable text", filename);
        }

        let stored = self.vector_store.upsert(namespace, &chunks).await?;
        info!("Stored {} chunks from {} in {}", stored, filename, namespace);

        Ok(stored)
    }
}
