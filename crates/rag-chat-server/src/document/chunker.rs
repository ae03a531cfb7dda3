use anyhow::{anyhow, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

use crate::config::RagConfig;

/// Splits extracted document text into overlapping passages for indexing.
///
/// Sizes are in characters. Splitting prefers paragraph, then sentence,
/// then word boundaries before falling back to raw characters.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        // validate up front so a bad config fails at startup, not on first upload
        ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| anyhow!("Invalid chunking config: {}", e))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        debug!("Chunking text: {} chars", text.len());

        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| anyhow!("Invalid chunking config: {}", e))?;
        let splitter = TextSplitter::new(config);

        let chunks: Vec<String> = splitter
            .chunks(text)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        debug!("Created {} chunks", chunks.len());
        Ok(chunks)
    }
}
