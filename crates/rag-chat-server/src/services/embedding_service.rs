use crate::config::EmbeddingConfig;
use crate::services::providers::EmbeddingProvider;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    async fn embed_internal(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for {} chars", text.len());

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
        };

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json_value: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = parse_embedding(&json_value)?;

        if embedding.len() != self.config.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.config.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

/// Accepts the OpenAI `{"data":[{"embedding":[..]}]}` shape as well as the
/// bare llama.cpp `{"embedding":[..]}` shape.
fn parse_embedding(json_value: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json_value
        .get("data")
        .and_then(|data| data.get(0))
        .and_then(|first| first.get("embedding"))
        .or_else(|| json_value.get("embedding"))
        .and_then(|v| v.as_array())
        .with_context(|| format!("Unrecognized embedding response format: {}", json_value))?;

    let embedding: Vec<f32> = values
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();

    if embedding.is_empty() {
        anyhow::bail!("Generated embedding is empty");
    }

    Ok(embedding)
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_internal(text).await
    }
}
