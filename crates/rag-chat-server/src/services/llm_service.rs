use crate::config::LlmConfig;
use crate::models::{ChatMessage, Role};
use crate::services::providers::LlmProvider;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client (OpenRouter, llama-server, vLLM ...)
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Generate completion without streaming (wait for full response)
    pub async fn generate_chat(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        debug!(
            "Starting chat generation with {} messages (model={})",
            messages.len(),
            self.config.model
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.context("Failed to call LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status, body);
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        normalize_choice(body)
    }
}

/// Turns the provider payload into our message type right at the boundary.
fn normalize_choice(body: ChatCompletionResponse) -> Result<ChatMessage> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .context("No choices returned from LLM")?;

    let content = choice
        .message
        .content
        .context("LLM response message has no content")?;

    let role = choice
        .message
        .role
        .as_deref()
        .map(Role::from_provider)
        .unwrap_or(Role::Assistant);

    Ok(ChatMessage::new(role, content))
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        self.generate_chat(messages).await
    }
}
