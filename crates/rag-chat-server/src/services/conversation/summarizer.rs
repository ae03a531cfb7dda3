use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::models::ChatMessage;
use crate::services::providers::LlmProvider;

/// Produces the new rolling summary from the messages being compacted away.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, older: &[ChatMessage], existing_summary: &str) -> Result<String>;
}

/// Summarizer backed by the language model gateway
pub struct LlmSummarizer {
    llm: Arc<dyn LlmProvider>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(older: &[ChatMessage], existing_summary: &str) -> String {
        let text = older
            .iter()
            .map(|m| format!("{}: {} ", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a memory summarizer.\n\n\
             Existing summary:\n{}\n\n\
             New conversation:\n{}\n\n\
             Update the summary concisely.",
            existing_summary, text
        )
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, older: &[ChatMessage], existing_summary: &str) -> Result<String> {
        debug!("Summarizing {} messages", older.len());

        let prompt = Self::build_prompt(older, existing_summary);
        let reply = self.llm.complete(&[ChatMessage::user(prompt)]).await?;

        Ok(reply.content.trim().to_string())
    }
}
