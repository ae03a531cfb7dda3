use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::models::{ChatMessage, RetrievedChunk, SessionKey};
use crate::services::providers::{LlmProvider, VectorStore};
use crate::utils::error::RagError;

/// System instruction placed ahead of the conversation on every generation
pub const GROUNDING_TEMPLATE: &str = "You are a helpful assistant. Use the context below to answer. If the answer is not in the context, say you don't know. Context: {context}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Retrieve,
    Generate,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::Retrieve => "retrieve",
            PipelineStage::Generate => "generate",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Also the vector-store namespace searched for context
    pub session_key: SessionKey,
    pub ordered_messages: Vec<ChatMessage>,
}

impl PipelineRequest {
    pub fn new(session_key: impl Into<SessionKey>, ordered_messages: Vec<ChatMessage>) -> Self {
        Self {
            session_key: session_key.into(),
            ordered_messages,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub answer_text: String,
    pub chunks_used: usize,
}

/// Stateless retrieve-then-generate pipeline.
///
/// Each invocation retrieves once and generates once, with no retries;
/// a failure in either stage surfaces as its own `RagError` kind.
pub struct RagPipeline {
    vector_store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            vector_store,
            llm,
            top_k: config.retrieval_top_k,
        }
    }

    /// Retrieval query: content of the last message, empty if there is none
    pub fn extract_query(messages: &[ChatMessage]) -> &str {
        messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }

    pub async fn retrieve(
        &self,
        query: &str,
        namespace: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let mut chunks = self
            .vector_store
            .search(query, namespace, self.top_k)
            .await
            .map_err(RagError::Retrieval)?;

        // Gateways are asked for top_k but not trusted to honor it
        chunks.truncate(self.top_k);

        debug!("Retrieved {} chunks from namespace {}", chunks.len(), namespace);
        Ok(chunks)
    }

    pub fn build_context(chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Grounding instruction followed by the caller's messages, untouched
    pub fn build_grounded_messages(context: &str, ordered: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(ordered.len() + 1);
        messages.push(ChatMessage::system(
            GROUNDING_TEMPLATE.replace("{context}", context),
        ));
        messages.extend_from_slice(ordered);
        messages
    }

    /// One completion call, optionally bounded by `deadline`
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        deadline: Option<Duration>,
    ) -> Result<String, RagError> {
        let call = self.llm.complete(messages);

        let reply = match deadline {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RagError::Generation(anyhow::anyhow!(
                    "generation timed out after {:?}",
                    limit
                ))
            })?,
            None => call.await,
        }
        .map_err(RagError::Generation)?;

        Ok(reply.content)
    }

    pub async fn invoke(&self, request: &PipelineRequest) -> Result<PipelineResult, RagError> {
        self.invoke_with_deadline(request, None).await
    }

    pub async fn invoke_with_deadline(
        &self,
        request: &PipelineRequest,
        deadline: Option<Duration>,
    ) -> Result<PipelineResult, RagError> {
        let session = request.session_key.as_str();
        debug!(session, stage = %PipelineStage::Start, "Pipeline invoked");

        let query = Self::extract_query(&request.ordered_messages);

        debug!(session, stage = %PipelineStage::Retrieve, "Retrieving context");
        let chunks = self.retrieve(query, session).await.map_err(|e| {
            warn!(session, stage = %PipelineStage::Failed, "Retrieval failed: {}", e);
            e
        })?;

        let context = Self::build_context(&chunks);
        let messages = Self::build_grounded_messages(&context, &request.ordered_messages);

        debug!(
            session,
            stage = %PipelineStage::Generate,
            messages = messages.len(),
            "Generating answer"
        );
        let answer_text = self.generate(&messages, deadline).await.map_err(|e| {
            warn!(session, stage = %PipelineStage::Failed, "Generation failed: {}", e);
            e
        })?;

        info!(
            session,
            stage = %PipelineStage::Done,
            chunks = chunks.len(),
            "Pipeline completed"
        );

        Ok(PipelineResult {
            answer_text,
            chunks_used: chunks.len(),
        })
    }
}
