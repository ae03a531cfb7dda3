use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::models::ChatMessage;
use crate::services::conversation::{MemoryManager, Summarizer};
use crate::services::rag_service::{PipelineRequest, PipelineResult, RagPipeline};
use crate::utils::error::RagError;

/// Binds one chat request to session memory and the pipeline.
///
/// The session lock is held for the whole request, so turns on one key are
/// answered strictly in order. History only changes on success: the new
/// question and its answer are appended together after generation returns.
pub struct ChatService {
    memory: Arc<MemoryManager>,
    pipeline: Arc<RagPipeline>,
    summarizer: Arc<dyn Summarizer>,
    generation_deadline: Option<Duration>,
}

impl ChatService {
    pub fn new(
        memory: Arc<MemoryManager>,
        pipeline: Arc<RagPipeline>,
        summarizer: Arc<dyn Summarizer>,
        generation_deadline: Option<Duration>,
    ) -> Self {
        Self {
            memory,
            pipeline,
            summarizer,
            generation_deadline,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub async fn ask(&self, session_key: &str, question: &str) -> Result<PipelineResult, RagError> {
        let handle = self.memory.get_or_create_session(session_key)?;
        let mut session = handle.lock().await;

        // Same deadline as generation; a dropped compaction leaves the session as it was
        let compaction = session.maybe_compact(self.summarizer.as_ref(), self.memory.policy());
        match self.generation_deadline {
            Some(limit) => tokio::time::timeout(limit, compaction).await.map_err(|_| {
                RagError::Compaction(anyhow::anyhow!("compaction timed out after {:?}", limit))
            })??,
            None => compaction.await?,
        };

        let request = PipelineRequest::new(session_key, session.build_prompt(question));
        let result = self
            .pipeline
            .invoke_with_deadline(&request, self.generation_deadline)
            .await?;

        session.append(ChatMessage::user(question));
        session.append(ChatMessage::assistant(result.answer_text.clone()));

        info!(
            session = %session_key,
            history = session.messages.len(),
            chunks = result.chunks_used,
            "Question answered"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::models::RetrievedChunk;
    use crate::services::conversation::summarizer::MockSummarizer;
    use crate::services::providers::{MockLlmProvider, MockVectorStore};

    fn store_with(chunks: Vec<&'static str>) -> MockVectorStore {
        let mut store = MockVectorStore::new();
        store.expect_search().returning(move |_, _, _| {
            Ok(chunks
                .iter()
                .map(|text| RetrievedChunk::new(*text, 0.5))
                .collect())
        });
        store
    }

    fn service(
        store: MockVectorStore,
        llm: MockLlmProvider,
        summarizer: MockSummarizer,
    ) -> ChatService {
        let pipeline = RagPipeline::new(Arc::new(store), Arc::new(llm), &RagConfig::default());
        ChatService::new(
            Arc::new(MemoryManager::default()),
            Arc::new(pipeline),
            Arc::new(summarizer),
            None,
        )
    }

    fn idle_summarizer() -> MockSummarizer {
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_summarize().never();
        summarizer
    }

    #[tokio::test]
    async fn test_success_appends_question_and_answer() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .returning(|_| Ok(ChatMessage::assistant("Paris.")));

        let chat = service(store_with(vec!["Paris is the capital of France."]), llm, idle_summarizer());
        let result = chat.ask("s1", "Capital of France?").await.unwrap();
        assert_eq!(result.answer_text, "Paris.");

        let session = chat.memory().snapshot("s1").await.unwrap();
        assert_eq!(
            session.messages,
            vec![
                ChatMessage::user("Capital of France?"),
                ChatMessage::assistant("Paris.")
            ]
        );
    }

    #[tokio::test]
    async fn test_question_sent_once() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|messages| {
                messages
                    .iter()
                    .filter(|m| m.content == "Capital of France?")
                    .count()
                    == 1
            })
            .times(2)
            .returning(|_| Ok(ChatMessage::assistant("Paris.")));

        let chat = service(store_with(vec![]), llm, idle_summarizer());
        chat.ask("s1", "Capital of France?").await.unwrap();
        // second turn carries the first question in history, plus the new one
        chat.ask("s1", "And its population?").await.unwrap();
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_history_untouched() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .returning(|_| Err(anyhow::anyhow!("rate limited")));

        let chat = service(store_with(vec![]), llm, idle_summarizer());
        let err = chat.ask("s1", "q").await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));

        let session = chat.memory().snapshot("s1").await.unwrap();
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_reported_as_such() {
        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection refused")));
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let chat = service(store, llm, idle_summarizer());
        let err = chat.ask("s1", "q").await.unwrap_err();
        assert_eq!(err.kind(), "RetrievalFailure");
    }

    #[tokio::test]
    async fn test_compaction_runs_before_prompt_is_built() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|messages| messages[1].content == "Conversation summary:\nfolded")
            .returning(|_| Ok(ChatMessage::assistant("ok")));

        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_summarize()
            .times(1)
            .returning(|_, _| Ok("folded".to_string()));

        let chat = service(store_with(vec![]), llm, summarizer);
        for i in 0..9 {
            chat.memory()
                .append_message("s1", crate::models::Role::User, format!("m{}", i))
                .await
                .unwrap();
        }

        chat.ask("s1", "next").await.unwrap();

        let session = chat.memory().snapshot("s1").await.unwrap();
        assert_eq!(session.summary, "folded");
        // 4 retained + question + answer
        assert_eq!(session.messages.len(), 6);
    }

    #[tokio::test]
    async fn test_compaction_failure_stops_the_request() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_summarize()
            .returning(|_, _| Err(anyhow::anyhow!("summarizer down")));

        let chat = service(store_with(vec![]), llm, summarizer);
        for i in 0..9 {
            chat.memory()
                .append_message("s1", crate::models::Role::User, format!("m{}", i))
                .await
                .unwrap();
        }

        let err = chat.ask("s1", "next").await.unwrap_err();
        assert!(matches!(err, RagError::Compaction(_)));
        assert_eq!(chat.memory().snapshot("s1").await.unwrap().messages.len(), 9);
    }

    struct HangingSummarizer;

    #[async_trait::async_trait]
    impl Summarizer for HangingSummarizer {
        async fn summarize(
            &self,
            _older: &[ChatMessage],
            _existing_summary: &str,
        ) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_summarizer_is_bounded_by_the_deadline() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let pipeline = RagPipeline::new(
            Arc::new(store_with(vec![])),
            Arc::new(llm),
            &RagConfig::default(),
        );
        let chat = ChatService::new(
            Arc::new(MemoryManager::default()),
            Arc::new(pipeline),
            Arc::new(HangingSummarizer),
            Some(Duration::from_secs(5)),
        );
        for i in 0..9 {
            chat.memory()
                .append_message("s1", crate::models::Role::User, format!("m{}", i))
                .await
                .unwrap();
        }

        let err = chat.ask("s1", "next").await.unwrap_err();
        assert!(matches!(err, RagError::Compaction(_)));
        assert!(err.to_string().contains("timed out"));

        // the key is usable again and nothing was folded away
        let session = chat.memory().snapshot("s1").await.unwrap();
        assert_eq!(session.messages.len(), 9);
        assert!(session.summary.is_empty());
    }
}
