use tracing::debug;

use super::cache::{SessionHandle, SessionStore, StoreStats};
use super::summarizer::Summarizer;
use super::types::{CompactionPolicy, Session};
use crate::models::{ChatMessage, Role};
use crate::utils::error::RagError;

/// Owns every session and applies the compaction policy to them.
///
/// Operations on one key are serialized through that session's mutex;
/// different keys never contend beyond the store's shard locks.
pub struct MemoryManager {
    store: SessionStore,
    policy: CompactionPolicy,
}

impl MemoryManager {
    pub fn new(store: SessionStore, policy: CompactionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    fn validate_key(key: &str) -> Result<(), RagError> {
        if key.is_empty() {
            return Err(RagError::InvalidSessionKey(key.to_string()));
        }
        Ok(())
    }

    /// Session for `key`, created empty on first use
    pub fn get_or_create_session(&self, key: &str) -> Result<SessionHandle, RagError> {
        Self::validate_key(key)?;
        Ok(self.store.get_or_create(key))
    }

    /// Copy of the current state, without creating anything
    pub async fn snapshot(&self, key: &str) -> Option<Session> {
        let handle = self.store.get(key)?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub async fn append_message(
        &self,
        key: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), RagError> {
        let handle = self.get_or_create_session(key)?;
        let mut session = handle.lock().await;
        session.append(ChatMessage::new(role, content));
        debug!(session = %key, messages = session.messages.len(), "Message appended");
        Ok(())
    }

    pub async fn maybe_compact(
        &self,
        key: &str,
        summarizer: &dyn Summarizer,
    ) -> Result<bool, RagError> {
        let handle = self.get_or_create_session(key)?;
        let mut session = handle.lock().await;
        session.maybe_compact(summarizer, &self.policy).await
    }

    pub async fn build_prompt(&self, key: &str, question: &str) -> Result<Vec<ChatMessage>, RagError> {
        let handle = self.get_or_create_session(key)?;
        let session = handle.lock().await;
        Ok(session.build_prompt(question))
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(SessionStore::default(), CompactionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation::summarizer::MockSummarizer;
    use std::sync::Arc;

    fn counting_summarizer() -> MockSummarizer {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_summarize()
            .returning(|older, existing| Ok(format!("{}+{}", existing, older.len())));
        summarizer
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let manager = MemoryManager::default();
        let err = manager.get_or_create_session("").unwrap_err();
        assert!(matches!(err, RagError::InvalidSessionKey(_)));

        let err = manager
            .append_message("", Role::User, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidSessionKey(_)));
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_opaque() {
        let manager = MemoryManager::default();
        manager.append_message("   ", Role::User, "hi").await.unwrap();
        manager.append_message(" ", Role::User, "other").await.unwrap();

        assert_eq!(manager.snapshot("   ").await.unwrap().messages.len(), 1);
        assert_eq!(manager.snapshot(" ").await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_has_no_snapshot() {
        let manager = MemoryManager::default();
        assert!(manager.snapshot("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let manager = MemoryManager::default();
        manager.append_message("s1", Role::User, "q1").await.unwrap();
        manager.append_message("s1", Role::Assistant, "a1").await.unwrap();

        let session = manager.snapshot("s1").await.unwrap();
        assert_eq!(
            session.messages,
            vec![ChatMessage::user("q1"), ChatMessage::assistant("a1")]
        );
    }

    #[tokio::test]
    async fn test_history_stays_bounded_across_many_turns() {
        let manager = MemoryManager::default();
        let summarizer = counting_summarizer();

        for turn in 0..20 {
            manager.maybe_compact("s1", &summarizer).await.unwrap();
            manager
                .append_message("s1", Role::User, format!("q{}", turn))
                .await
                .unwrap();
            manager
                .append_message("s1", Role::Assistant, format!("a{}", turn))
                .await
                .unwrap();

            // never more than threshold + one new turn
            let len = manager.snapshot("s1").await.unwrap().messages.len();
            assert!(len <= 10, "history grew to {}", len);
        }

        let session = manager.snapshot("s1").await.unwrap();
        assert!(!session.summary.is_empty());
        assert_eq!(session.metadata.total_messages, 40);
    }

    #[tokio::test]
    async fn test_compaction_is_noop_when_under_threshold() {
        let manager = MemoryManager::default();
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_summarize().never();

        manager.append_message("s1", Role::User, "q").await.unwrap();
        assert!(!manager.maybe_compact("s1", &summarizer).await.unwrap());
    }

    #[tokio::test]
    async fn test_build_prompt_ends_with_question() {
        let manager = MemoryManager::default();
        manager.append_message("s1", Role::User, "q1").await.unwrap();
        manager.append_message("s1", Role::Assistant, "a1").await.unwrap();

        let prompt = manager.build_prompt("s1", "q2").await.unwrap();
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt.last(), Some(&ChatMessage::user("q2")));

        // building a prompt does not record the question
        let session = manager.snapshot("s1").await.unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let manager = Arc::new(MemoryManager::default());

        let mut tasks = Vec::new();
        for s in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("session-{}", s);
                for i in 0..5 {
                    manager
                        .append_message(&key, Role::User, format!("{}-{}", key, i))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        for s in 0..8 {
            let key = format!("session-{}", s);
            let session = manager.snapshot(&key).await.unwrap();
            assert_eq!(session.messages.len(), 5);
            assert!(session
                .messages
                .iter()
                .all(|m| m.content.starts_with(&format!("{}-", key))));
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends_on_one_key_are_not_lost() {
        let manager = Arc::new(MemoryManager::default());

        let mut tasks = Vec::new();
        for i in 0..50 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager
                    .append_message("shared", Role::User, format!("m{}", i))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let session = manager.snapshot("shared").await.unwrap();
        assert_eq!(session.messages.len(), 50);
    }
}
