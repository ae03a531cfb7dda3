use tracing::{debug, info, warn};

use super::summarizer::Summarizer;
use crate::config::MemoryConfig;
use crate::models::{ChatMessage, Role, SessionKey};
use crate::utils::error::RagError;

/// Prefix of the system message that carries the rolling summary
pub const SUMMARY_PREFIX: &str = "Conversation summary:\n";

/// When and how history gets folded into the summary.
#[derive(Debug, Clone)]
pub struct CompactionPolicy {
    /// Compact once `messages.len()` exceeds this
    pub threshold: usize,
    /// Messages kept verbatim after compaction
    pub retain_recent: usize,
    /// Pull the split one message earlier when the retained window would start
    /// with an assistant reply whose question is being summarized away
    pub align_pairs: bool,
}

impl CompactionPolicy {
    pub fn new(threshold: usize, retain_recent: usize, align_pairs: bool) -> Self {
        let threshold = threshold.max(1);
        // retain_recent < threshold, otherwise compaction could never shrink history
        let retain_recent = retain_recent.min(threshold - 1);
        Self {
            threshold,
            retain_recent,
            align_pairs,
        }
    }

    pub fn needs_compaction(&self, messages: &[ChatMessage]) -> bool {
        messages.len() > self.threshold
    }

    /// Index of the first retained message
    pub fn split_point(&self, messages: &[ChatMessage]) -> usize {
        let split = messages.len().saturating_sub(self.retain_recent);

        if self.align_pairs
            && split > 0
            && messages.get(split).is_some_and(|m| m.role == Role::Assistant)
            && messages[split - 1].role == Role::User
        {
            return split - 1;
        }

        split
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::new(8, 4, false)
    }
}

impl From<&MemoryConfig> for CompactionPolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self::new(
            config.compaction_threshold,
            config.retain_recent,
            config.align_pairs,
        )
    }
}

/// Conversation state for one session key
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,

    /// Rolling summary of everything compacted away (empty until first compaction)
    pub summary: String,

    /// Raw history in insertion order
    pub messages: Vec<ChatMessage>,

    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    /// Messages ever appended (survives compaction)
    pub total_messages: usize,

    pub compactions: usize,
}

impl Session {
    pub fn new(key: impl Into<SessionKey>) -> Self {
        Self {
            key: key.into(),
            summary: String::new(),
            messages: Vec::new(),
            metadata: SessionMetadata::default(),
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.metadata.total_messages += 1;
    }

    /// Fold older history into the summary when over the threshold.
    ///
    /// The summary is computed before anything is touched, so a summarizer
    /// failure (or a dropped future) leaves the session exactly as it was.
    /// Returns whether a compaction happened.
    pub async fn maybe_compact(
        &mut self,
        summarizer: &dyn Summarizer,
        policy: &CompactionPolicy,
    ) -> Result<bool, RagError> {
        if !policy.needs_compaction(&self.messages) {
            return Ok(false);
        }

        let split = policy.split_point(&self.messages);
        let (older, recent) = self.messages.split_at(split);

        if recent.first().is_some_and(|m| m.role == Role::Assistant) {
            warn!(
                session = %self.key,
                "Retained window starts with an assistant reply whose question is being summarized"
            );
        }

        debug!(
            session = %self.key,
            older = older.len(),
            recent = recent.len(),
            "Compacting session history"
        );

        let summary = summarizer
            .summarize(older, &self.summary)
            .await
            .map_err(RagError::Compaction)?;

        self.summary = summary;
        self.messages.drain(..split);
        self.metadata.compactions += 1;

        info!(
            session = %self.key,
            retained = self.messages.len(),
            compactions = self.metadata.compactions,
            "Session compacted"
        );

        Ok(true)
    }

    /// Summary (if any) + history + the new question, in that order
    pub fn build_prompt(&self, question: &str) -> Vec<ChatMessage> {
        let mut prompt = Vec::with_capacity(self.messages.len() + 2);

        if !self.summary.is_empty() {
            prompt.push(ChatMessage::system(format!(
                "{}{}",
                SUMMARY_PREFIX, self.summary
            )));
        }

        prompt.extend(self.messages.iter().cloned());
        prompt.push(ChatMessage::user(question));
        prompt
    }
}
