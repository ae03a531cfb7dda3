//! Conversation memory
//!
//! Per-session history with a rolling summary, kept in a DashMap-backed
//! store with idle expiry. Compaction folds older turns into the summary
//! once the history passes the configured threshold.

mod cache;
pub mod manager;
pub mod summarizer;
pub mod types;

pub use cache::{SessionHandle, SessionStore, StoreStats};
pub use manager::MemoryManager;
pub use summarizer::{LlmSummarizer, Summarizer};
pub use types::{CompactionPolicy, Session, SessionMetadata, SUMMARY_PREFIX};
