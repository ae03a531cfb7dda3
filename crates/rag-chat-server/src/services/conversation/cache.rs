use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::Session;
use crate::config::MemoryConfig;

/// Shared handle to one session; the mutex serializes every mutation of
/// that session while other keys proceed independently.
pub type SessionHandle = Arc<Mutex<Session>>;

struct StoreEntry {
    handle: SessionHandle,
    last_access: Instant,
}

/// In-memory session store with idle expiry and an LRU capacity bound.
///
/// A session whose handle is held outside the store is never expired or
/// evicted, so every request on one key always locks the same mutex. The
/// capacity bound can be exceeded while all sessions are in use.
pub struct SessionStore {
    entries: DashMap<String, StoreEntry>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        info!(
            "Initializing session store (ttl={:?}, max_sessions={})",
            ttl, max_sessions
        );
        Self {
            entries: DashMap::new(),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.session_ttl(), config.max_sessions)
    }

    fn is_expired(&self, entry: &StoreEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_access) > self.ttl
    }

    /// Held by a caller besides the store itself
    fn is_in_use(entry: &StoreEntry) -> bool {
        Arc::strong_count(&entry.handle) > 1
    }

    fn is_removable(&self, entry: &StoreEntry, now: Instant) -> bool {
        self.is_expired(entry, now) && !Self::is_in_use(entry)
    }

    /// Existing live session, or None. Refreshes the idle timer.
    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key) {
            if !self.is_removable(&entry, now) {
                entry.last_access = now;
                return Some(entry.handle.clone());
            }
        } else {
            return None;
        }

        // Expired: lazy deletion, unless someone refreshed it in between
        if self
            .entries
            .remove_if(key, |_, entry| self.is_removable(entry, now))
            .is_some()
        {
            debug!("Session {} expired, removed from store", key);
            return None;
        }

        // Picked up by another caller in between
        self.get(key)
    }

    pub fn get_or_create(&self, key: &str) -> SessionHandle {
        if let Some(handle) = self.get(key) {
            return handle;
        }

        if !self.entries.contains_key(key) {
            self.evict_to_capacity();
        }

        let now = Instant::now();
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            debug!("Creating session {}", key);
            StoreEntry {
                handle: Arc::new(Mutex::new(Session::new(key))),
                last_access: now,
            }
        });
        entry.handle.clone()
    }

    /// Make room for one more session by dropping the least recently used
    /// idle ones
    fn evict_to_capacity(&self) {
        while self.entries.len() >= self.max_sessions {
            let oldest = self
                .entries
                .iter()
                .filter(|entry| !Self::is_in_use(entry))
                .min_by_key(|entry| entry.last_access)
                .map(|entry| entry.key().clone());

            let Some(key) = oldest else {
                warn!(
                    "All {} sessions are in use, store temporarily over capacity",
                    self.entries.len()
                );
                break;
            };

            if self
                .entries
                .remove_if(&key, |_, entry| !Self::is_in_use(entry))
                .is_some()
            {
                info!("Evicted least recently used session {}", key);
            }
        }
    }

    /// Drop every idle-expired session; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let start_len = self.entries.len();
        self.entries.retain(|_, entry| !self.is_removable(entry, now));
        let count = start_len.saturating_sub(self.entries.len());

        if count > 0 {
            info!("Purged {} expired sessions", count);
        }

        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active_sessions: self.len(),
            max_sessions: self.max_sessions,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub ttl_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let store = SessionStore::default();
        let first = store.get_or_create("s1");
        first.lock().await.append(ChatMessage::user("hello"));

        let second = store.get_or_create("s1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.messages.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_new_session_is_empty() {
        let store = SessionStore::default();
        let handle = store.get_or_create("fresh");
        let session = handle.lock().await;
        assert_eq!(session.key, "fresh");
        assert!(session.summary.is_empty());
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(10), 100);
        store.get_or_create("s1");
        std::thread::sleep(Duration::from_millis(30));

        assert!(store.get("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(Duration::from_millis(10), 100);
        store.get_or_create("a");
        store.get_or_create("b");
        std::thread::sleep(Duration::from_millis(30));
        store.get_or_create("c");

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        store.get_or_create("a");
        std::thread::sleep(Duration::from_millis(2));
        store.get_or_create("b");
        std::thread::sleep(Duration::from_millis(2));
        // touch "a" so "b" becomes the oldest
        store.get("a");
        std::thread::sleep(Duration::from_millis(2));
        store.get_or_create("c");

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[tokio::test]
    async fn test_capacity_never_evicts_a_held_session() {
        let store = SessionStore::new(Duration::from_secs(3600), 1);
        let first = store.get_or_create("a");
        let guard = first.lock().await;

        // over capacity, but "a" is in use
        store.get_or_create("b");
        assert_eq!(store.len(), 2);

        let second = store.get_or_create("a");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.try_lock().is_err());
        drop(guard);
        drop(second);

        first.lock().await.append(ChatMessage::user("q"));
        first.lock().await.append(ChatMessage::assistant("a"));
        drop(first);

        // both idle now: creating "c" evicts down to capacity
        store.get_or_create("c");
        assert_eq!(store.len(), 1);
        assert!(store.get("c").is_some());
    }

    #[tokio::test]
    async fn test_in_flight_turn_keeps_its_history() {
        let store = SessionStore::new(Duration::from_secs(3600), 1);
        let handle = store.get_or_create("a");
        {
            let mut session = handle.lock().await;
            store.get_or_create("b");
            session.append(ChatMessage::user("q"));
            session.append(ChatMessage::assistant("answer"));
        }

        let again = store.get("a").expect("held session stays registered");
        assert_eq!(again.lock().await.messages.len(), 2);
    }

    #[test]
    fn test_held_session_does_not_expire() {
        let store = SessionStore::new(Duration::from_millis(10), 100);
        let held = store.get_or_create("held");
        store.get_or_create("idle");
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.purge_expired(), 1);
        let again = store.get("held").expect("held session survives expiry");
        assert!(Arc::ptr_eq(&held, &again));
    }
}
