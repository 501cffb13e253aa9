use anyhow::Result;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::conversation::{Conversation, Message, SharedConversation};
use crate::history::HistoryStore;

struct SessionEntry {
    conversation: SharedConversation,
    last_seen: Instant,
}

/// Live conversations by session id, restored from history on first use.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    history: Arc<dyn HistoryStore>,
    context_window_chars: usize,
}

impl SessionRegistry {
    pub fn new(history: Arc<dyn HistoryStore>, context_window_chars: usize) -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
            history,
            context_window_chars,
        }
    }

    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn get(&self, session_id: &str) -> Option<SharedConversation> {
        self.sessions.get_mut(session_id).map(|mut entry| {
            entry.last_seen = Instant::now();
            entry.conversation.clone()
        })
    }

    pub async fn get_or_restore(&self, session_id: &str) -> SharedConversation {
        if let Some(existing) = self.get(session_id) {
            return existing;
        }

        let restored = Conversation::restore(session_id, self.history.clone(), self.context_window_chars).await;
        info!("Opened session {} with {} message(s)", session_id, restored.messages().len());

        // Another request may have opened the same session while we were loading
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                conversation: Arc::new(Mutex::new(restored)),
                last_seen: Instant::now(),
            })
            .conversation
            .clone()
    }

    /// Persisted messages for a session that is not loaded, without loading it.
    pub async fn stored_history(&self, session_id: &str) -> Result<Vec<Message>> {
        self.history.get(session_id).await
    }

    /// Drops sessions untouched for `max_idle` that no turn is still using.
    ///
    /// Their history stays in the store and is restored on the next request.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|session_id, entry| {
            let keep = Arc::strong_count(&entry.conversation) > 1 || entry.last_seen.elapsed() < max_idle;
            if !keep {
                debug!("Evicting idle session {}", session_id);
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::history::MemoryHistory;

    #[tokio::test]
    async fn test_sessions_are_reused() {
        let registry = SessionRegistry::new(Arc::new(MemoryHistory::new()), 2000);
        assert!(registry.is_empty());

        let first = registry.get_or_restore("abc").await;
        first.lock().await.append(Message::new(Role::User, "hi")).await;

        let again = registry.get_or_restore("abc").await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().await.messages().len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_sessions_restore_persisted_history() {
        let history = Arc::new(MemoryHistory::new());
        history
            .store("old", &[Message::greeting(), Message::new(Role::User, "still here?")])
            .await
            .unwrap();

        let registry = SessionRegistry::new(history, 2000);
        assert_eq!(registry.stored_history("old").await.unwrap().len(), 2);
        assert!(registry.is_empty());

        let conversation = registry.get_or_restore("old").await;
        assert_eq!(conversation.lock().await.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_sessions_in_use() {
        let history = Arc::new(MemoryHistory::new());
        let registry = SessionRegistry::new(history, 2000);

        let held = registry.get_or_restore("busy").await;
        let released = registry.get_or_restore("idle").await;
        released.lock().await.append(Message::new(Role::User, "remember me")).await;
        drop(released);

        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);
        assert!(registry.get("idle").is_none());
        assert!(registry.get("busy").is_some());
        drop(held);

        let restored = registry.get_or_restore("idle").await;
        assert_eq!(restored.lock().await.messages().len(), 2);
    }

    #[test]
    fn test_new_session_ids_are_unique() {
        assert_ne!(SessionRegistry::new_session_id(), SessionRegistry::new_session_id());
    }
}
