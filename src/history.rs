use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::conversation::Message;

/// Durable slot for a session's message history.
///
/// `store` always receives the full history and replaces whatever was kept.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn store(&self, session_id: &str, history: &[Message]) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Vec<Message>>;
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// Process-local history, lost on restart.
#[derive(Default)]
pub struct MemoryHistory {
    sessions: DashMap<String, Vec<Message>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn store(&self, session_id: &str, history: &[Message]) -> Result<()> {
        self.sessions.insert(session_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
