use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlite::{Connection, State};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::conversation::{Message, Role};
use crate::history::HistoryStore;

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        let connection = sqlite::open(database_path)?;
        let db = Database {
            connection: Arc::new(Mutex::new(connection)),
        };

        db.init_tables().await?;
        info!("Database initialized at: {}", database_path);
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        let conn = self.connection.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversation_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_position
             ON conversation_history(session_id, position)",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS usage_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                route TEXT NOT NULL,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        Ok(())
    }

    /// Records which handler answered a message.
    pub async fn log_usage(&self, session_id: &str, mode: &str, route: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO usage_stats (session_id, mode, route) VALUES (?, ?, ?)"
        )?;
        statement.bind((1, session_id))?;
        statement.bind((2, mode))?;
        statement.bind((3, route))?;
        statement.next()?;
        Ok(())
    }

    pub async fn usage_count(&self, route: &str) -> Result<i64> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT COUNT(*) AS total FROM usage_stats WHERE route = ?")?;
        statement.bind((1, route))?;

        if let Ok(State::Row) = statement.next() {
            Ok(statement.read::<i64, _>("total")?)
        } else {
            Ok(0)
        }
    }

    fn replace_history(conn: &Connection, session_id: &str, history: &[Message]) -> Result<()> {
        let mut statement = conn.prepare("DELETE FROM conversation_history WHERE session_id = ?")?;
        statement.bind((1, session_id))?;
        statement.next()?;

        for (position, message) in history.iter().enumerate() {
            let mut statement = conn.prepare(
                "INSERT INTO conversation_history (session_id, position, role, content, timestamp)
                 VALUES (?, ?, ?, ?, ?)"
            )?;
            statement.bind((1, session_id))?;
            statement.bind((2, position as i64))?;
            statement.bind((3, message.role.as_str()))?;
            statement.bind((4, message.text.as_str()))?;
            statement.bind((5, message.timestamp.to_rfc3339().as_str()))?;
            statement.next()?;
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for Database {
    async fn store(&self, session_id: &str, history: &[Message]) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute("BEGIN TRANSACTION")?;
        match Self::replace_history(&conn, session_id, history) {
            Ok(()) => {
                conn.execute("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = conn.execute("ROLLBACK") {
                    warn!("Rollback failed for session {}: {}", session_id, rollback);
                }
                Err(e)
            }
        }
    }

    async fn get(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT role, content, timestamp FROM conversation_history
             WHERE session_id = ?
             ORDER BY position ASC"
        )?;
        statement.bind((1, session_id))?;

        let mut history = Vec::new();
        while let Ok(State::Row) = statement.next() {
            let role = statement.read::<String, _>("role")?;
            let content = statement.read::<String, _>("content")?;
            let timestamp = statement.read::<String, _>("timestamp")?;

            let Ok(role) = role.parse::<Role>() else {
                warn!("Skipping stored message with unknown role '{}'", role);
                continue;
            };
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            history.push(Message {
                role,
                text: content,
                timestamp,
            });
        }
        Ok(history)
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM conversation_history WHERE session_id = ?")?;
        statement.bind((1, session_id))?;
        statement.next()?;
        info!("Cleared conversation history for session {}", session_id);
        Ok(())
    }
}
