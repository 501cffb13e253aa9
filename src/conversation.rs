//! # Feature: Conversation State
//!
//! Append-only message history for one chat session, together with the active
//! mode, tone, typing indicator, and the rolling context handed to the model.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Session store with persistence on every append

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::history::HistoryStore;
use crate::modes::{Mode, Tone};
use crate::training::GREETING;

pub const DEFAULT_CONTEXT_WINDOW_CHARS: usize = 2000;

/// A conversation shared between request handlers and in-flight turns.
pub type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: &str) -> Self {
        Message {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn greeting() -> Self {
        Message::new(Role::Assistant, GREETING)
    }
}

/// The last `max_chars` characters of the exchange, oldest text dropped first.
#[derive(Debug, Clone)]
pub struct ContextBuffer {
    text: String,
    max_chars: usize,
}

impl ContextBuffer {
    pub fn new(max_chars: usize) -> Self {
        ContextBuffer {
            text: String::new(),
            max_chars,
        }
    }

    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.text.push_str(&format!("User: {}\nAssistant: {}\n", user, assistant));

        let len = self.text.chars().count();
        if len > self.max_chars {
            let cut = self
                .text
                .char_indices()
                .nth(len - self.max_chars)
                .map(|(index, _)| index)
                .unwrap_or(self.text.len());
            self.text.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

pub struct Conversation {
    session_id: String,
    messages: Vec<Message>,
    mode: Mode,
    tone: Tone,
    typing: bool,
    context: ContextBuffer,
    history: Arc<dyn HistoryStore>,
}

impl Conversation {
    /// A fresh session holding only the greeting.
    pub fn new(session_id: &str, history: Arc<dyn HistoryStore>, context_window_chars: usize) -> Self {
        Conversation {
            session_id: session_id.to_string(),
            messages: vec![Message::greeting()],
            mode: Mode::default(),
            tone: Tone::default(),
            typing: false,
            context: ContextBuffer::new(context_window_chars),
            history,
        }
    }

    /// Picks a session back up from persisted history, or starts fresh.
    pub async fn restore(
        session_id: &str,
        history: Arc<dyn HistoryStore>,
        context_window_chars: usize,
    ) -> Self {
        let mut conversation = Self::new(session_id, history.clone(), context_window_chars);

        let stored = match history.get(session_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to load history for session {}: {}", session_id, e);
                Vec::new()
            }
        };

        if !stored.is_empty() {
            debug!("Restored {} message(s) for session {}", stored.len(), session_id);
            for pair in stored.windows(2) {
                if pair[0].role == Role::User && pair[1].role == Role::Assistant {
                    conversation.context.record_turn(&pair[0].text, &pair[1].text);
                }
            }
            conversation.messages = stored;
        }

        conversation
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    /// Context for the next prompt, if anything has been said yet.
    pub fn context(&self) -> Option<String> {
        if self.context.is_empty() {
            None
        } else {
            Some(self.context.as_str().to_string())
        }
    }

    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.context.record_turn(user, assistant);
    }

    /// Pushes a message and persists the whole history.
    pub async fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.persist().await;
    }

    /// Switches mode; unknown names are ignored and leave the mode as it was.
    pub async fn set_mode(&mut self, raw: &str) -> bool {
        match raw.parse::<Mode>() {
            Ok(mode) => {
                self.mode = mode;
                self.append(Message::new(Role::Assistant, mode.announcement())).await;
                true
            }
            Err(_) => {
                debug!("Ignoring unknown mode '{}' for session {}", raw, self.session_id);
                false
            }
        }
    }

    pub async fn set_tone(&mut self, raw: &str) -> bool {
        match raw.parse::<Tone>() {
            Ok(tone) => {
                self.tone = tone;
                self.append(Message::new(Role::Assistant, &tone.announcement())).await;
                true
            }
            Err(_) => {
                debug!("Ignoring unknown tone '{}' for session {}", raw, self.session_id);
                false
            }
        }
    }

    /// Back to a single greeting with default mode and tone.
    ///
    /// Stored history is dropped before the greeting is written back.
    pub async fn reset(&mut self) {
        if let Err(e) = self.history.clear(&self.session_id).await {
            warn!("Failed to clear history for session {}: {}", self.session_id, e);
        }
        self.messages = vec![Message::greeting()];
        self.context.clear();
        self.mode = Mode::default();
        self.tone = Tone::default();
        self.typing = false;
        self.persist().await;
    }

    async fn persist(&self) {
        if let Err(e) = self.history.store(&self.session_id, &self.messages).await {
            warn!("Failed to persist history for session {}: {}", self.session_id, e);
        }
    }
}
