use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for ids assigned client-side before the remote service confirms
/// the conversation. The store rebinds to the server id on first append.
pub const PROVISIONAL_ID_PREFIX: &str = "local-";

pub const DEFAULT_CONVERSATION_TITLE: &str = "New chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Optional specialist tag (e.g. "coding", "travel")
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Empty conversation with a provisional id, installed as the current
    /// conversation when the user starts a new chat. Persisted remotely
    /// lazily, on the first message.
    pub fn provisional() -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4()),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            specialist: None,
            is_favorite: false,
            is_archived: false,
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }

    /// Append a message, keeping `message_count` and `updated_at` in step.
    pub fn push_message(&mut self, message: ChatMessage) {
        if message.timestamp > self.updated_at {
            self.updated_at = message.timestamp;
        }
        self.messages.push(message);
        self.message_count = self.messages.len();
    }

    /// Re-establish invariants after deserialization or a remote fetch:
    /// `updated_at >= created_at`, and `message_count == messages.len()`
    /// whenever message bodies are present. A server-tracked counter is
    /// trusted only for conversations delivered without bodies.
    pub fn normalize(&mut self) {
        if !self.messages.is_empty() {
            self.message_count = self.messages.len();
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }
}
