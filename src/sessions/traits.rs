//! Conversation state types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation turn. Immutable once appended; ordering is append
/// order and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Per-conversation metadata persisted alongside the message log.
///
/// `user_id` is first-writer-wins: empty until the first append that carries
/// one, never overwritten after. `created_at` survives a clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub user_id: String,
    pub created_at: i64,
    pub last_activity_at: i64,
}

impl SessionMetadata {
    pub fn new(now: i64) -> Self {
        Self {
            user_id: String::new(),
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// Timestamp-stripped projection used to build the model prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

/// Result of a history read: a window of recent turns plus metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub messages: Vec<Message>,
    pub metadata: SessionMetadata,
    pub total_messages: usize,
}

/// Result of a condensed context read.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub context: Vec<ContextMessage>,
    pub message_count: usize,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn metadata_uses_camel_case_on_the_wire() {
        let meta = SessionMetadata::new(1_700_000_000_000);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("lastActivityAt").is_some());
    }

    #[test]
    fn context_message_has_no_timestamp_field() {
        let ctx = ContextMessage {
            role: Role::User,
            content: "hi".into(),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("timestamp").is_none());
    }
}
