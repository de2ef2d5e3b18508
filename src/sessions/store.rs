//! Single-conversation state: an ordered message log plus metadata.
//!
//! Each `Conversation` hydrates lazily from storage on its first operation
//! and then serves everything from memory, persisting after every mutation.
//! Callers must serialize access per key (the registry hands out each
//! conversation behind its own async mutex).

use anyhow::{Context, Result};
use std::sync::Arc;

use super::traits::{
    now_millis, ContextMessage, ContextSnapshot, HistorySnapshot, Message, Role, SessionMetadata,
};
use crate::error::ApiError;
use crate::storage::Storage;

/// Maximum messages retained per conversation; oldest are dropped first.
pub const MAX_HISTORY_MESSAGES: usize = 50;
/// Number of recent turns included in the condensed model context.
pub const CONTEXT_WINDOW: usize = 10;
/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

pub struct Conversation {
    key: String,
    storage: Arc<dyn Storage>,
    messages: Vec<Message>,
    metadata: SessionMetadata,
    loaded: bool,
}

impl Conversation {
    pub fn new(key: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            key: key.to_string(),
            storage,
            messages: Vec::new(),
            metadata: SessionMetadata::new(now_millis()),
            loaded: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn messages_key(&self) -> String {
        format!("conv:{}:messages", self.key)
    }

    fn metadata_key(&self) -> String {
        format!("conv:{}:metadata", self.key)
    }

    /// Hydrate from storage on the first operation. Absent keys leave the
    /// fresh defaults in place; a malformed stored payload is propagated,
    /// not silently replaced.
    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        if let Some(raw) = self.storage.get(&self.messages_key()).await? {
            self.messages = serde_json::from_str(&raw).with_context(|| {
                format!("Malformed stored message log for conversation '{}'", self.key)
            })?;
        }
        if let Some(raw) = self.storage.get(&self.metadata_key()).await? {
            self.metadata = serde_json::from_str(&raw).with_context(|| {
                format!("Malformed stored metadata for conversation '{}'", self.key)
            })?;
        }
        self.loaded = true;
        Ok(())
    }

    /// Write the log, then the metadata. Two separate writes: if the second
    /// fails the in-memory state is already mutated and storage lags until
    /// the next successful persist.
    async fn persist(&self) -> Result<()> {
        let messages = serde_json::to_string(&self.messages)
            .context("Failed to serialize message log")?;
        self.storage.put(&self.messages_key(), &messages).await?;
        let metadata = serde_json::to_string(&self.metadata)
            .context("Failed to serialize session metadata")?;
        self.storage.put(&self.metadata_key(), &metadata).await?;
        Ok(())
    }

    fn touch(&mut self, now: i64) {
        // Monotonic even if the wall clock steps backwards.
        self.metadata.last_activity_at = now.max(self.metadata.last_activity_at);
    }

    /// Append one turn and persist. Returns the new total message count.
    ///
    /// The log is truncated to the most recent [`MAX_HISTORY_MESSAGES`]
    /// immediately after the append; appends are never rejected for size.
    pub async fn append(
        &mut self,
        role: Role,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        if content.is_empty() {
            return Err(ApiError::validation("Missing role or content"));
        }
        self.ensure_loaded().await?;

        let now = now_millis();

        // First writer wins; later appends never overwrite.
        if self.metadata.user_id.is_empty() {
            if let Some(user_id) = user_id.filter(|u| !u.is_empty()) {
                self.metadata.user_id = user_id.to_string();
            }
        }

        self.messages.push(Message {
            role,
            content: content.to_string(),
            timestamp: now,
        });
        self.touch(now);

        if self.messages.len() > MAX_HISTORY_MESSAGES {
            let overflow = self.messages.len() - MAX_HISTORY_MESSAGES;
            self.messages.drain(..overflow);
        }

        self.persist().await?;
        Ok(self.messages.len())
    }

    /// Read the most recent `limit` turns (default 20, no upper clamp),
    /// plus metadata and the total count. Read-only.
    pub async fn history(&mut self, limit: Option<usize>) -> Result<HistorySnapshot, ApiError> {
        self.ensure_loaded().await?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let start = self.messages.len().saturating_sub(limit);
        Ok(HistorySnapshot {
            messages: self.messages[start..].to_vec(),
            metadata: self.metadata.clone(),
            total_messages: self.messages.len(),
        })
    }

    /// Read the condensed prompt context: the last [`CONTEXT_WINDOW`] turns
    /// with timestamps stripped. Read-only.
    pub async fn context(&mut self) -> Result<ContextSnapshot, ApiError> {
        self.ensure_loaded().await?;
        let start = self.messages.len().saturating_sub(CONTEXT_WINDOW);
        let context = self.messages[start..]
            .iter()
            .map(|m| ContextMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        Ok(ContextSnapshot {
            context,
            message_count: self.messages.len(),
        })
    }

    /// Empty the message log and persist. `created_at` and `user_id` are
    /// untouched; only `last_activity_at` moves.
    pub async fn clear(&mut self) -> Result<(), ApiError> {
        self.ensure_loaded().await?;
        self.messages.clear();
        self.touch(now_millis());
        self.persist().await?;
        Ok(())
    }
}
