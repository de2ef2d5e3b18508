//! Lazy conversation registry.
//!
//! One serialized state object per conversation key, created on first
//! access and kept for the lifetime of the process. The outer map lock is
//! held only to resolve an entry, never across an await; the per-key async
//! mutex is what serializes operations against one conversation while
//! letting different keys proceed in parallel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use super::store::Conversation;
use crate::storage::Storage;

pub type ConversationHandle = Arc<AsyncMutex<Conversation>>;

pub struct SessionRegistry {
    storage: Arc<dyn Storage>,
    conversations: Mutex<HashMap<String, ConversationHandle>>,
}

impl SessionRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the conversation for a key, creating it on first access.
    ///
    /// Any string is a valid key, including the empty string; keys collide
    /// only on exact equality. Entries are never evicted.
    pub fn resolve(&self, key: &str) -> ConversationHandle {
        let mut conversations = self.conversations.lock();
        conversations
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(conversation = %key, "Creating conversation state");
                Arc::new(AsyncMutex::new(Conversation::new(key, self.storage.clone())))
            })
            .clone()
    }

    /// Number of live conversation entries.
    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::Role;
    use crate::storage::MemoryStorage;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn same_key_resolves_to_same_state() {
        let registry = registry();
        let a = registry.resolve("default");
        a.lock().await.append(Role::User, "hi", None).await.unwrap();

        let b = registry.resolve("default");
        assert_eq!(b.lock().await.history(None).await.unwrap().total_messages, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_are_isolated() {
        let registry = registry();
        registry
            .resolve("a")
            .lock()
            .await
            .append(Role::User, "for a", None)
            .await
            .unwrap();

        let b = registry.resolve("b");
        assert_eq!(b.lock().await.history(None).await.unwrap().total_messages, 0);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn empty_string_is_a_valid_distinct_key() {
        let registry = registry();
        let empty = registry.resolve("");
        empty
            .lock()
            .await
            .append(Role::User, "hello", None)
            .await
            .unwrap();
        assert_eq!(
            registry
                .resolve("default")
                .lock()
                .await
                .history(None)
                .await
                .unwrap()
                .total_messages,
            0
        );
    }

    #[tokio::test]
    async fn operations_on_one_key_are_serialized() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let conv = registry.resolve("shared");
                conv.lock()
                    .await
                    .append(Role::User, &format!("m{i}"), None)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let conv = registry.resolve("shared");
        assert_eq!(
            conv.lock().await.history(Some(100)).await.unwrap().total_messages,
            20
        );
    }
}
