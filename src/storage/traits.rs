//! Durable key-value storage capability.

use anyhow::Result;
use async_trait::async_trait;

/// A passive durable store with read-your-writes consistency.
///
/// The session subsystem reads at initialization and writes after each
/// mutation; it never relies on the store for coordination. Values are
/// opaque strings (serialized JSON in practice) keyed by caller-chosen
/// namespaced keys.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the value for a key, or `None` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous value for the key.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// The name of this storage backend implementation.
    fn name(&self) -> &str;
}
