pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::Storage;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Factory: create the storage backend named in config.
pub fn create_storage(backend: &str, data_dir: &Path) -> Result<Arc<dyn Storage>> {
    match backend.trim().to_ascii_lowercase().as_str() {
        "sqlite" => Ok(Arc::new(SqliteStorage::new(data_dir)?)),
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        other => anyhow::bail!("Unknown storage backend: {other}. Supported: sqlite, memory."),
    }
}
