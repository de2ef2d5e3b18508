//! Session management — per-conversation message history and metadata.

pub mod registry;
pub mod store;
pub mod traits;

pub use registry::{ConversationHandle, SessionRegistry};
pub use store::{Conversation, CONTEXT_WINDOW, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_MESSAGES};
pub use traits::{
    now_millis, ContextMessage, ContextSnapshot, HistorySnapshot, Message, Role, SessionMetadata,
};
