//! Inference provider trait and prompt types.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry in the ordered prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Sampling parameters forwarded with every inference call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A hosted text-completion capability.
///
/// Implementations take an ordered message list plus sampling parameters
/// and return generated text. An empty string means the model produced no
/// text; callers decide what to substitute.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage], params: &SamplingParams)
        -> Result<String>;

    /// The name of this provider implementation.
    fn name(&self) -> &str;
}
