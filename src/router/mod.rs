//! Request orchestration: validate, fetch context, infer, record turns.
//!
//! The router never holds conversation state itself. For each request it
//! resolves a short-lived handle from the registry, reads the condensed
//! context, calls the provider, then appends the user and assistant turns
//! in that order. The two appends are not transactional: a failure between
//! them leaves the log missing one half of the pair.

use std::sync::Arc;

use crate::error::ApiError;
use crate::providers::{PromptMessage, Provider, SamplingParams};
use crate::sessions::{now_millis, HistorySnapshot, Role, SessionRegistry};

/// Persona used when the caller supplies no system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly, and intelligent AI assistant. \
You have access to conversation history and can provide contextual responses. \
Be concise but informative. If you don't know something, admit it honestly.";

/// Substituted when the provider returns no text.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I could not generate a response.";

pub const DEFAULT_CONVERSATION_ID: &str = "default";
pub const DEFAULT_USER_ID: &str = "anonymous";

const CHAT_ERROR_SUMMARY: &str = "Failed to process chat request";
const HISTORY_ERROR_SUMMARY: &str = "Failed to retrieve history";
const CLEAR_ERROR_SUMMARY: &str = "Failed to clear history";

/// A validated chat request after defaults are applied.
#[derive(Debug, Clone)]
pub struct ChatParams<'a> {
    pub message: &'a str,
    pub conversation_id: &'a str,
    pub user_id: &'a str,
    pub system_prompt: Option<&'a str>,
}

/// Outcome of a successful chat cycle.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub conversation_id: String,
    pub timestamp: i64,
}

pub struct ChatRouter {
    sessions: SessionRegistry,
    provider: Arc<dyn Provider>,
    sampling: SamplingParams,
}

impl ChatRouter {
    pub fn new(
        sessions: SessionRegistry,
        provider: Arc<dyn Provider>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            sessions,
            provider,
            sampling,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run one chat cycle: context, inference, double append.
    pub async fn chat(
        &self,
        message: Option<&str>,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<ChatOutcome, ApiError> {
        let message = message
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::validation("Message is required and must be a string"))?;

        let params = ChatParams {
            message,
            conversation_id: conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID),
            user_id: user_id.unwrap_or(DEFAULT_USER_ID),
            system_prompt,
        };

        let conversation = self.sessions.resolve(params.conversation_id);

        let context = conversation
            .lock()
            .await
            .context()
            .await
            .map_err(|e| e.summarized(CHAT_ERROR_SUMMARY))?;

        let mut prompt = Vec::with_capacity(context.context.len() + 2);
        prompt.push(PromptMessage::new(
            Role::System.as_str(),
            params.system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
        ));
        prompt.extend(
            context
                .context
                .iter()
                .map(|m| PromptMessage::new(m.role.as_str(), m.content.clone())),
        );
        prompt.push(PromptMessage::new(Role::User.as_str(), params.message));

        tracing::debug!(
            conversation = %params.conversation_id,
            prompt_len = prompt.len(),
            "Invoking provider"
        );

        let generated = self
            .provider
            .complete(&prompt, &self.sampling)
            .await
            .map_err(|e| ApiError::internal(CHAT_ERROR_SUMMARY, e))?;

        let response = if generated.is_empty() {
            FALLBACK_RESPONSE.to_string()
        } else {
            generated
        };

        // User turn first, assistant turn second. If the second append
        // fails the first is not rolled back.
        conversation
            .lock()
            .await
            .append(Role::User, params.message, Some(params.user_id))
            .await
            .map_err(|e| e.summarized(CHAT_ERROR_SUMMARY))?;
        conversation
            .lock()
            .await
            .append(Role::Assistant, &response, Some(params.user_id))
            .await
            .map_err(|e| e.summarized(CHAT_ERROR_SUMMARY))?;

        Ok(ChatOutcome {
            response,
            conversation_id: params.conversation_id.to_string(),
            timestamp: now_millis(),
        })
    }

    /// Pass-through history read.
    pub async fn history(
        &self,
        conversation_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<HistorySnapshot, ApiError> {
        let conversation = self
            .sessions
            .resolve(conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID));
        let result = conversation
            .lock()
            .await
            .history(limit)
            .await
            .map_err(|e| e.summarized(HISTORY_ERROR_SUMMARY));
        result
    }

    /// Pass-through clear.
    pub async fn clear(&self, conversation_id: Option<&str>) -> Result<(), ApiError> {
        let conversation = self
            .sessions
            .resolve(conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID));
        let result = conversation
            .lock()
            .await
            .clear()
            .await
            .map_err(|e| e.summarized(CLEAR_ERROR_SUMMARY));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records every prompt it receives and returns a canned reply.
    struct MockProvider {
        reply: String,
        prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl MockProvider {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> Vec<PromptMessage> {
            self.prompts.lock().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn complete(
            &self,
            messages: &[PromptMessage],
            _params: &SamplingParams,
        ) -> anyhow::Result<String> {
            self.prompts.lock().push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(
            &self,
            _messages: &[PromptMessage],
            _params: &SamplingParams,
        ) -> anyhow::Result<String> {
            anyhow::bail!("upstream unavailable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn router_with(provider: Arc<dyn Provider>) -> ChatRouter {
        ChatRouter::new(
            SessionRegistry::new(Arc::new(MemoryStorage::new())),
            provider,
            SamplingParams::default(),
        )
    }

    #[tokio::test]
    async fn first_chat_builds_two_entry_prompt_and_records_both_turns() {
        let provider = MockProvider::replying("hello");
        let router = router_with(provider.clone());

        let outcome = router.chat(Some("hi"), None, None, None).await.unwrap();
        assert_eq!(outcome.response, "hello");
        assert_eq!(outcome.conversation_id, "default");
        assert!(outcome.timestamp > 0);

        let prompt = provider.last_prompt();
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, "system");
        assert_eq!(prompt[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prompt[1].role, "user");
        assert_eq!(prompt[1].content, "hi");

        let history = router.history(None, None).await.unwrap();
        assert_eq!(history.total_messages, 2);
        assert_eq!(history.messages[0].role, Role::User);
        assert_eq!(history.messages[0].content, "hi");
        assert_eq!(history.messages[1].role, Role::Assistant);
        assert_eq!(history.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn second_chat_carries_prior_context_in_order() {
        let provider = MockProvider::replying("sure");
        let router = router_with(provider.clone());

        router.chat(Some("first"), None, None, None).await.unwrap();
        router.chat(Some("second"), None, None, None).await.unwrap();

        let prompt = provider.last_prompt();
        // system + 2 prior turns + new user message
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[1].content, "first");
        assert_eq!(prompt[2].content, "sure");
        assert_eq!(prompt[3].content, "second");
    }

    #[tokio::test]
    async fn caller_system_prompt_replaces_default() {
        let provider = MockProvider::replying("aye");
        let router = router_with(provider.clone());

        router
            .chat(Some("hi"), None, None, Some("You are a pirate."))
            .await
            .unwrap();
        assert_eq!(provider.last_prompt()[0].content, "You are a pirate.");
    }

    #[tokio::test]
    async fn missing_message_is_a_validation_error() {
        let router = router_with(MockProvider::replying("x"));
        let err = router.chat(None, None, None, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.to_string(), "Message is required and must be a string");
    }

    #[tokio::test]
    async fn empty_message_is_a_validation_error() {
        let router = router_with(MockProvider::replying("x"));
        let err = router.chat(Some(""), None, None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Message is required and must be a string");
    }

    #[tokio::test]
    async fn empty_provider_text_falls_back_to_apology() {
        let router = router_with(MockProvider::replying(""));
        let outcome = router.chat(Some("hi"), None, None, None).await.unwrap();
        assert_eq!(outcome.response, FALLBACK_RESPONSE);

        // The apology is recorded as the assistant turn.
        let history = router.history(None, None).await.unwrap();
        assert_eq!(history.messages[1].content, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_internal_and_records_nothing() {
        let router = router_with(Arc::new(FailingProvider));
        let err = router.chat(Some("hi"), None, None, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
        assert_eq!(err.to_string(), "Failed to process chat request");

        // The inference call failed before either append ran.
        assert_eq!(router.history(None, None).await.unwrap().total_messages, 0);
    }

    #[tokio::test]
    async fn user_id_reaches_session_metadata() {
        let router = router_with(MockProvider::replying("ok"));
        router
            .chat(Some("hi"), Some("c1"), Some("erin"), None)
            .await
            .unwrap();
        let history = router.history(Some("c1"), None).await.unwrap();
        assert_eq!(history.metadata.user_id, "erin");
    }

    #[tokio::test]
    async fn conversations_are_keyed_independently() {
        let router = router_with(MockProvider::replying("ok"));
        router.chat(Some("a"), Some("one"), None, None).await.unwrap();
        router.chat(Some("b"), Some("two"), None, None).await.unwrap();

        assert_eq!(router.history(Some("one"), None).await.unwrap().total_messages, 2);
        assert_eq!(router.history(Some("two"), None).await.unwrap().total_messages, 2);
        assert_eq!(router.history(Some("three"), None).await.unwrap().total_messages, 0);
    }

    #[tokio::test]
    async fn clear_resets_history_through_the_router() {
        let router = router_with(MockProvider::replying("ok"));
        router.chat(Some("hi"), None, None, None).await.unwrap();
        router.clear(None).await.unwrap();
        assert_eq!(router.history(None, None).await.unwrap().total_messages, 0);
    }

    #[tokio::test]
    async fn context_window_limits_prompt_size() {
        let provider = MockProvider::replying("r");
        let router = router_with(provider.clone());

        // 6 chat cycles = 12 stored turns; context carries only the last 10.
        for i in 0..6 {
            router
                .chat(Some(&format!("q{i}")), None, None, None)
                .await
                .unwrap();
        }
        let prompt = provider.last_prompt();
        // system + 10 context turns + new user message
        assert_eq!(prompt.len(), 12);
    }
}
