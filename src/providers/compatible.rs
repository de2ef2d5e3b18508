//! Generic OpenAI-compatible provider.
//! Most hosted LLM APIs follow the same `/v1/chat/completions` format, so a
//! single implementation covers OpenAI, OpenRouter, Groq, Workers AI
//! gateways, and self-hosted endpoints alike.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{PromptMessage, Provider, SamplingParams};

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            model: model.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build the chat completions URL, detecting whether the base URL
    /// already names the endpoint (custom gateways often do).
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| {
                self.base_url
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            });

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        params: &SamplingParams,
    ) -> anyhow::Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Set api_key in config.toml or the CHATRELAY_API_KEY env var.",
                self.name
            )
        })?;

        let request = ChatCompletionsRequest {
            model: &self.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stream: Some(false),
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let completion: ChatCompletionsResponse = response.json().await?;

        // No choice or no content is not an error here; the router decides
        // what to substitute for empty text.
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
    ) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(name, base_url, api_key, "llama-3.3-70b-instruct")
    }

    #[test]
    fn creates_with_key_and_strips_trailing_slash() {
        let p = make_provider("openai", "https://api.openai.com/v1/", Some("test-key"));
        assert_eq!(p.base_url, "https://api.openai.com/v1");
        assert_eq!(p.api_key.as_deref(), Some("test-key"));
        assert_eq!(p.model, "llama-3.3-70b-instruct");
    }

    #[test]
    fn url_appends_chat_completions() {
        let p = make_provider("openai", "https://api.openai.com/v1", None);
        assert_eq!(
            p.chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn url_keeps_explicit_endpoint() {
        let p = make_provider(
            "custom",
            "https://gateway.example.com/api/v3/chat/completions",
            None,
        );
        assert_eq!(
            p.chat_completions_url(),
            "https://gateway.example.com/api/v3/chat/completions"
        );
    }

    #[tokio::test]
    async fn complete_fails_without_key() {
        let p = make_provider("openai", "https://api.openai.com/v1", None);
        let result = p
            .complete(
                &[PromptMessage::new("user", "hello")],
                &SamplingParams::default(),
            )
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not set"));
    }

    #[test]
    fn request_serializes_sampling_params() {
        let messages = vec![
            PromptMessage::new("system", "You are helpful."),
            PromptMessage::new("user", "hi"),
        ];
        let req = ChatCompletionsRequest {
            model: "llama-3.3-70b-instruct",
            messages: &messages,
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            stream: Some(false),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["top_p"], 0.9);
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn response_with_content_deserializes() {
        let json = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let resp: ChatCompletionsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[test]
    fn response_with_empty_choices_deserializes() {
        let json = r#"{"choices":[]}"#;
        let resp: ChatCompletionsResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices.is_empty());
    }
}
