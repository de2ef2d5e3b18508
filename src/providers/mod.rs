//! Provider subsystem for model inference backends.
//!
//! Each backend implements the [`Provider`] trait defined in [`traits`] and
//! is registered in the factory function [`create_provider`] by its
//! canonical string key.

pub mod compatible;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use traits::{PromptMessage, Provider, SamplingParams};

use std::sync::Arc;

const MAX_API_ERROR_CHARS: usize = 200;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings
/// before they can reach a client-visible `details` field.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 3] = ["sk-", "sk_", "api-key-"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Resolve the API key from an explicit value or the environment.
fn resolve_provider_credential(credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed = raw_override.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_owned());
        }
    }

    for env_var in ["CHATRELAY_API_KEY", "OPENAI_API_KEY", "API_KEY"] {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Factory: create the provider named in config, with an optional base URL
/// override for self-hosted or gateway endpoints.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    model: &str,
) -> anyhow::Result<Arc<dyn Provider>> {
    let credential = resolve_provider_credential(api_key);
    let key = credential.as_deref();

    match name.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatibleProvider::new(
            "openai",
            api_url.unwrap_or(DEFAULT_OPENAI_URL),
            key,
            model,
        ))),
        "compatible" => {
            let url = api_url.ok_or_else(|| {
                anyhow::anyhow!("Provider \"compatible\" requires api_url in config")
            })?;
            Ok(Arc::new(OpenAiCompatibleProvider::new(
                "compatible",
                url,
                key,
                model,
            )))
        }
        other => anyhow::bail!(
            "Unknown provider: {other}. Supported: \"openai\", \"compatible\" (any OpenAI-compatible endpoint via api_url)."
        ),
    }
}
