//! Chat-completion client for an OpenAI-compatible API.

pub mod summary;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model used for report summaries.
pub const SUMMARY_MODEL: &str = "gpt-4o";
/// Completion budget for one summary.
pub const SUMMARY_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Thin chat-completion client authenticated with a per-event API key.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Point at an OpenAI-compatible endpoint (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send one completion request and return the first choice's text.
    ///
    /// Returns `Ok(None)` when the response carries no content, a valid
    /// degraded outcome, distinct from the transport and auth failures
    /// reported as `LlmRequest` errors.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<Option<String>> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens,
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::LlmRequest(format!("chat completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmRequest(format!(
                "chat completion returned HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmRequest(format!("unexpected completion payload: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty()))
    }
}
