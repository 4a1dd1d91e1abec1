//! Completion adapter: chat-completion upstream with retry and fallback.
//!
//! The adapter is the only layer allowed to see [`UpstreamError`]; by the
//! time a reply reaches the turn engine it is always a speakable string.
//! Policy: up to `max_attempts` attempts with linear backoff, then the fixed
//! spoken-safe fallback line. The caller must never hear a generic failure
//! beyond that substitute.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::app_error::UpstreamError;

/// OpenAI chat completions endpoint.
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// One role-tagged message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A conversational completion upstream. One call, one utterance; retry
/// policy lives in [`CompletionAdapter`], not in implementations.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError>;
}

// =============================================================================
// OpenAI backend
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Production backend posting to the OpenAI chat completions API.
///
/// `max_tokens` is a correctness requirement, not a tuning knob: a long
/// reply stalls the turn cycle while it is synthesized and played.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    base_url: String,
}

impl OpenAiCompletion {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            timeout,
            base_url: OPENAI_CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    /// Point the backend at a different endpoint. Used by tests with a mock
    /// HTTP server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout)
                } else {
                    UpstreamError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(UpstreamError::MalformedResponse)
    }
}

// =============================================================================
// Retry + fallback adapter
// =============================================================================

/// Retry-then-fallback policy around a [`CompletionBackend`].
#[derive(Clone)]
pub struct CompletionAdapter {
    backend: Arc<dyn CompletionBackend>,
    max_attempts: u32,
    backoff_base: Duration,
    fallback_line: String,
}

impl CompletionAdapter {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        max_attempts: u32,
        backoff_base: Duration,
        fallback_line: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
            backoff_base,
            fallback_line: fallback_line.into(),
        }
    }

    pub fn fallback_line(&self) -> &str {
        &self.fallback_line
    }

    /// Request a reply, retrying with linearly increasing backoff. On
    /// exhaustion this returns the fallback utterance instead of an error.
    pub async fn complete_or_fallback(&self, messages: &[ChatMessage]) -> String {
        for attempt in 1..=self.max_attempts {
            match self.backend.complete(messages).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "completion attempt failed"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff_base * attempt).await;
                    }
                }
            }
        }

        tracing::error!(
            attempts = self.max_attempts,
            "completion upstream exhausted, speaking fallback line"
        );
        self.fallback_line.clone()
    }
}
