//! The language-model collaborator.
//!
//! Tasks talk to a model through [`LlmClient`], a single `send` call over
//! OpenAI-style chat messages. Transport, endpoints and credentials belong to
//! the implementation. Failures it returns are retried by the task's policy
//! unless they are one of the final kinds (see [`Error::is_retryable`]).
//!
//! [`Error::is_retryable`]: crate::Error::is_retryable

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;

/// Sampling temperature used when a request does not set one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// A system (instruction) message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An assistant message, e.g. a previous model reply.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Provider-specific model identifier.
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl ChatRequest {
    /// A request with the default temperature.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// The model's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text of the first choice.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// A reply without usage information.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// A model endpoint.
///
/// `send` may be called repeatedly for the same request when a task retries.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one request and wait for the full reply.
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Returns a human-readable name for this client. Defaults to the type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<T> LlmClient for Arc<T>
where
    T: LlmClient + ?Sized,
{
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).send(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest::new(
            "z-ai/glm-4.6",
            vec![
                ChatMessage::system("You are a cynical VC analyst."),
                ChatMessage::user("Idea: cats drive cars"),
            ],
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "z-ai/glm-4.6",
                "messages": [
                    {"role": "system", "content": "You are a cynical VC analyst."},
                    {"role": "user", "content": "Idea: cats drive cars"}
                ],
                "temperature": 0.7f32
            })
        );
    }

    #[test]
    fn test_request_temperature_defaults_when_absent() {
        let request: ChatRequest =
            serde_json::from_value(json!({"model": "m", "messages": []})).unwrap();
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_response_without_usage() {
        let response: ChatResponse = serde_json::from_value(json!({"content": "FUND"})).unwrap();
        assert_eq!(response, ChatResponse::text("FUND"));
    }
}
