use crate::client::{ChatSettings, Conversation, DEFAULT_SYSTEM_INSTRUCTION, Provider, settle};
use crate::error::{LlmError, Result};
use crate::transport::{HttpRequest, Transport};
use crate::types::{ChatMessage, Transcript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Chat against the Anthropic Messages API. The system instruction travels as the top-level
/// `system` field, never inside `messages`.
pub struct AnthropicChat {
    transport: Arc<dyn Transport>,
    api_key: String,
    settings: ChatSettings,
    system: String,
    transcript: Transcript,
}

impl AnthropicChat {
    pub fn new(api_key: &str, settings: ChatSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            api_key: api_key.to_string(),
            settings,
            system: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            transcript: Transcript::new(),
        }
    }

    fn build_request(&self, pending: &ChatMessage) -> Result<HttpRequest> {
        let messages: Vec<&ChatMessage> = self
            .transcript
            .messages()
            .iter()
            .chain(std::iter::once(pending))
            .collect();
        let body = AnthropicRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: &self.system,
            messages,
        };
        Ok(HttpRequest::new(
            self.settings.endpoint.as_str(),
            serde_json::to_value(&body)?,
            self.settings.timeout,
        )
        .header("x-api-key", self.api_key.as_str())
        .header("anthropic-version", ANTHROPIC_VERSION))
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.settings.model))]
    async fn complete(&self, pending: &ChatMessage) -> Result<String> {
        let request = self.build_request(pending)?;
        let response = self.transport.post_json(request).await?;
        let parsed: AnthropicResponse = response.into_json()?;
        parsed.into_text()
    }
}

#[async_trait]
impl Conversation for AnthropicChat {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn set_system_instruction(&mut self, text: &str) {
        self.system = text.to_string();
    }

    fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn clear(&mut self) {
        self.transcript.clear();
    }

    async fn send_turn(&mut self, user_text: &str) -> Result<String> {
        let user = ChatMessage::user(user_text);
        let outcome = self.complete(&user).await;
        settle(Provider::Anthropic, &mut self.transcript, user, outcome)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicResponse {
    fn into_text(self) -> Result<String> {
        let first = self.content.into_iter().next().ok_or_else(|| {
            LlmError::ResponseFormat("anthropic response has empty content".to_string())
        })?;
        first.text.ok_or_else(|| {
            LlmError::ResponseFormat("anthropic content block has no text".to_string())
        })
    }
}
