use crate::client::{ChatSettings, Conversation, DEFAULT_SYSTEM_INSTRUCTION, Provider, settle};
use crate::error::{LlmError, Result};
use crate::transport::{HttpRequest, Transport};
use crate::types::{ChatMessage, Transcript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat against the OpenAI Chat Completions API. The system instruction is prepended to
/// `messages` as a `system` turn on every request.
pub struct OpenAiChat {
    transport: Arc<dyn Transport>,
    api_key: String,
    settings: ChatSettings,
    system: String,
    transcript: Transcript,
}

impl OpenAiChat {
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
        let mut messages = Vec::with_capacity(self.transcript.len() + 2);
        messages.push(ChatMessage::system(self.system.as_str()));
        messages.extend_from_slice(self.transcript.messages());
        messages.push(pending.clone());

        let body = OpenAiChatRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages,
        };
        Ok(HttpRequest::new(
            self.settings.endpoint.as_str(),
            serde_json::to_value(&body)?,
            self.settings.timeout,
        )
        .bearer_auth(&self.api_key))
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.settings.model))]
    async fn complete(&self, pending: &ChatMessage) -> Result<String> {
        let request = self.build_request(pending)?;
        let response = self.transport.post_json(request).await?;
        let parsed: OpenAiChatResponse = response.into_json()?;
        parsed.into_text()
    }
}

#[async_trait]
impl Conversation for OpenAiChat {
    fn provider(&self) -> Provider {
        Provider::OpenAI
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
        settle(Provider::OpenAI, &mut self.transcript, user, outcome)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatResponse {
    pub(crate) fn into_text(self) -> Result<String> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            LlmError::ResponseFormat("openai response missing choices".to_string())
        })?;
        choice.message.content.ok_or_else(|| {
            LlmError::ResponseFormat("openai choice message has no content".to_string())
        })
    }
}
