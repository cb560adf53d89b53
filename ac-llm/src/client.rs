use crate::anthropic::AnthropicChat;
use crate::error::Result;
use crate::openai::OpenAiChat;
use crate::transport::Transport;
use crate::types::{ChatMessage, Transcript};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Short speaker label printed before assistant replies.
    pub fn speaker(self) -> &'static str {
        match self {
            Provider::Anthropic => "Claude",
            Provider::OpenAI => "GPT",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Provider::Anthropic => "Claude",
            Provider::OpenAI => "OpenAI",
        }
    }

    pub fn default_settings(self) -> ChatSettings {
        match self {
            Provider::Anthropic => ChatSettings {
                model: crate::anthropic::DEFAULT_MODEL.to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
                endpoint: crate::anthropic::ANTHROPIC_MESSAGES_URL.to_string(),
                timeout: CHAT_TIMEOUT,
            },
            Provider::OpenAI => ChatSettings {
                model: crate::openai::DEFAULT_MODEL.to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
                endpoint: crate::openai::OPENAI_CHAT_COMPLETIONS_URL.to_string(),
                timeout: CHAT_TIMEOUT,
            },
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "gpt" => Ok(Provider::OpenAI),
            other => Err(format!(
                "unknown provider {other:?}; expected one of: anthropic, openai"
            )),
        }
    }
}

/// Per-request knobs shared by both chat providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub endpoint: String,
    pub timeout: Duration,
}

/// A stateful chat with one provider.
///
/// The transcript is resent in full on every turn. A failed or cancelled `send_turn` leaves
/// the transcript exactly as it was before the call.
#[async_trait]
pub trait Conversation: Send {
    fn provider(&self) -> Provider;
    fn model(&self) -> &str;
    fn system_instruction(&self) -> &str;
    fn set_system_instruction(&mut self, text: &str);
    fn transcript(&self) -> &Transcript;
    fn clear(&mut self);
    async fn send_turn(&mut self, user_text: &str) -> Result<String>;
}

pub fn connect(
    provider: Provider,
    api_key: &str,
    settings: ChatSettings,
    transport: Arc<dyn Transport>,
) -> Box<dyn Conversation> {
    match provider {
        Provider::Anthropic => Box::new(AnthropicChat::new(api_key, settings, transport)),
        Provider::OpenAI => Box::new(OpenAiChat::new(api_key, settings, transport)),
    }
}

/// Finishes a turn. The transcript is only touched here, after the request resolved, so a
/// dropped `send_turn` future leaves it unchanged.
pub(crate) fn settle(
    provider: Provider,
    transcript: &mut Transcript,
    user: ChatMessage,
    outcome: Result<String>,
) -> Result<String> {
    match outcome {
        Ok(reply) => {
            transcript.push(user);
            transcript.push(ChatMessage::assistant(reply.clone()));
            tracing::debug!(%provider, turns = transcript.len(), "turn completed");
            Ok(reply)
        }
        Err(e) => {
            tracing::warn!(%provider, error = %e, turns = transcript.len(), "turn failed; user message discarded");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, Scripted};
    use crate::types::Role;

    fn chat(provider: Provider, fake: &Arc<FakeTransport>) -> Box<dyn Conversation> {
        connect(
            provider,
            "test-key",
            provider.default_settings(),
            fake.clone() as Arc<dyn Transport>,
        )
    }

    fn ok_body(provider: Provider, text: &str) -> String {
        match provider {
            Provider::Anthropic => {
                serde_json::json!({"content": [{"type": "text", "text": text}]}).to_string()
            }
            Provider::OpenAI => {
                serde_json::json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
                    .to_string()
            }
        }
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("Anthropic".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!("claude".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!(" openai ".parse::<Provider>(), Ok(Provider::OpenAI));
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[tokio::test]
    async fn successful_turns_alternate_and_grow_by_two() {
        for provider in [Provider::Anthropic, Provider::OpenAI] {
            let fake = Arc::new(
                FakeTransport::new()
                    .respond(200, &ok_body(provider, "one"))
                    .respond(200, &ok_body(provider, "two"))
                    .respond(200, &ok_body(provider, "three")),
            );
            let mut c = chat(provider, &fake);

            for (i, expected) in ["one", "two", "three"].into_iter().enumerate() {
                let before = c.transcript().len();
                let reply = c.send_turn(&format!("q{i}")).await.expect("turn succeeds");
                assert_eq!(reply, expected);
                assert_eq!(c.transcript().len(), before + 2);
            }

            let roles: Vec<Role> = c.transcript().messages().iter().map(|m| m.role).collect();
            assert_eq!(
                roles,
                vec![
                    Role::User,
                    Role::Assistant,
                    Role::User,
                    Role::Assistant,
                    Role::User,
                    Role::Assistant
                ]
            );
            assert_eq!(fake.calls(), 3);
        }
    }

    #[tokio::test]
    async fn failed_turns_roll_back_for_every_failure_kind() {
        for provider in [Provider::Anthropic, Provider::OpenAI] {
            let fake = Arc::new(
                FakeTransport::new()
                    .respond(200, &ok_body(provider, "first"))
                    .push(Scripted::Timeout)
                    .push(Scripted::NetworkDown)
                    .respond(500, r#"{"error":{"message":"overloaded"}}"#)
                    .respond(200, r#"{"unexpected": true}"#),
            );
            let mut c = chat(provider, &fake);
            c.send_turn("hello").await.expect("first turn succeeds");
            let snapshot = c.transcript().clone();

            let timeout = c.send_turn("a").await.unwrap_err();
            assert!(matches!(timeout, crate::LlmError::Timeout));
            assert_eq!(c.transcript(), &snapshot);

            let network = c.send_turn("b").await.unwrap_err();
            assert!(matches!(network, crate::LlmError::Http(_)));
            assert_eq!(c.transcript(), &snapshot);

            let api = c.send_turn("c").await.unwrap_err();
            assert_eq!(api.to_string(), "overloaded");
            assert_eq!(c.transcript(), &snapshot);

            let parse = c.send_turn("d").await.unwrap_err();
            assert!(matches!(parse, crate::LlmError::ResponseFormat(_)));
            assert_eq!(c.transcript(), &snapshot);
        }
    }

    #[tokio::test]
    async fn cancelled_turn_leaves_transcript_untouched() {
        for provider in [Provider::Anthropic, Provider::OpenAI] {
            let fake = Arc::new(
                FakeTransport::new()
                    .respond(200, &ok_body(provider, "first"))
                    .push(Scripted::Hang)
                    .respond(200, &ok_body(provider, "second")),
            );
            let mut c = chat(provider, &fake);
            c.send_turn("hello").await.expect("first turn succeeds");
            let snapshot = c.transcript().clone();

            let abandoned =
                tokio::time::timeout(Duration::from_millis(20), c.send_turn("stuck")).await;
            assert!(abandoned.is_err(), "hanging turn should not complete");
            assert_eq!(c.transcript(), &snapshot);
            assert_eq!(fake.calls(), 2);

            // The next turn resends history without the abandoned message.
            c.send_turn("again").await.expect("turn after cancel succeeds");
            assert_eq!(c.transcript().len(), 4);
            let last_request = fake.requests().pop().expect("third request");
            assert!(!last_request.body.to_string().contains("stuck"));
        }
    }

    #[tokio::test]
    async fn failure_from_empty_transcript_returns_to_empty() {
        let fake = Arc::new(FakeTransport::new().push(Scripted::Timeout));
        let mut c = chat(Provider::OpenAI, &fake);
        assert!(c.send_turn("hello").await.is_err());
        assert!(c.transcript().is_empty());
    }

    #[tokio::test]
    async fn clear_empties_transcript_and_keeps_system_instruction() {
        let fake = Arc::new(FakeTransport::new().respond(200, &ok_body(Provider::Anthropic, "hi")));
        let mut c = chat(Provider::Anthropic, &fake);
        c.set_system_instruction("Be terse.");
        c.send_turn("hello").await.expect("turn succeeds");
        assert_eq!(c.transcript().len(), 2);

        c.clear();
        assert_eq!(c.transcript().len(), 0);
        assert_eq!(c.system_instruction(), "Be terse.");
    }

    #[test]
    fn defaults_match_provider() {
        let fake = Arc::new(FakeTransport::new());
        let c = chat(Provider::Anthropic, &fake);
        assert_eq!(c.provider(), Provider::Anthropic);
        assert_eq!(c.model(), "claude-sonnet-4-20250514");
        assert_eq!(c.system_instruction(), DEFAULT_SYSTEM_INSTRUCTION);

        let c = chat(Provider::OpenAI, &fake);
        assert_eq!(c.model(), "gpt-4o-mini");
        assert_eq!(Provider::OpenAI.default_settings().timeout, CHAT_TIMEOUT);
    }
}
