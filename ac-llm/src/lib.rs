//! Conversational HTTP clients for the Anthropic and OpenAI chat APIs, plus a one-shot
//! image describer.
//!
//! Everything goes through the [`Transport`] seam so request shaping and transcript
//! rollback can be exercised without a network.

mod anthropic;
mod client;
mod error;
mod openai;
mod transport;
mod types;
mod vision;

#[cfg(test)]
mod test_support;

pub use anthropic::AnthropicChat;
pub use client::{
    CHAT_TIMEOUT, ChatSettings, Conversation, DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_INSTRUCTION,
    Provider, connect,
};
pub use error::{LlmError, Result};
pub use openai::OpenAiChat;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{ChatMessage, ContentPart, ImageUrl, Role, Transcript};
pub use vision::{
    DEFAULT_PROMPT, DEFAULT_VISION_MODEL, ImageAsset, ImageDescriber, SUPPORTED_FORMATS,
    VISION_TIMEOUT, VisionSettings, describe_failure_message, media_type_for_extension,
    supported_extensions, validate_image_path,
};
