//! One-shot image description over the OpenAI chat completions endpoint.
//!
//! The image is inlined as a base64 `data:` URL next to the text prompt; there is no
//! separate upload step and no conversation state.

use crate::error::{LlmError, Result};
use crate::openai::{OPENAI_CHAT_COMPLETIONS_URL, OpenAiChatResponse};
use crate::transport::{HttpRequest, Transport};
use crate::types::{ContentPart, ImageUrl, Role};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str = "Please analyze this image and describe what you see in detail.";
pub const VISION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Supported extensions (lowercase, without the dot) and their media types.
pub const SUPPORTED_FORMATS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    SUPPORTED_FORMATS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, media)| *media)
}

pub fn supported_extensions() -> String {
    SUPPORTED_FORMATS
        .iter()
        .map(|(e, _)| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw image bytes plus the media type implied by the file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

impl ImageAsset {
    /// Validates `path` and reads it. Nothing touches the network here.
    pub async fn load(path: &Path) -> Result<Self> {
        let media_type = validate_image_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LlmError::InvalidInput(format!("read {}: {e}", path.display())))?;
        Ok(Self { bytes, media_type })
    }

    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.encoded())
    }
}

/// Checks existence, file type and extension; returns the media type.
pub fn validate_image_path(path: &Path) -> Result<&'static str> {
    if !path.exists() {
        return Err(LlmError::InvalidInput(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(LlmError::InvalidInput(format!(
            "Not a file: {}",
            path.display()
        )));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    media_type_for_extension(&ext).ok_or_else(|| {
        let shown = if ext.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{ext}")
        };
        LlmError::InvalidInput(format!(
            "Unsupported format: {shown} (supported formats: {})",
            supported_extensions()
        ))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: crate::client::DEFAULT_MAX_TOKENS,
            endpoint: OPENAI_CHAT_COMPLETIONS_URL.to_string(),
            timeout: VISION_TIMEOUT,
        }
    }
}

pub struct ImageDescriber {
    transport: Arc<dyn Transport>,
    api_key: String,
    settings: VisionSettings,
}

impl ImageDescriber {
    pub fn new(api_key: &str, settings: VisionSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            api_key: api_key.to_string(),
            settings,
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display(), model = %self.settings.model))]
    pub async fn describe(&self, path: &Path, prompt: Option<&str>) -> Result<String> {
        let asset = ImageAsset::load(path).await?;
        let prompt = prompt.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PROMPT);
        tracing::debug!(
            media_type = asset.media_type,
            image_bytes = asset.bytes.len(),
            "image encoded"
        );

        let request = self.build_request(&asset, prompt)?;
        let response = self.transport.post_json(request).await?;
        let parsed: OpenAiChatResponse = response.into_json()?;
        parsed.into_text()
    }

    fn build_request(&self, asset: &ImageAsset, prompt: &str) -> Result<HttpRequest> {
        let body = VisionRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: vec![VisionMessage {
                role: Role::User,
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: asset.data_url(),
                        },
                    },
                ],
            }],
        };
        Ok(HttpRequest::new(
            self.settings.endpoint.as_str(),
            serde_json::to_value(&body)?,
            self.settings.timeout,
        )
        .bearer_auth(&self.api_key))
    }
}

/// User-facing wording for a failed `describe`, split by failure family.
pub fn describe_failure_message(err: &LlmError) -> String {
    match err {
        LlmError::Timeout => {
            "Request timed out - the image may be too large or the API is slow".to_string()
        }
        e if e.is_transport() => e.to_string(),
        LlmError::InvalidInput(_) | LlmError::Configuration(_) => err.to_string(),
        _ => format!("Error analyzing image: {err}"),
    }
}

#[derive(Debug, Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<VisionMessage>,
}

#[derive(Debug, Serialize)]
struct VisionMessage {
    role: Role,
    content: Vec<ContentPart>,
}
