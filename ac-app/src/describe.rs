//! `apichat describe`: one-shot image analysis.

use ac_llm::{ImageDescriber, LlmError, Transport, describe_failure_message, validate_image_path};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const RULE: &str = "==================================================";

/// Validates, prints the banner, and describes the image. The returned error string is the
/// user-facing message for stderr.
pub async fn run<W: Write>(
    describer: &ImageDescriber,
    path: &Path,
    prompt: Option<&str>,
    out: &mut W,
) -> Result<String, String> {
    validate_image_path(path).map_err(|e| e.to_string())?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let io = |e: std::io::Error| e.to_string();
    writeln!(out, "{RULE}").map_err(io)?;
    writeln!(out, "Analyzing Image: {name}").map_err(io)?;
    writeln!(out, "{RULE}").map_err(io)?;
    writeln!(out, "Processing image...").map_err(io)?;
    out.flush().map_err(io)?;

    let text = describer
        .describe(path, prompt)
        .await
        .map_err(|e| failure(&e))?;
    writeln!(out, "\nAnalysis Result:\n").map_err(io)?;
    writeln!(out, "{text}").map_err(io)?;
    Ok(text)
}

fn failure(err: &LlmError) -> String {
    tracing::warn!(error = %err, "image description failed");
    describe_failure_message(err)
}

pub fn describer(
    api_key: &str,
    cfg: &crate::config::ProviderConfig,
    transport: Arc<dyn Transport>,
) -> ImageDescriber {
    ImageDescriber::new(api_key, cfg.vision_settings(), transport)
}
