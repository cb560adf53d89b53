use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Http(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl LlmError {
    /// Builds an `Api` error from a non-success response body.
    ///
    /// Providers answer failures with `{"error":{"message":"..."}}`; anything else falls back to
    /// a status-code message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("API Error: {status}"));
        Self::Api { status, message }
    }

    /// True for failures that happened on the wire rather than in the provider's answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Http(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
