use crate::error::{LlmError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// A JSON POST ready to go on the wire.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, body: serde_json::Value, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {token}"))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if is_secret_header(k) {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_secret_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("x-api-key")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes a success body, or turns a failure status into an `Api` error.
    pub fn into_json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        if !self.is_success() {
            return Err(LlmError::from_status(self.status, &self.body));
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The single network seam: every provider call goes through one blocking-per-caller POST.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self { http }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .post(&request.url)
            .timeout(request.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.json(&request.body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(status, body_bytes = body.len(), "provider responded");
        Ok(HttpResponse { status, body })
    }
}
