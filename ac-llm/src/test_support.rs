use crate::error::{LlmError, Result};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) enum Scripted {
    Respond { status: u16, body: String },
    Timeout,
    NetworkDown,
    /// Never answers; the caller has to give up on the request.
    Hang,
}

/// Replays scripted outcomes in order and records every request it sees.
#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, status: u16, body: &str) -> Self {
        self.push(Scripted::Respond {
            status,
            body: body.to_string(),
        })
    }

    pub(crate) fn push(self, outcome: Scripted) -> Self {
        self.script.lock().expect("script lock").push_back(outcome);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().expect("seen lock").clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().expect("seen lock").len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.seen.lock().expect("seen lock").push(request);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(Scripted::Timeout) => Err(LlmError::Timeout),
            Some(Scripted::NetworkDown) => {
                Err(LlmError::Http("error sending request: connection refused".to_string()))
            }
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(LlmError::Http("no scripted response left".to_string())),
        }
    }
}
