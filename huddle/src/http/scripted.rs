//! In-process scripted [`HttpClient`] for testing.
//!
//! Responses are replayed in the order they were queued, and every issued
//! request is recorded together with the bearer token that accompanied it,
//! so tests can assert on exactly what went over the wire.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// One recorded exchange: the request and the bearer token sent with it.
#[derive(Debug, Clone)]
pub struct IssuedRequest {
    pub request: HttpRequest,
    pub bearer: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<HttpResponse, HttpError>>,
    issued: Vec<IssuedRequest>,
}

/// An [`HttpClient`] that replays a canned response script.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send by `delay` before answering, to widen race
    /// windows in concurrency tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response for the next unanswered request.
    pub fn push_response(&self, response: HttpResponse) {
        self.script.lock().responses.push_back(Ok(response));
    }

    /// Queue a transport-level failure for the next unanswered request.
    pub fn push_error(&self, error: HttpError) {
        self.script.lock().responses.push_back(Err(error));
    }

    /// All requests issued so far, in order.
    #[must_use]
    pub fn issued(&self) -> Vec<IssuedRequest> {
        self.script.lock().issued.clone()
    }

    /// Number of requests issued so far.
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.script.lock().issued.len()
    }
}

impl HttpClient for ScriptedClient {
    async fn send(
        &self,
        request: &HttpRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, HttpError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock();
        script.issued.push(IssuedRequest {
            request: request.clone(),
            bearer: bearer.map(str::to_string),
        });
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Transport("response script exhausted".into())))
    }
}
