//! HTTP primitives underneath the authenticated request layer.
//!
//! The executor and refresh coordinator speak to the server through the
//! [`HttpClient`] trait. [`remote::RemoteClient`] is the production
//! implementation backed by a connection pool; [`scripted::ScriptedClient`]
//! is an in-process double that replays a canned response script, used
//! throughout the crate's tests.

pub mod remote;
pub mod scripted;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

/// Default per-attempt timeout applied when none is configured.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from the HTTP transport itself, as opposed to unhappy status
/// codes, which travel in [`HttpResponse`].
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The attempt did not complete within the per-attempt timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the response could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The configured base URL could not be parsed.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

/// HTTP verb for a [`HttpRequest`]. Only the verbs the client actually
/// issues are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request to one of the service's endpoints, relative to the
/// configured base URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Endpoint path, without a leading slash.
    pub endpoint: String,
    pub method: HttpMethod,
    /// Query parameters, appended in order.
    pub params: Vec<(String, String)>,
    /// JSON body for POST requests.
    pub json_body: Option<Value>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: HttpMethod::Get,
            params: Vec::new(),
            json_body: None,
        }
    }

    #[must_use]
    pub fn post(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: HttpMethod::Post,
            params: Vec::new(),
            json_body: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }
}

/// A completed HTTP exchange: status code plus the full response body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Whether the status is in the 2xx range.
    pub ok: bool,
    /// Response body as text; JSON endpoints are parsed by the caller.
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            ok: (200..300).contains(&status),
            body: body.into(),
        }
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error when the body is not valid JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Abstraction over the HTTP transport.
///
/// `bearer` is the access token to attach as an `Authorization` header,
/// or `None` for unauthenticated calls such as the token exchange.
pub trait HttpClient: Send + Sync {
    fn send(
        &self,
        request: &HttpRequest,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<HttpResponse, HttpError>> + Send;
}
