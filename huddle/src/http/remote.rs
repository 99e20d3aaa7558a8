//! Production [`HttpClient`] backed by a pooled connection client.

use std::time::Duration;

use super::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};

/// HTTP client for the real service, holding a connection pool and the
/// resolved base URL.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    /// Build a client for the given base URL with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] when the base URL does not parse,
    /// and [`HttpError::Transport`] when the underlying client cannot be
    /// constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        url::Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

impl HttpClient for RemoteClient {
    async fn send(
        &self,
        request: &HttpRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, HttpError> {
        let url = self.endpoint_url(&request.endpoint);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(HttpResponse::new(status, body))
    }
}
