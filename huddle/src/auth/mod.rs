//! Authenticated request execution.
//!
//! [`AuthExecutor`] wraps every authenticated HTTP call in a small state
//! machine: success passes straight through; a 401 triggers a single
//! credential refresh followed by a bounded retry; a 413 means the server
//! has invalidated the session, so local credentials are wiped no matter
//! where in the retry sequence it appears.

pub mod refresh;

use std::sync::Arc;
use std::time::Duration;

use crate::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::session::SessionStore;

use refresh::{RefreshCoordinator, RefreshOutcome};

/// Final disposition of an authenticated call.
#[derive(Debug)]
pub enum CallOutcome {
    /// The first attempt succeeded.
    Success(HttpResponse),
    /// The call succeeded after a credential refresh and retry.
    RetriedSuccess(HttpResponse),
    /// The server answered with a non-retryable failure.
    Failed(HttpResponse),
    /// Credentials could not be refreshed; the request was abandoned
    /// without a server response.
    Dropped,
    /// The server force-reset the session; local credentials were cleared.
    Invalidated,
    /// No attempt produced a response at all.
    Unreachable(HttpError),
}

impl CallOutcome {
    /// The server response carried by this outcome, when there is one.
    #[must_use]
    pub const fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Success(r) | Self::RetriedSuccess(r) | Self::Failed(r) => Some(r),
            Self::Dropped | Self::Invalidated | Self::Unreachable(_) => None,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::RetriedSuccess(_))
    }
}

/// Issues authenticated requests with refresh-and-retry handling.
#[derive(Debug)]
pub struct AuthExecutor<H, S> {
    http: Arc<H>,
    session: Arc<S>,
    refresher: RefreshCoordinator<H, S>,
    attempt_timeout: Duration,
}

impl<H: HttpClient, S: SessionStore> AuthExecutor<H, S> {
    pub fn new(http: Arc<H>, session: Arc<S>, attempt_timeout: Duration) -> Self {
        let refresher = RefreshCoordinator::new(Arc::clone(&http), Arc::clone(&session));
        Self {
            http,
            session,
            refresher,
            attempt_timeout,
        }
    }

    /// Execute a request against the current session.
    ///
    /// A 401 answer triggers one credential refresh and up to two retries
    /// of the original request; each attempt reads the access token fresh
    /// from the store at send time. A 413 at any point clears the stored
    /// session and short-circuits to [`CallOutcome::Invalidated`].
    pub async fn execute(&self, request: &HttpRequest) -> CallOutcome {
        let first = match self.attempt(request).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::Unreachable(e),
        };

        match first.status {
            200 => CallOutcome::Success(first),
            401 => self.refresh_and_retry(request).await,
            413 => self.invalidate(),
            _ => CallOutcome::Failed(first),
        }
    }

    async fn refresh_and_retry(&self, request: &HttpRequest) -> CallOutcome {
        if self.refresher.refresh().await == RefreshOutcome::Failed {
            tracing::debug!(endpoint = %request.endpoint, "refresh failed, abandoning request");
            return CallOutcome::Dropped;
        }

        let retry = match self.attempt(request).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::Unreachable(e),
        };
        match retry.status {
            200 => CallOutcome::RetriedSuccess(retry),
            401 => self.second_retry(request, retry).await,
            413 => self.invalidate(),
            _ => CallOutcome::Failed(retry),
        }
    }

    /// One more attempt after a retry still answered 401, covering the
    /// window where the first retry raced the token rotation.
    async fn second_retry(&self, request: &HttpRequest, first_retry: HttpResponse) -> CallOutcome {
        let last = match self.attempt(request).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::Unreachable(e),
        };
        if last.status == 413 {
            return self.invalidate();
        }
        if last.ok {
            return CallOutcome::RetriedSuccess(last);
        }
        // Long-standing behavior: when the second retry also fails, the
        // failure reported to the caller carries the first retry's
        // response, not the second's.
        CallOutcome::Failed(first_retry)
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let bearer = self.session.session().map(|s| s.access_token);
        let send = self.http.send(request, bearer.as_deref());
        match tokio::time::timeout(self.attempt_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        }
    }

    fn invalidate(&self) -> CallOutcome {
        tracing::warn!("session force-reset by server, clearing credentials");
        self.session.clear();
        CallOutcome::Invalidated
    }
}
