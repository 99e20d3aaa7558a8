//! Reliable delivery sync.
//!
//! The socket is fire-and-forget; this layer is the at-least-once backstop.
//! [`DeliverySync::fetch_undelivered`] pulls everything the server still
//! holds for this user, and [`DeliverySync::acknowledge`] confirms receipt
//! so the server stops redelivering. [`AckBatcher`] coalesces individual
//! acknowledgements into delayed batches so a burst of inbound messages
//! does not turn into a burst of requests.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::auth::{AuthExecutor, CallOutcome};
use crate::http::{HttpClient, HttpError, HttpRequest};
use crate::session::SessionStore;

const FETCH_ENDPOINT: &str = "fetchUndeliveredMessages";
const ACK_ENDPOINT: &str = "acknowledgeMessages";

/// Errors from the sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No session is stored; nothing to sync.
    #[error("not signed in")]
    SignedOut,

    /// Credentials expired and could not be refreshed.
    #[error("credentials could not be refreshed; request abandoned")]
    Dropped,

    /// The server force-reset the session.
    #[error("session invalidated by server")]
    Invalidated,

    /// The server rejected the request.
    #[error("server rejected request with status {status}")]
    Rejected { status: u16, body: String },

    /// No attempt reached the server.
    #[error(transparent)]
    Transport(#[from] HttpError),

    /// The server answered with a body this client cannot parse.
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A message the server delivered through the sync path. Business fields
/// beyond the identifier and routing tag stay opaque here.
#[derive(Debug, Clone, Deserialize)]
pub struct PendingMessage {
    /// Stable identifier used for acknowledgement.
    #[serde(rename = "messageId")]
    pub message_id: String,
    /// Routing tag, when the server includes one.
    #[serde(rename = "type", default)]
    pub tag: Option<String>,
    /// Remaining message fields, untouched.
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct FetchPage {
    #[serde(default)]
    messages: Vec<PendingMessage>,
}

/// Fetch-and-acknowledge client for undelivered messages.
#[derive(Debug)]
pub struct DeliverySync<H, S> {
    executor: Arc<AuthExecutor<H, S>>,
    session: Arc<S>,
}

impl<H: HttpClient, S: SessionStore> DeliverySync<H, S> {
    pub fn new(executor: Arc<AuthExecutor<H, S>>, session: Arc<S>) -> Self {
        Self { executor, session }
    }

    /// Fetch every message the server still holds for this user, oldest
    /// first. Messages stay on the server until acknowledged, so a fetch
    /// that is never followed by an acknowledgement returns the same
    /// messages again.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when signed out, when the request fails, or
    /// when the response body does not parse.
    pub async fn fetch_undelivered(&self) -> Result<Vec<PendingMessage>, SyncError> {
        let Some(session) = self.session.session() else {
            return Err(SyncError::SignedOut);
        };
        let request =
            HttpRequest::get(FETCH_ENDPOINT).with_param("userId", session.user_id.to_string());
        let response = Self::unwrap_outcome(self.executor.execute(&request).await)?;
        let page: FetchPage = serde_json::from_str(&response.body)?;
        tracing::debug!(count = page.messages.len(), "fetched undelivered messages");
        Ok(page.messages)
    }

    /// Confirm receipt of the given messages so the server deletes them.
    ///
    /// Acknowledging an identifier the server no longer holds is a
    /// server-side no-op, which is what makes redelivery harmless. An
    /// empty slice returns immediately without a request.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the request fails; the server keeps the
    /// messages and will redeliver them.
    pub async fn acknowledge(&self, message_ids: &[String]) -> Result<(), SyncError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let request =
            HttpRequest::post(ACK_ENDPOINT).with_json(json!({ "messageIds": message_ids }));
        Self::unwrap_outcome(self.executor.execute(&request).await)?;
        tracing::debug!(count = message_ids.len(), "acknowledged messages");
        Ok(())
    }

    fn unwrap_outcome(outcome: CallOutcome) -> Result<crate::http::HttpResponse, SyncError> {
        match outcome {
            CallOutcome::Success(response) | CallOutcome::RetriedSuccess(response) => Ok(response),
            CallOutcome::Failed(response) => Err(SyncError::Rejected {
                status: response.status,
                body: response.body,
            }),
            CallOutcome::Dropped => Err(SyncError::Dropped),
            CallOutcome::Invalidated => Err(SyncError::Invalidated),
            CallOutcome::Unreachable(e) => Err(SyncError::Transport(e)),
        }
    }
}

/// Coalesces acknowledgements into delayed batches.
///
/// Each added identifier opens (or joins) a batch; the batch is flushed
/// one `flush_delay` after its first identifier arrived. A failed flush is
/// logged and the batch abandoned — the server redelivers anything left
/// unacknowledged, so the identifiers are recovered on the next fetch.
#[derive(Debug)]
pub struct AckBatcher {
    tx: mpsc::UnboundedSender<String>,
}

impl AckBatcher {
    /// Start the batching task against the given sync client.
    #[must_use]
    pub fn spawn<H, S>(sync: Arc<DeliverySync<H, S>>, flush_delay: Duration) -> Self
    where
        H: HttpClient + 'static,
        S: SessionStore + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                let deadline = tokio::time::sleep(flush_delay);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        () = &mut deadline => break,
                        next = rx.recv() => match next {
                            Some(id) => batch.push(id),
                            None => break,
                        },
                    }
                }
                if let Err(e) = sync.acknowledge(&batch).await {
                    tracing::warn!(
                        error = %e,
                        count = batch.len(),
                        "acknowledge batch failed; server will redeliver"
                    );
                }
            }
        });
        Self { tx }
    }

    /// Queue one message identifier for acknowledgement.
    pub fn add(&self, message_id: String) {
        // Send only fails after the task has shut down, at which point
        // redelivery covers the loss.
        let _ = self.tx.send(message_id);
    }
}
