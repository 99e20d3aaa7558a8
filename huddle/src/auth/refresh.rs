//! Single-flight credential refresh.
//!
//! Any number of in-flight requests can hit a 401 at the same time, but
//! only one token exchange may run against the server: a second exchange
//! with the same refresh token would be rejected after the first rotates
//! it. Callers that arrive while an exchange is in flight wait for it and
//! share its outcome instead of starting their own.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::http::{HttpClient, HttpRequest};
use crate::session::SessionStore;

/// Endpoint that exchanges a refresh token for a fresh token pair.
const REFRESH_ENDPOINT: &str = "refreshToken";

/// Result of a refresh episode, shared by every caller that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The store now holds a fresh token pair.
    Refreshed,
    /// The exchange failed; the store is unchanged.
    Failed,
}

#[derive(Debug)]
struct Episode {
    /// Bumped once per completed exchange. A caller that took its snapshot
    /// before an exchange and acquires the lock after it completed joins
    /// that exchange's outcome rather than starting another.
    generation: u64,
    last: RefreshOutcome,
}

/// Token payload returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct TokenPair {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// Coordinates token exchanges so at most one runs at a time.
#[derive(Debug)]
pub struct RefreshCoordinator<H, S> {
    http: Arc<H>,
    session: Arc<S>,
    exchange: tokio::sync::Mutex<()>,
    episode: parking_lot::Mutex<Episode>,
}

impl<H: HttpClient, S: SessionStore> RefreshCoordinator<H, S> {
    pub fn new(http: Arc<H>, session: Arc<S>) -> Self {
        Self {
            http,
            session,
            exchange: tokio::sync::Mutex::new(()),
            episode: parking_lot::Mutex::new(Episode {
                generation: 0,
                last: RefreshOutcome::Failed,
            }),
        }
    }

    /// Refresh the session's credentials, joining an in-flight exchange
    /// when one exists.
    pub async fn refresh(&self) -> RefreshOutcome {
        let observed = self.episode.lock().generation;
        let _flight = self.exchange.lock().await;
        {
            let episode = self.episode.lock();
            if episode.generation != observed {
                // An exchange completed while we waited for the lock.
                tracing::debug!(outcome = ?episode.last, "joined completed token exchange");
                return episode.last;
            }
        }

        let outcome = self.exchange_once().await;
        let mut episode = self.episode.lock();
        episode.generation = episode.generation.wrapping_add(1);
        episode.last = outcome;
        outcome
    }

    async fn exchange_once(&self) -> RefreshOutcome {
        let Some(session) = self.session.session() else {
            tracing::debug!("refresh requested with no stored credentials");
            return RefreshOutcome::Failed;
        };

        let request = HttpRequest::post(REFRESH_ENDPOINT).with_json(json!({
            "refreshToken": session.refresh_token,
            "userId": session.user_id,
        }));

        match self.http.send(&request, None).await {
            Ok(response) if response.status == 200 => {
                match serde_json::from_str::<TokenPair>(&response.body) {
                    Ok(pair) => {
                        self.session
                            .set_tokens(pair.access_token, pair.refresh_token);
                        tracing::info!("credentials refreshed");
                        RefreshOutcome::Refreshed
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "token exchange returned malformed body");
                        RefreshOutcome::Failed
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(status = response.status, "token exchange rejected");
                RefreshOutcome::Failed
            }
            Err(e) => {
                tracing::warn!(error = %e, "token exchange unreachable");
                RefreshOutcome::Failed
            }
        }
    }
}
