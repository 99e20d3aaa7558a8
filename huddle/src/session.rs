//! Session credential storage.
//!
//! The rest of the crate reads and writes credentials through the
//! [`SessionStore`] trait so the storage backend stays swappable: the
//! bundled [`MemorySessionStore`] holds tokens for the process lifetime,
//! while an embedding application can persist them however it likes.

use parking_lot::Mutex;

/// A signed-in user's credentials, read as one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Short-lived bearer token attached to authenticated requests.
    pub access_token: String,
    /// Long-lived token exchanged for fresh access tokens.
    pub refresh_token: String,
    /// The signed-in user's numeric identifier.
    pub user_id: u64,
}

/// Storage for the current session's credentials.
///
/// Implementations must be internally synchronized: the refresh
/// coordinator writes tokens while request paths read them concurrently.
pub trait SessionStore: Send + Sync {
    /// A consistent snapshot of the current session, or `None` when
    /// signed out.
    fn session(&self) -> Option<Session>;

    /// Replace both tokens in one atomic step.
    ///
    /// Readers must never observe a new access token paired with the old
    /// refresh token or vice versa. A no-op when signed out.
    fn set_tokens(&self, access_token: String, refresh_token: String);

    /// Discard all credentials, returning the store to the signed-out
    /// state.
    fn clear(&self);
}

/// In-memory [`SessionStore`] guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a full session after sign-in.
    pub fn sign_in(&self, session: Session) {
        *self.inner.lock() = Some(session);
    }
}

impl SessionStore for MemorySessionStore {
    fn session(&self) -> Option<Session> {
        self.inner.lock().clone()
    }

    fn set_tokens(&self, access_token: String, refresh_token: String) {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(session) => {
                session.access_token = access_token;
                session.refresh_token = refresh_token;
            }
            None => tracing::warn!("token rotation while signed out; discarding"),
        }
    }

    fn clear(&self) {
        *self.inner.lock() = None;
    }
}
