//! Category-based dispatch of inbound frames.
//!
//! Screens register a listener under a stable identity for one
//! [`Category`]; the connection's reader hands every parsed [`Envelope`]
//! to [`DispatchRegistry::route`], which invokes at most one listener:
//! the one most recently registered for the frame's category. There is
//! no buffering — a frame arriving with no listener in place is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use huddle_proto::envelope::Envelope;
use huddle_proto::taxonomy::Category;

type Callback = Arc<dyn Fn(&Envelope) + Send + Sync + 'static>;

struct Registration {
    category: Category,
    /// Serial of the `register` call that created this entry, so a stale
    /// [`RegistrationHandle`] cannot tear down a replacement.
    serial: u64,
    callback: Callback,
}

#[derive(Default)]
struct Inner {
    next_serial: u64,
    by_id: HashMap<String, Registration>,
    /// Active listener identity per category; last registration wins.
    slots: HashMap<Category, String>,
}

/// Routes inbound envelopes to per-category listeners.
pub struct DispatchRegistry {
    inner: Mutex<Inner>,
    /// Back-reference handed to registration handles.
    weak_self: Weak<Self>,
}

impl DispatchRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(Inner::default()),
            weak_self: weak_self.clone(),
        })
    }

    /// Register `callback` under `listener_id` as the active listener for
    /// `category`.
    ///
    /// Re-registering an existing identity replaces its callback in one
    /// step. Registering a second identity for a category silently takes
    /// over that category's slot; the displaced listener stays registered
    /// but no longer receives frames.
    ///
    /// The returned handle unregisters the listener when dropped; keep it
    /// alive for as long as the listener should receive frames.
    pub fn register(
        &self,
        listener_id: &str,
        category: Category,
        callback: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> RegistrationHandle {
        let mut inner = self.inner.lock();
        inner.next_serial += 1;
        let serial = inner.next_serial;

        if let Some(previous) = inner.by_id.insert(
            listener_id.to_string(),
            Registration {
                category,
                serial,
                callback: Arc::new(callback),
            },
        ) {
            // The identity moved category; free its old slot if it still
            // holds it.
            if previous.category != category {
                Self::release_slot(&mut inner, previous.category, listener_id);
            }
            tracing::debug!(listener_id, %category, "listener re-registered");
        } else {
            tracing::debug!(listener_id, %category, "listener registered");
        }
        inner.slots.insert(category, listener_id.to_string());

        RegistrationHandle {
            registry: self.weak_self.clone(),
            listener_id: listener_id.to_string(),
            serial,
        }
    }

    /// Remove a listener by identity, freeing its category slot if it
    /// still holds it. A no-op for unknown identities.
    pub fn unregister(&self, listener_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(removed) = inner.by_id.remove(listener_id) {
            Self::release_slot(&mut inner, removed.category, listener_id);
            tracing::debug!(listener_id, "listener unregistered");
        }
    }

    /// Route an envelope to the active listener for its category.
    ///
    /// Unknown tags and categories without a listener are dropped. The
    /// callback runs outside the registry lock, so it may itself register
    /// or unregister listeners.
    pub fn route(&self, envelope: &Envelope) {
        let Some(category) = Category::of(envelope.tag()) else {
            tracing::debug!(tag = envelope.tag(), "frame with unknown tag dropped");
            return;
        };
        let callback = {
            let inner = self.inner.lock();
            inner
                .slots
                .get(&category)
                .and_then(|id| inner.by_id.get(id))
                .map(|registration| Arc::clone(&registration.callback))
        };
        match callback {
            Some(callback) => callback(envelope),
            None => {
                tracing::debug!(tag = envelope.tag(), %category, "no listener for frame");
            }
        }
    }

    /// Whether an identity currently has a registration.
    #[must_use]
    pub fn is_registered(&self, listener_id: &str) -> bool {
        self.inner.lock().by_id.contains_key(listener_id)
    }

    fn release(&self, listener_id: &str, serial: u64) {
        let mut inner = self.inner.lock();
        let current = inner.by_id.get(listener_id).map(|r| (r.serial, r.category));
        if let Some((current_serial, category)) = current {
            if current_serial == serial {
                inner.by_id.remove(listener_id);
                Self::release_slot(&mut inner, category, listener_id);
            }
        }
    }

    fn release_slot(inner: &mut Inner, category: Category, listener_id: &str) {
        if inner.slots.get(&category).is_some_and(|id| id == listener_id) {
            inner.slots.remove(&category);
        }
    }
}

/// Scoped ownership of a registration; dropping it unregisters the
/// listener, unless the identity has since been re-registered.
#[must_use = "dropping the handle unregisters the listener"]
pub struct RegistrationHandle {
    registry: Weak<DispatchRegistry>,
    listener_id: String,
    serial: u64,
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.listener_id, self.serial);
        }
    }
}
