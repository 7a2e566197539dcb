// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use common::Session;
use parking_lot::RwLock;
use tracing::debug;

/// Callback invoked with the new session (or `None` after a sign-out).
pub type SessionListener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<u64, SessionListener>,
}

/// Push channel for session changes, shared by a session gateway and its
/// subscribers.
#[derive(Clone, Default)]
pub struct SessionEvents {
    listeners: Arc<RwLock<Listeners>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It is called for every emitted change until the
    /// returned subscription is unsubscribed or dropped.
    pub fn subscribe(&self, listener: SessionListener) -> Subscription {
        let mut listeners = self.listeners.write();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, listener);
        debug!("Session listener {} subscribed.", id);

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Notifies every current listener.
    pub fn emit(&self, session: Option<&Session>) {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<SessionListener> =
            self.listeners.read().entries.values().cloned().collect();
        debug!(
            "Emitting session change (signed in: {}) to {} listener(s).",
            session.is_some(),
            listeners.len()
        );
        for listener in listeners {
            listener(session);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().entries.len()
    }
}

/// Handle returned by [`SessionEvents::subscribe`].
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<RwLock<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Removal happens in Drop.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.write().entries.remove(&self.id);
            debug!("Session listener {} unsubscribed.", self.id);
        }
    }
}
