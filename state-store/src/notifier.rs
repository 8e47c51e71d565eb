//! Change-gated broadcast: a `NotificationRegistry` behind a `ChangeGate`
//!
//! Used by every aggregator that forwards a single evolving value: the gate
//! decides whether a new value is worth broadcasting, the registry delivers
//! it. The gate lock is held across delivery so that a consumer registering
//! with replay can never observe the same value twice or miss one.

use parking_lot::Mutex;

use crate::gate::ChangeGate;
use crate::listener::{ConsumerId, Listener, Tag};
use crate::registry::NotificationRegistry;
use crate::status::Status;

/// Registry + last-value cache for one status stream
pub struct ChangeNotifier<S: Status> {
    registry: NotificationRegistry<S>,
    gate: Mutex<ChangeGate<S>>,
}

impl<S: Status> ChangeNotifier<S> {
    pub fn new(name: &'static str) -> Self {
        Self {
            registry: NotificationRegistry::new(name),
            gate: Mutex::new(ChangeGate::new()),
        }
    }

    /// Create a notifier whose cache already holds `initial`
    ///
    /// The initial value is not broadcast; it suppresses a first publish of
    /// the same value and is what `register_with_replay` hands out until
    /// something else is published.
    pub fn with_initial(name: &'static str, initial: S) -> Self {
        Self {
            registry: NotificationRegistry::new(name),
            gate: Mutex::new(ChangeGate::with_initial(initial)),
        }
    }

    /// Register without replay
    pub fn register(&self, listener: Listener<S>, tag: Tag) {
        let _gate = self.gate.lock();
        self.registry.add_unique(listener, tag, None);
    }

    /// Register and immediately deliver the cached value, if any
    pub fn register_with_replay(&self, listener: Listener<S>, tag: Tag) -> bool {
        let gate = self.gate.lock();
        let id = listener.id();
        self.registry.add_unique(listener, tag, None);
        match gate.current() {
            Some(current) => {
                tracing::trace!(status = S::KEY, consumer = %id, ?current, "replaying last value");
                self.registry.notify_one(id, current.clone())
            }
            None => false,
        }
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        let _gate = self.gate.lock();
        self.registry.remove(id)
    }

    /// Broadcast `value` only if it differs from the last one
    pub fn publish_if_changed(&self, value: S) -> bool {
        let mut gate = self.gate.lock();
        if !gate.would_change(&value) {
            tracing::trace!(status = S::KEY, ?value, "unchanged, not forwarded");
            return false;
        }
        gate.force(value.clone());
        tracing::debug!(status = S::KEY, ?value, "changed");
        self.registry.notify_all(value);
        true
    }

    /// Broadcast `value` unconditionally and cache it
    pub fn publish(&self, value: S) -> usize {
        let mut gate = self.gate.lock();
        gate.force(value.clone());
        tracing::debug!(status = S::KEY, ?value, "published");
        self.registry.notify_all(value)
    }

    /// Last value that went through the gate
    pub fn current(&self) -> Option<S> {
        self.gate.lock().current().cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Subscribers whose consumer has not gone away
    pub fn live_subscriber_count(&self) -> usize {
        self.registry.live_len()
    }

    /// Drop registrations that belong to dead consumers
    pub fn sweep(&self) -> usize {
        self.registry.sweep()
    }

    /// Drop every registration and forget the cached value
    pub fn clear(&self) {
        let mut gate = self.gate.lock();
        self.registry.clear();
        gate.reset();
    }
}

impl<S: Status> std::fmt::Debug for ChangeNotifier<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("status", &S::KEY)
            .field("registry", &self.registry)
            .finish()
    }
}
