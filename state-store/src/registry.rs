//! Multi-consumer notification registry
//!
//! Ordered list of `(listener, tag, payload)` subscriptions. Structural
//! changes (add, remove, sweep) are serialized behind a mutex; a broadcast
//! takes a snapshot of the valid entries under the lock and delivers outside
//! of it, so a slow consumer never blocks registration.
//!
//! # Example
//!
//! ```rust
//! use state_store::{Listener, NotificationRegistry, Tag};
//!
//! let registry = NotificationRegistry::new("example");
//! let (listener, rx) = Listener::channel();
//! registry.add_unique(listener, Tag(1), None);
//!
//! registry.notify_all(42);
//! assert_eq!(rx.try_recv().map(|n| n.result), Some(42));
//! ```

use parking_lot::Mutex;

use crate::listener::{ConsumerId, Listener, Notification, Payload, Tag};

struct Subscription<T> {
    listener: Listener<T>,
    tag: Tag,
    payload: Option<Payload>,
}

impl<T> Subscription<T> {
    fn notification(&self, result: T, error: Option<String>) -> Notification<T> {
        Notification {
            tag: self.tag,
            payload: self.payload.clone(),
            result,
            error,
        }
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            tag: self.tag,
            payload: self.payload.clone(),
        }
    }
}

/// Registry of consumers for one notification stream
pub struct NotificationRegistry<T> {
    name: &'static str,
    entries: Mutex<Vec<Subscription<T>>>,
}

impl<T: Clone> NotificationRegistry<T> {
    /// Create an empty registry; `name` only shows up in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener
    ///
    /// The same consumer may be registered more than once; use `add_unique`
    /// to enforce a single registration.
    pub fn add(&self, listener: Listener<T>, tag: Tag, payload: Option<Payload>) {
        let mut entries = self.entries.lock();
        tracing::trace!(registry = self.name, consumer = %listener.id(), ?tag, "add");
        entries.push(Subscription {
            listener,
            tag,
            payload,
        });
    }

    /// Replace any registration of the same consumer, then register
    pub fn add_unique(&self, listener: Listener<T>, tag: Tag, payload: Option<Payload>) {
        let mut entries = self.entries.lock();
        let id = listener.id();
        let before = entries.len();
        entries.retain(|s| s.listener.id() != id);
        if entries.len() != before {
            tracing::trace!(registry = self.name, consumer = %id, "replacing existing registration");
        }
        entries.push(Subscription {
            listener,
            tag,
            payload,
        });
    }

    /// Remove every registration of a consumer, returning whether any existed
    pub fn remove(&self, id: ConsumerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|s| s.listener.id() != id);
        let removed = entries.len() != before;
        if removed {
            tracing::trace!(registry = self.name, consumer = %id, "removed");
        }
        removed
    }

    /// Whether a consumer is currently registered
    pub fn contains(&self, id: ConsumerId) -> bool {
        self.entries.lock().iter().any(|s| s.listener.id() == id)
    }

    /// Broadcast to every valid registration in registration order
    ///
    /// Returns the number of deliveries.
    pub fn notify_all(&self, result: T) -> usize {
        self.broadcast(result, None)
    }

    /// Broadcast a result together with an error description
    pub fn notify_all_with_error(&self, result: T, error: impl Into<String>) -> usize {
        self.broadcast(result, Some(error.into()))
    }

    /// Deliver to a single registered consumer (used for replay on register)
    pub fn notify_one(&self, id: ConsumerId, result: T) -> bool {
        let subscription = {
            let entries = self.entries.lock();
            entries
                .iter()
                .find(|s| s.listener.id() == id && s.listener.is_valid())
                .cloned()
        };

        match subscription {
            Some(s) => {
                let delivered = s.listener.deliver(s.notification(result, None));
                if !delivered {
                    self.sweep();
                }
                delivered
            }
            None => false,
        }
    }

    /// Number of registrations, including ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of registrations whose consumer is still alive
    pub fn live_len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|s| s.listener.is_valid())
            .count()
    }

    /// Drop every registration
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            tracing::debug!(registry = self.name, count = entries.len(), "clearing registrations");
        }
        entries.clear();
    }

    /// Remove registrations whose consumer is no longer valid
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|s| s.listener.is_valid());
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(registry = self.name, removed, "swept invalid registrations");
        }
        removed
    }

    fn broadcast(&self, result: T, error: Option<String>) -> usize {
        let (snapshot, has_stale) = {
            let entries = self.entries.lock();
            let snapshot: Vec<Subscription<T>> = entries
                .iter()
                .filter(|s| s.listener.is_valid())
                .cloned()
                .collect();
            let has_stale = snapshot.len() != entries.len();
            (snapshot, has_stale)
        };

        let mut delivered = 0;
        let mut stale = has_stale;
        for subscription in &snapshot {
            if subscription
                .listener
                .deliver(subscription.notification(result.clone(), error.clone()))
            {
                delivered += 1;
            } else {
                stale = true;
            }
        }

        if stale {
            self.sweep();
        }
        delivered
    }
}

impl<T> std::fmt::Debug for NotificationRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRegistry")
            .field("name", &self.name)
            .field("registrations", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_notify_empty_registry_is_noop() {
        let registry = NotificationRegistry::<u32>::new("empty");
        assert_eq!(registry.notify_all(1), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_notify_in_registration_order() {
        let registry = NotificationRegistry::new("order");
        let (listener, rx) = Listener::channel();
        for i in 0..3 {
            registry.add(listener.clone(), Tag(i), None);
        }

        assert_eq!(registry.notify_all("hello"), 3);
        let tags: Vec<Tag> = rx.try_iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec![Tag(0), Tag(1), Tag(2)]);
    }

    #[test]
    fn test_add_unique_replaces_registration() {
        let registry = NotificationRegistry::new("unique");
        let (listener, rx) = Listener::channel();

        registry.add_unique(listener.clone(), Tag(1), None);
        registry.add_unique(listener, Tag(2), None);
        assert_eq!(registry.len(), 1);

        registry.notify_all(10);
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].tag, Tag(2));
    }

    #[test]
    fn test_live_len_skips_unswept_dead_consumers() {
        let registry = NotificationRegistry::<u32>::new("live");
        let (a, _rx_a) = Listener::channel();
        let (b, rx_b) = Listener::channel();
        registry.add(a, Tag(0), None);
        registry.add(b, Tag(1), None);

        drop(rx_b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.live_len(), 1);

        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_plain_add_allows_duplicates() {
        let registry = NotificationRegistry::new("dup");
        let (listener, rx) = Listener::channel();
        registry.add(listener.clone(), Tag(1), None);
        registry.add(listener, Tag(1), None);

        assert_eq!(registry.notify_all(1), 2);
        assert_eq!(rx.drain_results(), vec![1, 1]);
    }

    #[test]
    fn test_remove_keeps_other_consumers_in_order() {
        let registry = NotificationRegistry::new("remove");
        let (a, rx_a) = Listener::channel();
        let (b, rx_b) = Listener::channel();
        let (c, rx_c) = Listener::channel();
        registry.add(a, Tag(0), None);
        registry.add(b.clone(), Tag(1), None);
        registry.add(c, Tag(2), None);

        assert!(registry.remove(b.id()));
        assert!(!registry.remove(b.id()));

        assert_eq!(registry.notify_all(5), 2);
        assert_eq!(rx_a.drain_results(), vec![5]);
        assert!(rx_b.try_recv().is_none());
        assert_eq!(rx_c.drain_results(), vec![5]);
    }

    #[test]
    fn test_invalid_consumers_are_skipped_and_swept() {
        let registry = NotificationRegistry::new("sweep");
        let (alive, rx_alive) = Listener::channel();
        let (dead, rx_dead) = Listener::channel();
        registry.add(dead, Tag(0), None);
        registry.add(alive, Tag(1), None);

        drop(rx_dead);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.notify_all(9), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(rx_alive.drain_results(), vec![9]);
    }

    #[test]
    fn test_fully_invalidated_registry_is_noop() {
        let registry = NotificationRegistry::new("all-dead");
        let (listener, rx) = Listener::<u8>::channel();
        registry.add(listener, Tag(0), None);
        drop(rx);

        assert_eq!(registry.notify_all(1), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_notify_with_error_and_payload() {
        let registry = NotificationRegistry::new("error");
        let (listener, rx) = Listener::channel();
        let payload: Payload = Arc::new(String::from("ctx"));
        registry.add(listener, Tag(3), Some(payload));

        registry.notify_all_with_error(false, "radio off");
        let n = rx.try_recv().unwrap();
        assert_eq!(n.error.as_deref(), Some("radio off"));
        let ctx = n.payload.unwrap();
        assert_eq!(ctx.downcast_ref::<String>().map(String::as_str), Some("ctx"));
    }

    #[test]
    fn test_notify_one_targets_single_consumer() {
        let registry = NotificationRegistry::new("one");
        let (a, rx_a) = Listener::channel();
        let (b, rx_b) = Listener::channel();
        registry.add(a, Tag(0), None);
        registry.add(b.clone(), Tag(1), None);

        assert!(registry.notify_one(b.id(), 4));
        assert!(rx_a.try_recv().is_none());
        assert_eq!(rx_b.drain_results(), vec![4]);
    }
}
