//! Consumer handles and the receiving side of a subscription
//!
//! A `Listener` is what a consumer hands to a registry. It owns the sending
//! half of a `std::sync::mpsc` channel plus a liveness flag shared with the
//! matching `NotificationReceiver`. Dropping the receiver (or calling
//! `Listener::invalidate`) marks the consumer dead; registries check the flag
//! before every delivery and sweep dead entries lazily.
//!
//! The receiver exposes the same iteration patterns as a blocking channel:
//! - Blocking: `recv()`, `for n in receiver`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a consumer, used for unregistering and `add_unique`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    fn next() -> Self {
        Self(NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Opaque tag a consumer attaches to a subscription
///
/// Echoed back unchanged on every notification so a consumer that registers
/// one listener for several streams can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag(pub u32);

/// Opaque per-subscription payload, echoed back like the tag
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A single delivery to a consumer
pub struct Notification<T> {
    /// Tag supplied at registration
    pub tag: Tag,
    /// Payload supplied at registration, if any
    pub payload: Option<Payload>,
    /// The broadcast value
    pub result: T,
    /// Error attached by `notify_all_with_error`
    pub error: Option<String>,
}

impl<T: Clone> Clone for Notification<T> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            payload: self.payload.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Notification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("tag", &self.tag)
            .field("has_payload", &self.payload.is_some())
            .field("result", &self.result)
            .field("error", &self.error)
            .finish()
    }
}

/// Sending half handed to registries
pub struct Listener<T> {
    id: ConsumerId,
    tx: mpsc::Sender<Notification<T>>,
    alive: Arc<AtomicBool>,
}

impl<T> Listener<T> {
    /// Create a listener and the receiver its notifications arrive on
    pub fn channel() -> (Listener<T>, NotificationReceiver<T>) {
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let listener = Listener {
            id: ConsumerId::next(),
            tx,
            alive: Arc::clone(&alive),
        };
        let receiver = NotificationReceiver { id: listener.id, rx, alive };
        (listener, receiver)
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Whether the consumer can still receive notifications
    pub fn is_valid(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the consumer dead; every registry holding it will skip it
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Deliver a notification, returning false when the consumer is gone
    pub(crate) fn deliver(&self, notification: Notification<T>) -> bool {
        if !self.is_valid() {
            return false;
        }
        if self.tx.send(notification).is_err() {
            self.invalidate();
            return false;
        }
        true
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Receiving half owned by the consumer
///
/// Dropping it invalidates the matching `Listener` everywhere it is registered.
pub struct NotificationReceiver<T> {
    id: ConsumerId,
    rx: mpsc::Receiver<Notification<T>>,
    alive: Arc<AtomicBool>,
}

impl<T> NotificationReceiver<T> {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Block until the next notification is available
    ///
    /// Returns `None` once every listener clone is dropped.
    pub fn recv(&self) -> Option<Notification<T>> {
        self.rx.recv().ok()
    }

    /// Block until the next notification or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Notification<T>> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Try to receive a notification without blocking
    pub fn try_recv(&self) -> Option<Notification<T>> {
        self.rx.try_recv().ok()
    }

    /// Non-blocking iterator over currently queued notifications
    pub fn try_iter(&self) -> TryIter<'_, T> {
        TryIter { inner: self }
    }

    /// Blocking iterator that stops after `timeout` without a notification
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_, T> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }

    /// Drain queued notifications and keep only the results
    pub fn drain_results(&self) -> Vec<T> {
        self.try_iter().map(|n| n.result).collect()
    }
}

impl<T> Drop for NotificationReceiver<T> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl<T> Iterator for NotificationReceiver<T> {
    type Item = Notification<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available notifications
pub struct TryIter<'a, T> {
    inner: &'a NotificationReceiver<T>,
}

impl<'a, T> Iterator for TryIter<'a, T> {
    type Item = Notification<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a, T> {
    inner: &'a NotificationReceiver<T>,
    timeout: Duration,
}

impl<'a, T> Iterator for TimeoutIter<'a, T> {
    type Item = Notification<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(result: i32) -> Notification<i32> {
        Notification {
            tag: Tag(7),
            payload: None,
            result,
            error: None,
        }
    }

    #[test]
    fn test_consumer_ids_are_unique() {
        let (a, _rx_a) = Listener::<i32>::channel();
        let (b, _rx_b) = Listener::<i32>::channel();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_deliver_and_receive() {
        let (listener, rx) = Listener::channel();
        assert!(listener.deliver(notification(1)));
        assert!(listener.deliver(notification(2)));

        let received: Vec<i32> = rx.try_iter().map(|n| n.result).collect();
        assert_eq!(received, vec![1, 2]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_tag_is_echoed() {
        let (listener, rx) = Listener::channel();
        listener.deliver(notification(5));
        let n = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(n.tag, Tag(7));
        assert_eq!(n.result, 5);
    }

    #[test]
    fn test_dropping_receiver_invalidates_listener() {
        let (listener, rx) = Listener::<i32>::channel();
        assert!(listener.is_valid());

        drop(rx);
        assert!(!listener.is_valid());
        assert!(!listener.deliver(notification(1)));
    }

    #[test]
    fn test_invalidate_blocks_delivery() {
        let (listener, rx) = Listener::channel();
        let clone = listener.clone();
        clone.invalidate();

        assert!(!listener.deliver(notification(1)));
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_timeout_iter_stops() {
        let (_listener, rx) = Listener::<i32>::channel();
        let collected: Vec<_> = rx.timeout_iter(Duration::from_millis(10)).collect();
        assert!(collected.is_empty());
    }
}
