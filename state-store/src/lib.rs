//! Change-Gated Notification Library
//!
//! Building blocks for status aggregators that turn noisy input streams into
//! de-duplicated notifications for several consumers.
//!
//! # Features
//!
//! - **Notification Registry**: ordered multi-consumer subscriptions with
//!   at-most-one registration per consumer and lazy removal of dead consumers
//! - **Change Detection**: `ChangeGate` only lets a value through when it
//!   differs structurally from the last one
//! - **Replay**: `ChangeNotifier` hands late joiners the last value
//! - **Sequential Dispatch**: `SerialExecutor` runs queued jobs one at a time
//!   in enqueue order
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::{ChangeNotifier, Listener, Status, Tag};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct LinkUp(bool);
//!
//! impl Status for LinkUp {
//!     const KEY: &'static str = "link_up";
//! }
//!
//! let notifier = ChangeNotifier::new("link");
//! let (listener, rx) = Listener::channel();
//! notifier.register(listener, Tag(1));
//!
//! notifier.publish_if_changed(LinkUp(true));
//! notifier.publish_if_changed(LinkUp(true)); // suppressed
//!
//! assert_eq!(rx.drain_results(), vec![LinkUp(true)]);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ChangeNotifier<S>
//!     │
//!     ├── gate: Mutex<ChangeGate<S>>          (last delivered value)
//!     │
//!     └── registry: NotificationRegistry<S>
//!             │
//!             └── Vec<(Listener<S>, Tag, Payload)>
//!                     │
//!                     └── mpsc::Sender ──> NotificationReceiver<S>
//! ```

// Modules
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod listener;
pub mod notifier;
pub mod registry;
pub mod status;

// Re-exports - Public API
pub use dispatch::SerialExecutor;
pub use error::{DispatchError, Result};
pub use gate::ChangeGate;
pub use listener::{
    ConsumerId, Listener, Notification, NotificationReceiver, Payload, Tag, TimeoutIter, TryIter,
};
pub use notifier::ChangeNotifier;
pub use registry::NotificationRegistry;
pub use status::Status;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::gate::ChangeGate;
    pub use crate::listener::{ConsumerId, Listener, Notification, NotificationReceiver, Tag};
    pub use crate::notifier::ChangeNotifier;
    pub use crate::registry::NotificationRegistry;
    pub use crate::status::Status;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    struct Availability {
        available: bool,
        cross_sim: bool,
    }

    impl Status for Availability {
        const KEY: &'static str = "availability";
    }

    #[test]
    fn test_full_workflow() {
        let notifier = ChangeNotifier::new("availability");
        let (first, first_rx) = Listener::channel();
        notifier.register(first, Tag(1));

        let up = Availability { available: true, cross_sim: false };
        assert!(notifier.publish_if_changed(up.clone()));
        assert!(!notifier.publish_if_changed(up.clone()));

        // Late joiner sees the current value immediately
        let (second, second_rx) = Listener::channel();
        notifier.register_with_replay(second, Tag(2));
        assert_eq!(second_rx.drain_results(), vec![up.clone()]);

        let down = Availability { available: false, cross_sim: false };
        notifier.publish_if_changed(down.clone());

        assert_eq!(first_rx.drain_results(), vec![up, down.clone()]);
        assert_eq!(second_rx.drain_results(), vec![down]);
    }

    #[test]
    fn test_dropped_consumer_does_not_affect_others() {
        let registry = NotificationRegistry::new("workflow");
        let (a, rx_a) = Listener::channel();
        let (b, rx_b) = Listener::channel();
        registry.add_unique(a, Tag(0), None);
        registry.add_unique(b, Tag(0), None);

        drop(rx_a);
        assert_eq!(registry.notify_all(1u8), 1);
        assert_eq!(rx_b.drain_results(), vec![1]);
    }
}
