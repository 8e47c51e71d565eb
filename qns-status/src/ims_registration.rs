//! IMS registration status with a reference-counted upstream subscription
//!
//! The upstream IMS registration callback is only held while someone
//! listens: the first registrant subscribes, the last one to leave (or a
//! sweep that finds only dead consumers) unsubscribes, exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use state_store::{ChangeNotifier, ConsumerId, Listener, Tag};

use crate::error::{Result, StatusError};
use crate::model::{ImsRegistrationInfo, SlotIndex};

/// Upstream provider of IMS registration callbacks
///
/// Called with the tracker locked: implementations deliver status through
/// `SlotProvider::post_ims_registration`, never synchronously from `subscribe`.
pub trait ImsRegistrationSource: Send + Sync {
    fn subscribe(&self, slot: SlotIndex);
    fn unsubscribe(&self, slot: SlotIndex);
}

/// IMS registration status of one slot
pub struct ImsRegistrationTracker {
    slot: SlotIndex,
    source: Arc<dyn ImsRegistrationSource>,
    /// Whether the upstream subscription is held
    upstream: Mutex<bool>,
    notifier: ChangeNotifier<ImsRegistrationInfo>,
    closed: AtomicBool,
}

impl ImsRegistrationTracker {
    pub fn new(slot: SlotIndex, source: Arc<dyn ImsRegistrationSource>) -> Self {
        Self {
            slot,
            source,
            upstream: Mutex::new(false),
            notifier: ChangeNotifier::new("ims_registration"),
            closed: AtomicBool::new(false),
        }
    }

    /// Register and receive the last known status, if any
    pub fn register(&self, listener: Listener<ImsRegistrationInfo>, tag: Tag) -> Result<()> {
        let mut upstream = self.upstream.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(StatusError::ProviderClosed(self.slot));
        }

        self.notifier.register_with_replay(listener, tag);
        if !*upstream {
            tracing::debug!(slot = %self.slot, "first IMS registration listener, subscribing upstream");
            self.source.subscribe(self.slot);
            *upstream = true;
        }
        Ok(())
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        let mut upstream = self.upstream.lock();
        let removed = self.notifier.unregister(id);
        if removed {
            self.release_if_unused(&mut upstream);
        }
        removed
    }

    /// Forward an upstream status change
    pub fn on_registration_changed(&self, info: ImsRegistrationInfo) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut upstream = self.upstream.lock();
        self.notifier.publish_if_changed(info);
        // Delivery sweeps consumers that went away; they may have been the last.
        self.release_if_unused(&mut upstream);
    }

    pub fn current(&self) -> Option<ImsRegistrationInfo> {
        self.notifier.current()
    }

    /// Number of live registrations holding the upstream subscription
    pub fn ref_count(&self) -> usize {
        self.notifier.live_subscriber_count()
    }

    pub fn is_subscribed_upstream(&self) -> bool {
        *self.upstream.lock()
    }

    /// Release upstream and drop every registrant; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut upstream = self.upstream.lock();
        if *upstream {
            tracing::debug!(slot = %self.slot, "closing, unsubscribing IMS registration upstream");
            self.source.unsubscribe(self.slot);
            *upstream = false;
        }
        self.notifier.clear();
    }

    fn release_if_unused(&self, upstream: &mut bool) {
        self.notifier.sweep();
        if *upstream && self.notifier.subscriber_count() == 0 {
            tracing::debug!(slot = %self.slot, "last IMS registration listener gone, unsubscribing upstream");
            self.source.unsubscribe(self.slot);
            *upstream = false;
        }
    }
}

impl std::fmt::Debug for ImsRegistrationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImsRegistrationTracker")
            .field("slot", &self.slot)
            .field("ref_count", &self.ref_count())
            .field("upstream", &self.is_subscribed_upstream())
            .finish()
    }
}
