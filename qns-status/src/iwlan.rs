//! IWLAN availability tracking
//!
//! Combines the system default network, per-slot IWLAN registration and
//! cross-SIM calling state with carrier configuration into one
//! `AvailabilityInfo` per slot:
//!
//! - Wi-Fi is the default network: available when the slot is IWLAN
//!   registered, unless the carrier blocks IPv6-only Wi-Fi and the link has
//!   no IPv4.
//! - Otherwise, with cross-SIM calling enabled: available (as cross-SIM) when
//!   the slot is IWLAN registered, is not the default data subscription, and
//!   a default cellular network of another subscription is up.
//! - Otherwise unavailable.
//!
//! Structurally equal values are never forwarded twice. Losing Wi-Fi, or the
//! Wi-Fi link dropping to IPv6-only under the block policy, raises a one-shot
//! `notify_disabled` edge that bypasses suppression.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use state_store::{ChangeGate, ConsumerId, Listener, NotificationRegistry, Tag};

use crate::config::ConfigSource;
use crate::model::{
    AvailabilityInfo, DefaultNetworkEvent, LinkProtocol, NetworkId, NetworkTransport, SlotIndex,
    SubscriptionId,
};

/// What caused a re-evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Update,
    WifiLost,
    Ipv6OnlyWifi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DefaultNetwork {
    id: NetworkId,
    transport: NetworkTransport,
    subscription: Option<SubscriptionId>,
    protocol: LinkProtocol,
}

impl DefaultNetwork {
    fn is_wifi(&self) -> bool {
        self.transport == NetworkTransport::Wifi
    }
}

/// Subscribers and last delivered value of one slot
struct SlotContext {
    registry: NotificationRegistry<AvailabilityInfo>,
    gate: ChangeGate<AvailabilityInfo>,
}

impl SlotContext {
    fn new() -> Self {
        Self {
            registry: NotificationRegistry::new("iwlan_availability"),
            gate: ChangeGate::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotInputs {
    iwlan_registered: bool,
    /// Last cross-SIM toggle; configuration is read until one arrives
    cross_sim_enabled: Option<bool>,
}

#[derive(Default)]
struct TrackerState {
    network: Option<DefaultNetwork>,
    inputs: BTreeMap<SlotIndex, SlotInputs>,
    contexts: BTreeMap<SlotIndex, SlotContext>,
}

/// Per-slot IWLAN availability with change suppression
pub struct IwlanAvailabilityTracker {
    config: Arc<dyn ConfigSource>,
    state: Mutex<TrackerState>,
    closed: AtomicBool,
}

impl IwlanAvailabilityTracker {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Apply a default-network callback and re-evaluate every slot
    pub fn on_default_network_event(&self, event: DefaultNetworkEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        let before = state.network;

        match event {
            DefaultNetworkEvent::Available {
                network,
                transport,
                subscription,
            }
            | DefaultNetworkEvent::CapabilitiesChanged {
                network,
                transport,
                subscription,
            } => {
                let protocol = before
                    .filter(|n| n.id == network)
                    .map_or(LinkProtocol::Unknown, |n| n.protocol);
                state.network = Some(DefaultNetwork {
                    id: network,
                    transport,
                    subscription,
                    protocol,
                });
            }
            DefaultNetworkEvent::LinkPropertiesChanged { network, addresses } => {
                match state.network.as_mut() {
                    Some(current) if current.id == network => {
                        current.protocol = LinkProtocol::from_addresses(&addresses);
                    }
                    _ => {
                        tracing::trace!(%network, "link properties for non-default network ignored");
                        return;
                    }
                }
            }
            DefaultNetworkEvent::Lost { network } => match state.network {
                Some(current) if current.id == network => state.network = None,
                _ => {
                    tracing::trace!(%network, "loss of non-default network ignored");
                    return;
                }
            },
        }

        let after = state.network;
        let trigger = classify(before, after);
        tracing::debug!(?before, ?after, ?trigger, "default network changed");
        self.evaluate_all(&mut state, trigger);
    }

    pub fn on_iwlan_registration_changed(&self, slot: SlotIndex, registered: bool) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        state.inputs.entry(slot).or_default().iwlan_registered = registered;
        tracing::debug!(%slot, registered, "IWLAN registration changed");
        self.evaluate_slot(&mut state, slot, Trigger::Update);
    }

    pub fn on_cross_sim_calling_changed(&self, slot: SlotIndex, enabled: bool) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        state.inputs.entry(slot).or_default().cross_sim_enabled = Some(enabled);
        tracing::debug!(%slot, enabled, "cross-SIM calling toggled");
        self.evaluate_slot(&mut state, slot, Trigger::Update);
    }

    /// Carrier or subscription configuration changed; re-read it for every slot
    pub fn on_configuration_changed(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        self.evaluate_all(&mut state, Trigger::Update);
    }

    /// Register for availability changes of a slot
    ///
    /// The registrant immediately receives the current tuple.
    pub fn register(&self, slot: SlotIndex, listener: Listener<AvailabilityInfo>, tag: Tag) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(%slot, "tracker closed, registration ignored");
            return;
        }
        let mut state = self.state.lock();
        let current = self.compute(&state, slot);
        let id = listener.id();

        let context = state.contexts.entry(slot).or_insert_with(|| {
            tracing::debug!(%slot, "allocating IWLAN availability context");
            SlotContext::new()
        });
        context.registry.add_unique(listener, tag, None);

        if context.gate.offer(current) {
            tracing::debug!(%slot, ?current, "availability changed");
            context.registry.notify_all(current);
        } else if let Some(cached) = context.gate.current() {
            context.registry.notify_one(id, *cached);
        }
    }

    pub fn unregister(&self, slot: SlotIndex, id: ConsumerId) -> bool {
        self.state
            .lock()
            .contexts
            .get(&slot)
            .map_or(false, |context| context.registry.remove(id))
    }

    /// Last value delivered for the slot
    pub fn last_info(&self, slot: SlotIndex) -> Option<AvailabilityInfo> {
        self.state
            .lock()
            .contexts
            .get(&slot)
            .and_then(|context| context.gate.current().copied())
    }

    pub fn subscriber_count(&self, slot: SlotIndex) -> usize {
        self.state
            .lock()
            .contexts
            .get(&slot)
            .map_or(0, |context| context.registry.len())
    }

    /// Tear down the slot's context and forget its inputs
    pub fn close_slot(&self, slot: SlotIndex) {
        let mut state = self.state.lock();
        state.inputs.remove(&slot);
        if let Some(context) = state.contexts.remove(&slot) {
            tracing::debug!(%slot, "releasing IWLAN availability context");
            context.registry.clear();
        }
    }

    /// Tear down every slot; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.state.lock();
        for context in state.contexts.values() {
            context.registry.clear();
        }
        state.contexts.clear();
        state.inputs.clear();
        state.network = None;
        tracing::debug!("IWLAN availability tracker closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn evaluate_all(&self, state: &mut TrackerState, trigger: Trigger) {
        let slots: Vec<SlotIndex> = state.contexts.keys().copied().collect();
        for slot in slots {
            self.evaluate_slot(state, slot, trigger);
        }
    }

    fn evaluate_slot(&self, state: &mut TrackerState, slot: SlotIndex, trigger: Trigger) {
        let info = self.compute(state, slot);
        let Some(context) = state.contexts.get_mut(&slot) else {
            return;
        };

        let edge = !info.is_available
            && match trigger {
                Trigger::WifiLost => true,
                Trigger::Ipv6OnlyWifi => self.config.block_ipv6_only_wifi(slot),
                Trigger::Update => false,
            };

        if edge {
            let delivered = info.with_disabled_edge();
            tracing::debug!(%slot, ?trigger, ?delivered, "availability lost, raising disabled edge");
            context.gate.force(info);
            context.registry.notify_all(delivered);
        } else if context.gate.offer(info) {
            tracing::debug!(%slot, ?info, "availability changed");
            context.registry.notify_all(info);
        } else {
            tracing::trace!(%slot, ?info, "availability unchanged");
        }
    }

    fn compute(&self, state: &TrackerState, slot: SlotIndex) -> AvailabilityInfo {
        let inputs = state.inputs.get(&slot).copied().unwrap_or_default();

        match state.network {
            Some(network) if network.is_wifi() => {
                let blocked =
                    self.config.block_ipv6_only_wifi(slot) && network.protocol.lacks_ipv4();
                if inputs.iwlan_registered && !blocked {
                    AvailabilityInfo::available(false)
                } else {
                    AvailabilityInfo::UNAVAILABLE
                }
            }
            network => {
                let cross_sim_enabled = inputs
                    .cross_sim_enabled
                    .unwrap_or_else(|| self.config.is_cross_sim_calling_enabled(slot));
                if cross_sim_enabled
                    && inputs.iwlan_registered
                    && self.cross_sim_path_up(slot, network)
                {
                    AvailabilityInfo::available(true)
                } else {
                    AvailabilityInfo::UNAVAILABLE
                }
            }
        }
    }

    /// Another subscription's cellular network can carry this slot's calls
    fn cross_sim_path_up(&self, slot: SlotIndex, network: Option<DefaultNetwork>) -> bool {
        let Some(own) = self.config.subscription_id(slot) else {
            return false;
        };
        if self.config.default_data_subscription() == Some(own) {
            return false;
        }
        matches!(
            network,
            Some(DefaultNetwork {
                transport: NetworkTransport::Cellular,
                subscription: Some(other),
                ..
            }) if other != own
        )
    }
}

impl std::fmt::Debug for IwlanAvailabilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IwlanAvailabilityTracker")
            .field("network", &state.network)
            .field("slots", &state.contexts.keys().collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn classify(before: Option<DefaultNetwork>, after: Option<DefaultNetwork>) -> Trigger {
    match (before, after) {
        (Some(old), new) if old.is_wifi() && !new.map_or(false, |n| n.is_wifi()) => {
            Trigger::WifiLost
        }
        (Some(old), Some(new))
            if old.is_wifi()
                && new.is_wifi()
                && old.id == new.id
                && !old.protocol.lacks_ipv4()
                && new.protocol.lacks_ipv4() =>
        {
            Trigger::Ipv6OnlyWifi
        }
        _ => Trigger::Update,
    }
}
