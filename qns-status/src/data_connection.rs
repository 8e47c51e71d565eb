//! Per-APN data-connection state machine
//!
//! Classifies raw connection-state reports into lifecycle events:
//!
//! ```text
//!  Inactive ──connecting──> Connecting ──connected──> Connected
//!     ^  │                      │                      │    ^
//!     │  └──────connected───────┼──────────────────────┘    │ connected
//!     │                         │ disconnected              │ (same transport: HANDOVER_FAILED,
//!     ├────────── FAILED ───────┘                           │  new transport: HANDOVER_SUCCESS)
//!     │                                  handover-in-progress
//!     └──── DISCONNECTED ─── Connected / Handover <─────────┘
//! ```
//!
//! Reports that do not match a transition for the current state are logged
//! and dropped; the telephony stack is known to race.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use state_store::{ChangeNotifier, ConsumerId, Listener, Tag};

use crate::error::{Result, StatusError};
use crate::model::{
    ApnType, ConnectionState, DataConnectionChangedInfo, DataConnectionEvent,
    DataConnectionReport, LowLevelDataState, SlotIndex, Transport,
};

/// Transition table
///
/// `transport_changed` compares the reported transport with the last known one.
pub fn transition(
    current: ConnectionState,
    reported: LowLevelDataState,
    transport_changed: bool,
) -> Option<(ConnectionState, DataConnectionEvent)> {
    use ConnectionState as S;
    use DataConnectionEvent as E;
    use LowLevelDataState as L;

    match (current, reported) {
        (S::Inactive, L::Connecting) => Some((S::Connecting, E::Started)),
        (S::Connecting, L::Disconnected) => Some((S::Inactive, E::Failed)),
        (S::Connecting | S::Inactive, L::Connected) => Some((S::Connected, E::Connected)),
        (S::Connected | S::Handover, L::Disconnected) => Some((S::Inactive, E::Disconnected)),
        (S::Connected, L::HandoverInProgress) if !transport_changed => {
            Some((S::Handover, E::HandoverStarted))
        }
        (S::Handover, L::Connected) if transport_changed => Some((S::Connected, E::HandoverSuccess)),
        (S::Handover, L::Connected) => Some((S::Connected, E::HandoverFailed)),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct MachineState {
    state: ConnectionState,
    transport: Transport,
    fail_cause: i32,
}

/// State machine for one (slot, APN) pair
pub struct DataConnectionStateMachine {
    slot: SlotIndex,
    apn: ApnType,
    inner: Mutex<MachineState>,
    notifier: ChangeNotifier<DataConnectionChangedInfo>,
}

impl DataConnectionStateMachine {
    pub fn new(slot: SlotIndex, apn: ApnType) -> Self {
        Self {
            slot,
            apn,
            inner: Mutex::new(MachineState::default()),
            notifier: ChangeNotifier::new("data_connection_status"),
        }
    }

    pub fn apn(&self) -> ApnType {
        self.apn
    }

    /// Apply one report, returning the emitted event if it was accepted
    pub fn on_report(
        &self,
        transport: Transport,
        reported: LowLevelDataState,
        fail_cause: i32,
    ) -> Option<DataConnectionEvent> {
        let mut inner = self.inner.lock();
        let transport_changed = transport != inner.transport;

        let Some((next, event)) = transition(inner.state, reported, transport_changed) else {
            tracing::debug!(
                slot = %self.slot,
                apn = %self.apn,
                state = ?inner.state,
                ?reported,
                %transport,
                "dropping report with no matching transition"
            );
            return None;
        };

        tracing::debug!(
            slot = %self.slot,
            apn = %self.apn,
            from = ?inner.state,
            to = ?next,
            ?event,
            %transport,
            fail_cause,
            "data connection transition"
        );

        inner.state = next;
        inner.transport = transport;
        inner.fail_cause = fail_cause;

        // Delivered while the machine is locked so subscribers see events in
        // transition order.
        self.notifier.publish(DataConnectionChangedInfo {
            event,
            state: next,
            transport,
            fail_cause,
        });
        Some(event)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Last transport recorded by an accepted transition
    pub fn transport(&self) -> Transport {
        self.inner.lock().transport
    }

    pub fn fail_cause(&self) -> i32 {
        self.inner.lock().fail_cause
    }

    pub fn last_event(&self) -> Option<DataConnectionChangedInfo> {
        self.notifier.current()
    }

    /// Register and replay the most recent event, if any
    pub fn register(&self, listener: Listener<DataConnectionChangedInfo>, tag: Tag) {
        self.notifier.register_with_replay(listener, tag);
    }

    pub fn unregister(&self, id: ConsumerId) -> bool {
        self.notifier.unregister(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    fn clear_subscribers(&self) {
        self.notifier.clear();
    }
}

/// Read access to the data-connection state of a slot
///
/// Used by aggregators that correlate with data connectivity; they re-read
/// the current value instead of assuming any ordering between feeds.
pub trait DataConnectionStatus: Send + Sync {
    /// A live session exists for the traffic class
    fn is_connected(&self, apn: ApnType) -> bool;
}

/// All data-connection state machines of one slot
pub struct DataConnectionTracker {
    slot: SlotIndex,
    machines: BTreeMap<ApnType, DataConnectionStateMachine>,
    closed: AtomicBool,
}

impl DataConnectionTracker {
    pub fn new(slot: SlotIndex) -> Self {
        let machines = ApnType::ALL
            .into_iter()
            .map(|apn| (apn, DataConnectionStateMachine::new(slot, apn)))
            .collect();

        Self {
            slot,
            machines,
            closed: AtomicBool::new(false),
        }
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Route a raw report to the machine of its traffic class
    pub fn on_report(&self, report: DataConnectionReport) -> Option<DataConnectionEvent> {
        if self.closed.load(Ordering::Acquire) {
            tracing::trace!(slot = %self.slot, ?report, "tracker closed, ignoring report");
            return None;
        }
        self.machine(report.apn)
            .on_report(report.transport, report.state, report.fail_cause)
    }

    pub fn machine(&self, apn: ApnType) -> &DataConnectionStateMachine {
        // Every ApnType gets a machine in `new`.
        &self.machines[&apn]
    }

    pub fn state(&self, apn: ApnType) -> ConnectionState {
        self.machine(apn).state()
    }

    /// Register for status changes of a raw traffic class
    pub fn register(
        &self,
        raw_apn: u32,
        listener: Listener<DataConnectionChangedInfo>,
        tag: Tag,
    ) -> Result<()> {
        let apn = self.resolve(raw_apn)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(StatusError::ProviderClosed(self.slot));
        }
        self.machine(apn).register(listener, tag);
        Ok(())
    }

    pub fn unregister(&self, raw_apn: u32, id: ConsumerId) -> Result<bool> {
        let apn = self.resolve(raw_apn)?;
        Ok(self.machine(apn).unregister(id))
    }

    /// Drop every subscriber; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(slot = %self.slot, "closing data connection tracker");
        for machine in self.machines.values() {
            machine.clear_subscribers();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn resolve(&self, raw_apn: u32) -> Result<ApnType> {
        ApnType::from_raw(raw_apn).ok_or_else(|| {
            tracing::warn!(slot = %self.slot, raw_apn, "rejecting unsupported traffic class");
            StatusError::InvalidTrafficClass(raw_apn)
        })
    }
}

impl DataConnectionStatus for DataConnectionTracker {
    fn is_connected(&self, apn: ApnType) -> bool {
        self.state(apn).is_active()
    }
}
