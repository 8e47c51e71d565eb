//! Data-connection reports, states and lifecycle events

use serde::{Deserialize, Serialize};
use state_store::Status;

use super::apn::{ApnType, Transport};

/// Explicit per-APN connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Inactive,
    Connecting,
    Connected,
    Handover,
}

impl ConnectionState {
    /// A live session exists (connected, or moving between transports)
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Handover)
    }
}

/// Low-level data state as reported by the telephony stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LowLevelDataState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    HandoverInProgress,
    Suspended,
    Unknown,
}

/// Lifecycle event emitted on an accepted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataConnectionEvent {
    Started,
    Connected,
    Failed,
    Disconnected,
    HandoverStarted,
    HandoverSuccess,
    HandoverFailed,
}

/// One raw report for a traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConnectionReport {
    pub apn: ApnType,
    pub transport: Transport,
    pub state: LowLevelDataState,
    pub fail_cause: i32,
}

impl DataConnectionReport {
    pub fn new(apn: ApnType, transport: Transport, state: LowLevelDataState) -> Self {
        Self {
            apn,
            transport,
            state,
            fail_cause: 0,
        }
    }

    pub fn with_fail_cause(mut self, fail_cause: i32) -> Self {
        self.fail_cause = fail_cause;
        self
    }
}

/// Immutable record delivered to data-connection subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConnectionChangedInfo {
    pub event: DataConnectionEvent,
    pub state: ConnectionState,
    pub transport: Transport,
    pub fail_cause: i32,
}

impl Status for DataConnectionChangedInfo {
    const KEY: &'static str = "data_connection_status";
}
