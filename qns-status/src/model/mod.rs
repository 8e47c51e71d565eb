//! Model types for qns-status

mod apn;
mod call;
mod data_connection;
mod id_types;
mod ims;
mod network;

pub use apn::{ApnType, Transport};
pub use call::{
    CallKind, CallLegEvent, CallType, EmergencyPreferredTransport, LegState, RtpLowQuality,
    RtpLowQualityReason, RtpThresholdRequest, RtpThresholds, TryWfcConnectionState,
};
pub use data_connection::{
    ConnectionState, DataConnectionChangedInfo, DataConnectionEvent, DataConnectionReport,
    LowLevelDataState,
};
pub use id_types::{CallId, NetworkId, SlotIndex, SubscriptionId};
pub use ims::{ImsRegistrationInfo, ImsRegistrationState};
pub use network::{AvailabilityInfo, DefaultNetworkEvent, LinkProtocol, NetworkTransport};
