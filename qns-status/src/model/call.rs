//! Call-leg inputs and the call-related status values

use serde::{Deserialize, Serialize};
use state_store::Status;

use super::apn::{ApnType, Transport};
use super::id_types::{CallId, SlotIndex};
use crate::error::{Result, StatusError};

/// Kind of a call leg as reported by the call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Voice,
    Video,
    Emergency,
}

/// Precise state of a call leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegState {
    Idle,
    Dialing,
    Alerting,
    Active,
    Holding,
    Disconnected,
}

impl LegState {
    /// States in which an emergency call is being set up or carried
    pub fn is_emergency_in_progress(&self) -> bool {
        matches!(self, LegState::Active | LegState::Dialing | LegState::Alerting)
    }
}

/// One inbound call-leg report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLegEvent {
    pub id: CallId,
    pub kind: CallKind,
    pub state: LegState,
}

impl CallLegEvent {
    pub fn new(id: CallId, kind: CallKind, state: LegState) -> Self {
        Self { id, kind, state }
    }
}

/// Aggregate call type of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallType {
    #[default]
    Idle,
    Voice,
    Video,
    Emergency,
}

impl Status for CallType {
    const KEY: &'static str = "call_type";
}

/// Why the media stack flagged RTP quality as low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtpLowQualityReason {
    Jitter,
    PacketLoss,
    NoRtp,
}

/// Low RTP quality report routed to the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpLowQuality {
    pub call_type: CallType,
    pub reason: RtpLowQualityReason,
}

impl Status for RtpLowQuality {
    const KEY: &'static str = "rtp_low_quality";
}

/// Jitter / packet-loss / no-packet thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RtpThresholds {
    pub jitter_ms: u32,
    /// Loss rate in percent over `packet_loss_time_ms`
    pub packet_loss_rate: u32,
    pub packet_loss_time_ms: u32,
    pub no_rtp_interval_ms: u32,
}

/// Threshold configuration pushed down for one traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpThresholdRequest {
    pub apn: ApnType,
    pub thresholds: RtpThresholds,
}

impl RtpThresholdRequest {
    /// Reject requests for traffic classes that carry no media
    pub(crate) fn validate(&self, slot: SlotIndex) -> Result<()> {
        if !self.apn.carries_rtp() {
            tracing::warn!(%slot, apn = %self.apn, "RTP thresholds requested for non-media traffic class");
            return Err(StatusError::InvalidTrafficClass(self.apn.raw()));
        }
        Ok(())
    }
}

/// Transport the network prefers for emergency calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyPreferredTransport(pub Transport);

impl Status for EmergencyPreferredTransport {
    const KEY: &'static str = "emergency_preferred_transport";
}

/// Whether the IMS stack is trying a Wi-Fi calling connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryWfcConnectionState(pub bool);

impl Status for TryWfcConnectionState {
    const KEY: &'static str = "try_wfc_connection_state";
}
