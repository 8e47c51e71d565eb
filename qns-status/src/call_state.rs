//! Per-slot call-state aggregation
//!
//! Collapses concurrent call legs into one call type, tracks the single
//! emergency call separately, routes low RTP quality reports and pushes RTP
//! threshold requests down to the media stack.
//!
//! # Emergency overlay
//!
//! When an emergency call starts (active, dialing or alerting) while the
//! emergency PDN is down but the IMS PDN is up, the call is carried over IMS
//! and the slot's call type is forced to `Emergency`. The overlay ends when
//! the emergency call disconnects, and the call type is recomputed only if
//! `Emergency` was the last reported value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use state_store::{ChangeNotifier, ConsumerId, Listener, NotificationRegistry, Tag};

use crate::data_connection::DataConnectionStatus;
use crate::error::{Result, StatusError};
use crate::model::{
    ApnType, CallId, CallKind, CallLegEvent, CallType, EmergencyPreferredTransport, LegState,
    RtpLowQuality, RtpLowQualityReason, RtpThresholdRequest, SlotIndex, Transport,
    TryWfcConnectionState,
};

/// Push-down interface to the media stack
pub trait MediaQualityController: Send + Sync {
    /// Apply RTP quality thresholds to a call
    fn set_rtp_thresholds(&self, slot: SlotIndex, call_id: CallId, request: &RtpThresholdRequest);
}

// ============================================================================
// Internal state
// ============================================================================

/// Live voice/video leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CallRecord {
    kind: CallKind,
    state: LegState,
}

#[derive(Debug, Clone, Copy)]
struct EmergencyCall {
    id: CallId,
    state: LegState,
}

#[derive(Debug, Default)]
struct CallState {
    legs: BTreeMap<CallId, CallRecord>,
    emergency: Option<EmergencyCall>,
    overlay_active: bool,
    pending_rtp: Option<RtpThresholdRequest>,
}

impl CallState {
    fn aggregate(&self) -> CallType {
        if self.legs.is_empty() {
            CallType::Idle
        } else if self.legs.values().any(|r| r.kind == CallKind::Video) {
            CallType::Video
        } else {
            CallType::Voice
        }
    }

    fn emergency_call_type(&self) -> CallType {
        match self.emergency {
            Some(call) if !matches!(call.state, LegState::Idle | LegState::Disconnected) => {
                CallType::Emergency
            }
            _ => CallType::Idle,
        }
    }

    /// First call that should receive a threshold request for `apn`
    fn active_call_for(&self, apn: ApnType) -> Option<CallId> {
        match apn {
            ApnType::Emergency => self
                .emergency
                .filter(|call| call.state == LegState::Active)
                .map(|call| call.id),
            _ => self
                .legs
                .iter()
                .find(|(_, record)| record.state == LegState::Active)
                .map(|(id, _)| *id),
        }
    }
}

// ============================================================================
// CallStateAggregator
// ============================================================================

/// Call-type aggregator for one slot
pub struct CallStateAggregator {
    slot: SlotIndex,
    media_quality: Arc<dyn MediaQualityController>,
    data_status: Arc<dyn DataConnectionStatus>,

    state: Mutex<CallState>,
    closed: AtomicBool,

    call_type: ChangeNotifier<CallType>,
    emergency_call_type: ChangeNotifier<CallType>,
    emergency_preferred_transport: ChangeNotifier<EmergencyPreferredTransport>,
    try_wfc_connection_state: ChangeNotifier<TryWfcConnectionState>,

    ims_low_quality: NotificationRegistry<RtpLowQuality>,
    emergency_low_quality: NotificationRegistry<RtpLowQuality>,
}

impl CallStateAggregator {
    pub fn builder(slot: SlotIndex) -> CallStateAggregatorBuilder {
        CallStateAggregatorBuilder {
            slot,
            media_quality: None,
            data_status: None,
        }
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Apply one call-leg report
    pub fn update_call_info(&self, event: CallLegEvent) {
        if self.closed.load(Ordering::Acquire) {
            tracing::trace!(slot = %self.slot, ?event, "aggregator closed, ignoring call update");
            return;
        }

        let mut state = self.state.lock();

        if event.state == LegState::Active {
            if let Some(request) = state.pending_rtp {
                tracing::debug!(
                    slot = %self.slot,
                    call = %event.id,
                    apn = %request.apn,
                    "re-issuing RTP thresholds to newly active call"
                );
                self.media_quality
                    .set_rtp_thresholds(self.slot, event.id, &request);
            }
        }

        if event.kind == CallKind::Emergency {
            self.update_emergency(&mut state, event);
            return;
        }

        let known = state.legs.contains_key(&event.id);
        match (known, event.state) {
            (false, LegState::Active) => {
                tracing::debug!(slot = %self.slot, call = %event.id, kind = ?event.kind, "call leg created");
                state.legs.insert(
                    event.id,
                    CallRecord {
                        kind: event.kind,
                        state: LegState::Active,
                    },
                );
            }
            (false, LegState::Disconnected) => {
                tracing::debug!(slot = %self.slot, call = %event.id, "disconnect for unknown call ignored");
            }
            (false, _) => {
                tracing::trace!(slot = %self.slot, ?event, "no record yet, waiting for active");
            }
            (true, LegState::Disconnected) => {
                tracing::debug!(slot = %self.slot, call = %event.id, "call leg removed");
                state.legs.remove(&event.id);
            }
            (true, leg_state) => {
                if let Some(record) = state.legs.get_mut(&event.id) {
                    record.kind = event.kind;
                    if matches!(leg_state, LegState::Active | LegState::Holding) {
                        record.state = leg_state;
                    }
                }
            }
        }

        if state.overlay_active {
            tracing::debug!(
                slot = %self.slot,
                "emergency overlay active, call type stays emergency"
            );
            return;
        }
        self.call_type.publish_if_changed(state.aggregate());
    }

    fn update_emergency(&self, state: &mut CallState, event: CallLegEvent) {
        if event.state == LegState::Disconnected {
            match state.emergency {
                Some(call) if call.id == event.id => state.emergency = None,
                _ => {
                    tracing::debug!(slot = %self.slot, call = %event.id, "disconnect for unknown emergency call ignored");
                    return;
                }
            }
        } else {
            state.emergency = Some(EmergencyCall {
                id: event.id,
                state: event.state,
            });
        }

        self.emergency_call_type
            .publish_if_changed(state.emergency_call_type());

        if event.state.is_emergency_in_progress()
            && !self.data_status.is_connected(ApnType::Emergency)
            && self.data_status.is_connected(ApnType::Ims)
        {
            if !state.overlay_active {
                tracing::debug!(slot = %self.slot, call = %event.id, "emergency call over IMS PDN, forcing call type");
            }
            state.overlay_active = true;
            self.call_type.publish_if_changed(CallType::Emergency);
        } else if event.state == LegState::Disconnected {
            state.overlay_active = false;
            if self.call_type.current() == Some(CallType::Emergency) {
                tracing::debug!(slot = %self.slot, "emergency call ended, reverting call type");
                self.call_type.publish_if_changed(state.aggregate());
            }
        }
    }

    /// Route a low RTP quality report to the matching listeners
    pub fn notify_rtp_low_quality(&self, call_type: CallType, reason: RtpLowQualityReason) {
        let report = RtpLowQuality { call_type, reason };
        match call_type {
            CallType::Voice | CallType::Video => {
                self.ims_low_quality.notify_all(report);
            }
            CallType::Emergency => {
                self.emergency_low_quality.notify_all(report);
                if self.state.lock().overlay_active {
                    self.ims_low_quality.notify_all(report);
                }
            }
            CallType::Idle => {
                tracing::debug!(slot = %self.slot, ?reason, "low RTP quality without a call, dropped");
            }
        }
    }

    /// Store RTP thresholds and apply them to a matching active call
    pub fn request_rtp_threshold(&self, request: RtpThresholdRequest) -> Result<()> {
        request.validate(self.slot)?;

        let mut state = self.state.lock();
        state.pending_rtp = Some(request);
        match state.active_call_for(request.apn) {
            Some(call_id) => {
                self.media_quality
                    .set_rtp_thresholds(self.slot, call_id, &request);
            }
            None => {
                tracing::debug!(slot = %self.slot, apn = %request.apn, "no active call, RTP thresholds stored");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reports from the IMS stack
    // ------------------------------------------------------------------------

    pub fn report_emergency_preferred_transport(&self, transport: Transport) {
        self.emergency_preferred_transport
            .publish_if_changed(EmergencyPreferredTransport(transport));
    }

    pub fn report_try_wfc_connection_state(&self, trying: bool) {
        self.try_wfc_connection_state
            .publish_if_changed(TryWfcConnectionState(trying));
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    pub fn register_call_type_changed(&self, listener: Listener<CallType>, tag: Tag) {
        self.call_type.register(listener, tag);
    }

    pub fn unregister_call_type_changed(&self, id: ConsumerId) -> bool {
        self.call_type.unregister(id)
    }

    pub fn register_emergency_call_type_changed(&self, listener: Listener<CallType>, tag: Tag) {
        self.emergency_call_type.register(listener, tag);
    }

    pub fn unregister_emergency_call_type_changed(&self, id: ConsumerId) -> bool {
        self.emergency_call_type.unregister(id)
    }

    /// Register for low RTP quality on a raw traffic class (IMS or emergency)
    pub fn register_low_rtp_quality(
        &self,
        raw_apn: u32,
        listener: Listener<RtpLowQuality>,
        tag: Tag,
    ) -> Result<()> {
        self.low_quality_registry(raw_apn)?
            .add_unique(listener, tag, None);
        Ok(())
    }

    pub fn unregister_low_rtp_quality(&self, raw_apn: u32, id: ConsumerId) -> Result<bool> {
        Ok(self.low_quality_registry(raw_apn)?.remove(id))
    }

    /// Register and receive the last reported transport, if any
    pub fn register_emergency_preferred_transport_changed(
        &self,
        listener: Listener<EmergencyPreferredTransport>,
        tag: Tag,
    ) {
        self.emergency_preferred_transport
            .register_with_replay(listener, tag);
    }

    pub fn unregister_emergency_preferred_transport_changed(&self, id: ConsumerId) -> bool {
        self.emergency_preferred_transport.unregister(id)
    }

    /// Register and receive the last reported state, if any
    pub fn register_try_wfc_connection_state(
        &self,
        listener: Listener<TryWfcConnectionState>,
        tag: Tag,
    ) {
        self.try_wfc_connection_state
            .register_with_replay(listener, tag);
    }

    pub fn unregister_try_wfc_connection_state(&self, id: ConsumerId) -> bool {
        self.try_wfc_connection_state.unregister(id)
    }

    fn low_quality_registry(&self, raw_apn: u32) -> Result<&NotificationRegistry<RtpLowQuality>> {
        match ApnType::from_raw(raw_apn) {
            Some(ApnType::Ims) => Ok(&self.ims_low_quality),
            Some(ApnType::Emergency) => Ok(&self.emergency_low_quality),
            _ => {
                tracing::warn!(slot = %self.slot, raw_apn, "rejecting low RTP quality registration");
                Err(StatusError::InvalidTrafficClass(raw_apn))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Last reported call type is idle
    pub fn is_idle(&self) -> bool {
        self.call_type() == CallType::Idle
    }

    pub fn is_emergency_idle(&self) -> bool {
        self.state.lock().emergency_call_type() == CallType::Idle
    }

    /// Last reported call type
    pub fn call_type(&self) -> CallType {
        self.call_type.current().unwrap_or_default()
    }

    /// Number of tracked voice/video legs
    pub fn active_call_count(&self) -> usize {
        self.state.lock().legs.len()
    }

    pub fn is_emergency_overlay_active(&self) -> bool {
        self.state.lock().overlay_active
    }

    /// Drop every subscriber; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(slot = %self.slot, "closing call state aggregator");
        self.call_type.clear();
        self.emergency_call_type.clear();
        self.emergency_preferred_transport.clear();
        self.try_wfc_connection_state.clear();
        self.ims_low_quality.clear();
        self.emergency_low_quality.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CallStateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallStateAggregator")
            .field("slot", &self.slot)
            .field("call_type", &self.call_type())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// CallStateAggregatorBuilder
// ============================================================================

/// Builder for CallStateAggregator
pub struct CallStateAggregatorBuilder {
    slot: SlotIndex,
    media_quality: Option<Arc<dyn MediaQualityController>>,
    data_status: Option<Arc<dyn DataConnectionStatus>>,
}

impl CallStateAggregatorBuilder {
    /// Set the media stack receiving RTP threshold requests
    pub fn with_media_quality(mut self, controller: Arc<dyn MediaQualityController>) -> Self {
        self.media_quality = Some(controller);
        self
    }

    /// Set the data-connection view used by the emergency overlay
    pub fn with_data_status(mut self, status: Arc<dyn DataConnectionStatus>) -> Self {
        self.data_status = Some(status);
        self
    }

    /// Build the aggregator, failing if a collaborator is missing
    pub fn build(self) -> Result<CallStateAggregator> {
        let media_quality = self
            .media_quality
            .ok_or(StatusError::MissingDependency("media quality controller"))?;
        let data_status = self
            .data_status
            .ok_or(StatusError::MissingDependency("data connection status"))?;

        Ok(CallStateAggregator {
            slot: self.slot,
            media_quality,
            data_status,
            state: Mutex::new(CallState::default()),
            closed: AtomicBool::new(false),
            call_type: ChangeNotifier::with_initial("call_type", CallType::Idle),
            emergency_call_type: ChangeNotifier::with_initial("emergency_call_type", CallType::Idle),
            emergency_preferred_transport: ChangeNotifier::new("emergency_preferred_transport"),
            try_wfc_connection_state: ChangeNotifier::new("try_wfc_connection_state"),
            ims_low_quality: NotificationRegistry::new("ims_low_rtp_quality"),
            emergency_low_quality: NotificationRegistry::new("emergency_low_rtp_quality"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RtpThresholds;
    use std::collections::HashSet;

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<(CallId, RtpThresholdRequest)>>,
    }

    impl MediaQualityController for RecordingController {
        fn set_rtp_thresholds(&self, _slot: SlotIndex, call_id: CallId, request: &RtpThresholdRequest) {
            self.calls.lock().push((call_id, *request));
        }
    }

    #[derive(Default)]
    struct FakeDataStatus {
        connected: Mutex<HashSet<ApnType>>,
    }

    impl FakeDataStatus {
        fn set(&self, apn: ApnType, up: bool) {
            let mut connected = self.connected.lock();
            if up {
                connected.insert(apn);
            } else {
                connected.remove(&apn);
            }
        }
    }

    impl DataConnectionStatus for FakeDataStatus {
        fn is_connected(&self, apn: ApnType) -> bool {
            self.connected.lock().contains(&apn)
        }
    }

    struct Fixture {
        aggregator: CallStateAggregator,
        controller: Arc<RecordingController>,
        data: Arc<FakeDataStatus>,
    }

    fn fixture() -> Fixture {
        let controller = Arc::new(RecordingController::default());
        let data = Arc::new(FakeDataStatus::default());
        let aggregator = CallStateAggregator::builder(SlotIndex::new(0))
            .with_media_quality(controller.clone())
            .with_data_status(data.clone())
            .build()
            .unwrap();
        Fixture { aggregator, controller, data }
    }

    fn leg(id: u32, kind: CallKind, state: LegState) -> CallLegEvent {
        CallLegEvent::new(CallId::new(id), kind, state)
    }

    fn thresholds(apn: ApnType) -> RtpThresholdRequest {
        RtpThresholdRequest {
            apn,
            thresholds: RtpThresholds {
                jitter_ms: 120,
                packet_loss_rate: 10,
                packet_loss_time_ms: 3000,
                no_rtp_interval_ms: 5000,
            },
        }
    }

    #[test]
    fn test_missing_collaborators_fail_fast() {
        let err = CallStateAggregator::builder(SlotIndex::new(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, StatusError::MissingDependency(_)));

        let err = CallStateAggregator::builder(SlotIndex::new(0))
            .with_media_quality(Arc::new(RecordingController::default()))
            .build()
            .unwrap_err();
        assert!(matches!(err, StatusError::MissingDependency("data connection status")));
    }

    #[test]
    fn test_voice_then_video_then_idle() {
        let f = fixture();
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Active));
        f.aggregator.update_call_info(leg(2, CallKind::Video, LegState::Active));
        f.aggregator.update_call_info(leg(2, CallKind::Video, LegState::Holding));
        f.aggregator.update_call_info(leg(2, CallKind::Video, LegState::Disconnected));
        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Disconnected));

        assert_eq!(
            rx.drain_results(),
            vec![CallType::Voice, CallType::Video, CallType::Voice, CallType::Idle]
        );
        assert!(f.aggregator.is_idle());
        assert_eq!(f.aggregator.active_call_count(), 0);
    }

    #[test]
    fn test_record_created_only_when_active() {
        let f = fixture();
        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Dialing));
        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Alerting));
        assert_eq!(f.aggregator.active_call_count(), 0);
        assert!(f.aggregator.is_idle());

        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Active));
        assert_eq!(f.aggregator.active_call_count(), 1);
        assert_eq!(f.aggregator.call_type(), CallType::Voice);
    }

    #[test]
    fn test_kind_upgrade_on_existing_record() {
        let f = fixture();
        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Active));
        f.aggregator.update_call_info(leg(1, CallKind::Video, LegState::Active));
        assert_eq!(f.aggregator.call_type(), CallType::Video);
    }

    #[test]
    fn test_unknown_disconnect_is_ignored() {
        let f = fixture();
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(9, CallKind::Voice, LegState::Disconnected));
        assert!(rx.try_recv().is_none());
        assert!(f.aggregator.is_idle());
    }

    #[test]
    fn test_emergency_not_added_to_legs() {
        let f = fixture();
        let (listener, rx) = Listener::channel();
        f.aggregator.register_emergency_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(5, CallKind::Emergency, LegState::Dialing));
        assert_eq!(f.aggregator.active_call_count(), 0);
        assert!(!f.aggregator.is_emergency_idle());
        // Emergency PDN state unknown to the overlay: call type untouched
        assert!(f.aggregator.is_idle());

        f.aggregator.update_call_info(leg(5, CallKind::Emergency, LegState::Disconnected));
        assert!(f.aggregator.is_emergency_idle());
        assert_eq!(rx.drain_results(), vec![CallType::Emergency, CallType::Idle]);
    }

    #[test]
    fn test_emergency_overlay_over_ims_pdn() {
        let f = fixture();
        f.data.set(ApnType::Ims, true);
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Dialing));
        assert!(f.aggregator.is_emergency_overlay_active());
        assert_eq!(f.aggregator.call_type(), CallType::Emergency);

        // A normal leg does not override the overlay
        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Active));
        assert_eq!(f.aggregator.call_type(), CallType::Emergency);

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Disconnected));
        assert!(!f.aggregator.is_emergency_overlay_active());
        assert_eq!(
            rx.drain_results(),
            vec![CallType::Emergency, CallType::Voice]
        );
    }

    #[test]
    fn test_video_leg_held_back_during_overlay() {
        let f = fixture();
        f.data.set(ApnType::Ims, true);
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Active));
        f.aggregator.update_call_info(leg(2, CallKind::Video, LegState::Active));
        assert_eq!(rx.drain_results(), vec![CallType::Emergency]);
        assert_eq!(f.aggregator.active_call_count(), 1);

        // The video leg surfaces only once the emergency call ends
        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Disconnected));
        assert_eq!(rx.drain_results(), vec![CallType::Video]);
        assert_eq!(f.aggregator.call_type(), CallType::Video);
    }

    #[test]
    fn test_overlay_reverts_to_idle() {
        let f = fixture();
        f.data.set(ApnType::Ims, true);
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Active));
        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Disconnected));
        assert_eq!(rx.drain_results(), vec![CallType::Emergency, CallType::Idle]);
    }

    #[test]
    fn test_no_overlay_when_emergency_pdn_connected() {
        let f = fixture();
        f.data.set(ApnType::Ims, true);
        f.data.set(ApnType::Emergency, true);

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Active));
        assert!(!f.aggregator.is_emergency_overlay_active());
        assert!(f.aggregator.is_idle());
    }

    #[test]
    fn test_rtp_low_quality_routing() {
        let f = fixture();
        let (ims, ims_rx) = Listener::channel();
        let (sos, sos_rx) = Listener::channel();
        f.aggregator
            .register_low_rtp_quality(ApnType::Ims.raw(), ims, Tag(1))
            .unwrap();
        f.aggregator
            .register_low_rtp_quality(ApnType::Emergency.raw(), sos, Tag(2))
            .unwrap();

        f.aggregator
            .notify_rtp_low_quality(CallType::Video, RtpLowQualityReason::Jitter);
        f.aggregator
            .notify_rtp_low_quality(CallType::Emergency, RtpLowQualityReason::NoRtp);
        f.aggregator
            .notify_rtp_low_quality(CallType::Idle, RtpLowQualityReason::PacketLoss);

        let ims: Vec<_> = ims_rx.drain_results();
        let sos: Vec<_> = sos_rx.drain_results();
        assert_eq!(ims.len(), 1);
        assert_eq!(ims[0].call_type, CallType::Video);
        assert_eq!(sos.len(), 1);
        assert_eq!(sos[0].reason, RtpLowQualityReason::NoRtp);
    }

    #[test]
    fn test_emergency_degradation_echoed_during_overlay() {
        let f = fixture();
        f.data.set(ApnType::Ims, true);
        let (ims, ims_rx) = Listener::channel();
        f.aggregator
            .register_low_rtp_quality(ApnType::Ims.raw(), ims, Tag(1))
            .unwrap();

        f.aggregator.update_call_info(leg(7, CallKind::Emergency, LegState::Active));
        f.aggregator
            .notify_rtp_low_quality(CallType::Emergency, RtpLowQualityReason::PacketLoss);
        assert_eq!(ims_rx.drain_results().len(), 1);
    }

    #[test]
    fn test_low_rtp_registration_rejects_other_classes() {
        let f = fixture();
        let (listener, rx) = Listener::channel();
        let id = rx.id();
        let err = f
            .aggregator
            .register_low_rtp_quality(ApnType::Mms.raw(), listener, Tag(0))
            .unwrap_err();
        assert!(matches!(err, StatusError::InvalidTrafficClass(2)));
        assert!(f.aggregator.unregister_low_rtp_quality(0xdead, id).is_err());
    }

    #[test]
    fn test_threshold_request_stored_until_call_active() {
        let f = fixture();
        f.aggregator.request_rtp_threshold(thresholds(ApnType::Ims)).unwrap();
        assert!(f.controller.calls.lock().is_empty());

        f.aggregator.update_call_info(leg(3, CallKind::Voice, LegState::Active));
        let calls = f.controller.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, CallId::new(3));
        assert_eq!(calls[0].1.thresholds.jitter_ms, 120);
    }

    #[test]
    fn test_threshold_request_applied_to_active_call() {
        let f = fixture();
        f.aggregator.update_call_info(leg(4, CallKind::Voice, LegState::Active));
        f.aggregator.request_rtp_threshold(thresholds(ApnType::Ims)).unwrap();
        assert_eq!(f.controller.calls.lock().len(), 1);
    }

    #[test]
    fn test_threshold_request_rejects_non_media_class() {
        let f = fixture();
        let err = f
            .aggregator
            .request_rtp_threshold(thresholds(ApnType::Xcap))
            .unwrap_err();
        assert!(matches!(err, StatusError::InvalidTrafficClass(_)));
    }

    #[test]
    fn test_preferred_transport_and_wfc_replay() {
        let f = fixture();
        f.aggregator.report_emergency_preferred_transport(Transport::Wlan);
        f.aggregator.report_try_wfc_connection_state(true);
        f.aggregator.report_try_wfc_connection_state(true);

        let (transport, transport_rx) = Listener::channel();
        f.aggregator
            .register_emergency_preferred_transport_changed(transport, Tag(0));
        let (wfc, wfc_rx) = Listener::channel();
        f.aggregator.register_try_wfc_connection_state(wfc, Tag(0));

        assert_eq!(
            transport_rx.drain_results(),
            vec![EmergencyPreferredTransport(Transport::Wlan)]
        );
        assert_eq!(wfc_rx.drain_results(), vec![TryWfcConnectionState(true)]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let f = fixture();
        let (listener, rx) = Listener::channel();
        f.aggregator.register_call_type_changed(listener, Tag(0));

        f.aggregator.close();
        f.aggregator.close();
        assert!(f.aggregator.is_closed());

        f.aggregator.update_call_info(leg(1, CallKind::Voice, LegState::Active));
        assert!(rx.try_recv().is_none());
    }
}
