//! Slot providers and the registry that owns them
//!
//! A `SlotProvider` bundles the aggregators of one SIM slot behind a single
//! `SerialExecutor`: every inbound event for the slot is posted to it and
//! applied in arrival order. The `ProviderRegistry` is created by the
//! composition root and hands out providers by slot index; default-network
//! callbacks, which concern every slot, go through its own executor.
//!
//! ```text
//! ProviderRegistry
//!     ├── network executor ──> IwlanAvailabilityTracker (shared)
//!     └── DashMap<SlotIndex, Arc<SlotProvider>>
//!             └── SlotProvider
//!                     ├── executor (one worker thread)
//!                     ├── CallStateAggregator ──reads──> DataConnectionTracker
//!                     ├── DataConnectionTracker
//!                     └── ImsRegistrationTracker
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use state_store::SerialExecutor;

use crate::call_state::{CallStateAggregator, MediaQualityController};
use crate::config::ConfigSource;
use crate::data_connection::DataConnectionTracker;
use crate::error::{Result, StatusError};
use crate::ims_registration::{ImsRegistrationSource, ImsRegistrationTracker};
use crate::iwlan::IwlanAvailabilityTracker;
use crate::model::{
    CallLegEvent, CallType, DataConnectionReport, DefaultNetworkEvent, ImsRegistrationInfo,
    RtpLowQualityReason, RtpThresholdRequest, SlotIndex, Transport,
};

// ============================================================================
// Options and collaborators
// ============================================================================

/// Registry construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Number of SIM slots; valid slot indices are `0..slot_count`
    pub slot_count: u8,
    /// Prefix of every worker thread name
    pub thread_name_prefix: String,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            slot_count: 2,
            thread_name_prefix: "qns".to_string(),
        }
    }
}

impl ProviderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(StatusError::Config("slot_count must be at least 1".to_string()));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(StatusError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// External systems the aggregators talk to
#[derive(Clone)]
pub struct Collaborators {
    pub config: Arc<dyn ConfigSource>,
    pub media_quality: Arc<dyn MediaQualityController>,
    pub ims_registration: Arc<dyn ImsRegistrationSource>,
}

// ============================================================================
// SlotProvider
// ============================================================================

/// Aggregators of one slot and their sequential context
pub struct SlotProvider {
    slot: SlotIndex,
    executor: SerialExecutor,
    call_state: Arc<CallStateAggregator>,
    data_connections: Arc<DataConnectionTracker>,
    ims_registration: Arc<ImsRegistrationTracker>,
    iwlan: Arc<IwlanAvailabilityTracker>,
    closed: AtomicBool,
}

impl SlotProvider {
    fn open(
        slot: SlotIndex,
        options: &ProviderOptions,
        collaborators: &Collaborators,
        iwlan: Arc<IwlanAvailabilityTracker>,
    ) -> Result<Self> {
        let executor =
            SerialExecutor::spawn(format!("{}-slot{}", options.thread_name_prefix, slot.value()))?;

        let data_connections = Arc::new(DataConnectionTracker::new(slot));
        let call_state = CallStateAggregator::builder(slot)
            .with_media_quality(Arc::clone(&collaborators.media_quality))
            .with_data_status(data_connections.clone())
            .build()?;
        let ims_registration = ImsRegistrationTracker::new(
            slot,
            Arc::clone(&collaborators.ims_registration),
        );

        tracing::info!(%slot, executor = executor.name(), "slot provider opened");

        Ok(Self {
            slot,
            executor,
            call_state: Arc::new(call_state),
            data_connections,
            ims_registration: Arc::new(ims_registration),
            iwlan,
            closed: AtomicBool::new(false),
        })
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn call_state(&self) -> &Arc<CallStateAggregator> {
        &self.call_state
    }

    pub fn data_connections(&self) -> &Arc<DataConnectionTracker> {
        &self.data_connections
    }

    pub fn ims_registration(&self) -> &Arc<ImsRegistrationTracker> {
        &self.ims_registration
    }

    pub fn iwlan(&self) -> &Arc<IwlanAvailabilityTracker> {
        &self.iwlan
    }

    // ------------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------------

    pub fn post_call_info(&self, event: CallLegEvent) -> Result<()> {
        let calls = Arc::clone(&self.call_state);
        self.post(move || calls.update_call_info(event))
    }

    pub fn post_data_connection_report(&self, report: DataConnectionReport) -> Result<()> {
        let data = Arc::clone(&self.data_connections);
        self.post(move || {
            data.on_report(report);
        })
    }

    pub fn post_rtp_low_quality(&self, call_type: CallType, reason: RtpLowQualityReason) -> Result<()> {
        let calls = Arc::clone(&self.call_state);
        self.post(move || calls.notify_rtp_low_quality(call_type, reason))
    }

    /// Validate and queue an RTP threshold push-down
    pub fn post_rtp_threshold_request(&self, request: RtpThresholdRequest) -> Result<()> {
        request.validate(self.slot)?;
        let calls = Arc::clone(&self.call_state);
        let slot = self.slot;
        self.post(move || {
            if let Err(e) = calls.request_rtp_threshold(request) {
                tracing::warn!(%slot, error = %e, "RTP threshold request failed");
            }
        })
    }

    pub fn post_emergency_preferred_transport(&self, transport: Transport) -> Result<()> {
        let calls = Arc::clone(&self.call_state);
        self.post(move || calls.report_emergency_preferred_transport(transport))
    }

    pub fn post_try_wfc_connection_state(&self, trying: bool) -> Result<()> {
        let calls = Arc::clone(&self.call_state);
        self.post(move || calls.report_try_wfc_connection_state(trying))
    }

    pub fn post_ims_registration(&self, info: ImsRegistrationInfo) -> Result<()> {
        let ims = Arc::clone(&self.ims_registration);
        self.post(move || ims.on_registration_changed(info))
    }

    pub fn post_iwlan_registration(&self, registered: bool) -> Result<()> {
        let iwlan = Arc::clone(&self.iwlan);
        let slot = self.slot;
        self.post(move || iwlan.on_iwlan_registration_changed(slot, registered))
    }

    pub fn post_cross_sim_calling(&self, enabled: bool) -> Result<()> {
        let iwlan = Arc::clone(&self.iwlan);
        let slot = self.slot;
        self.post(move || iwlan.on_cross_sim_calling_changed(slot, enabled))
    }

    /// Block until every event posted so far has been applied
    pub fn flush(&self) -> Result<()> {
        self.executor
            .flush()
            .map_err(|_| StatusError::ProviderClosed(self.slot))
    }

    /// Apply queued events, then tear everything down; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.executor.shutdown();
        self.call_state.close();
        self.data_connections.close();
        self.ims_registration.close();
        self.iwlan.close_slot(self.slot);
        tracing::info!(slot = %self.slot, "slot provider closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn post<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(StatusError::ProviderClosed(self.slot));
        }
        self.executor
            .execute(job)
            .map_err(|_| StatusError::ProviderClosed(self.slot))
    }
}

impl std::fmt::Debug for SlotProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotProvider")
            .field("slot", &self.slot)
            .field("executor", &self.executor)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// ProviderRegistry
// ============================================================================

/// Owner of every slot provider
///
/// # Example
///
/// ```rust,ignore
/// let registry = ProviderRegistry::new(ProviderOptions::default(), collaborators)?;
/// let slot0 = registry.provider(SlotIndex::new(0))?;
/// slot0.post_call_info(CallLegEvent::new(CallId::new(1), CallKind::Voice, LegState::Active))?;
/// ```
pub struct ProviderRegistry {
    options: ProviderOptions,
    collaborators: Collaborators,
    providers: DashMap<SlotIndex, Arc<SlotProvider>>,
    iwlan: Arc<IwlanAvailabilityTracker>,
    network_executor: SerialExecutor,
    closed: AtomicBool,
}

impl ProviderRegistry {
    pub fn new(options: ProviderOptions, collaborators: Collaborators) -> Result<Self> {
        options.validate()?;
        let network_executor =
            SerialExecutor::spawn(format!("{}-network", options.thread_name_prefix))?;
        let iwlan = Arc::new(IwlanAvailabilityTracker::new(Arc::clone(
            &collaborators.config,
        )));

        tracing::info!(slot_count = options.slot_count, "provider registry created");

        Ok(Self {
            options,
            collaborators,
            providers: DashMap::new(),
            iwlan,
            network_executor,
            closed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Provider of a slot, opened on first use
    pub fn provider(&self, slot: SlotIndex) -> Result<Arc<SlotProvider>> {
        if slot.value() >= self.options.slot_count {
            tracing::warn!(%slot, slot_count = self.options.slot_count, "slot out of range");
            return Err(StatusError::InvalidSlot {
                slot,
                slot_count: self.options.slot_count,
            });
        }
        if self.is_closed() {
            return Err(StatusError::ProviderClosed(slot));
        }

        if let Some(provider) = self.providers.get(&slot) {
            return Ok(Arc::clone(provider.value()));
        }

        match self.providers.entry(slot) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let provider = Arc::new(SlotProvider::open(
                    slot,
                    &self.options,
                    &self.collaborators,
                    Arc::clone(&self.iwlan),
                )?);
                entry.insert(Arc::clone(&provider));
                Ok(provider)
            }
        }
    }

    /// Providers opened so far
    pub fn open_slots(&self) -> Vec<SlotIndex> {
        let mut slots: Vec<SlotIndex> = self.providers.iter().map(|e| *e.key()).collect();
        slots.sort();
        slots
    }

    pub fn iwlan(&self) -> &Arc<IwlanAvailabilityTracker> {
        &self.iwlan
    }

    /// Queue a default-network callback for every slot
    pub fn post_default_network_event(&self, event: DefaultNetworkEvent) -> Result<()> {
        let iwlan = Arc::clone(&self.iwlan);
        self.network_executor
            .execute(move || iwlan.on_default_network_event(event))?;
        Ok(())
    }

    /// Queue a re-read of carrier and subscription configuration
    pub fn post_configuration_changed(&self) -> Result<()> {
        let iwlan = Arc::clone(&self.iwlan);
        self.network_executor
            .execute(move || iwlan.on_configuration_changed())?;
        Ok(())
    }

    /// Block until every queued event, on every executor, has been applied
    pub fn flush(&self) -> Result<()> {
        self.network_executor.flush()?;
        let providers: Vec<Arc<SlotProvider>> =
            self.providers.iter().map(|e| Arc::clone(e.value())).collect();
        for provider in providers {
            provider.flush()?;
        }
        Ok(())
    }

    /// Close one slot; the next `provider` call opens a fresh one
    pub fn close_slot(&self, slot: SlotIndex) {
        if let Some((_, provider)) = self.providers.remove(&slot) {
            provider.close();
        }
    }

    /// Close every provider; later calls are no-ops
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let providers: Vec<Arc<SlotProvider>> =
            self.providers.iter().map(|e| Arc::clone(e.value())).collect();
        self.providers.clear();
        for provider in providers {
            provider.close();
        }
        self.network_executor.shutdown();
        self.iwlan.close();
        tracing::info!("provider registry closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ProviderRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("options", &self.options)
            .field("open_slots", &self.open_slots())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::model::{CallId, CallKind, LegState, RtpThresholds};
    use state_store::{Listener, Tag};

    struct NoopMedia;

    impl MediaQualityController for NoopMedia {
        fn set_rtp_thresholds(&self, _: SlotIndex, _: CallId, _: &RtpThresholdRequest) {}
    }

    struct NoopIms;

    impl ImsRegistrationSource for NoopIms {
        fn subscribe(&self, _: SlotIndex) {}
        fn unsubscribe(&self, _: SlotIndex) {}
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            config: Arc::new(StaticConfig::default()),
            media_quality: Arc::new(NoopMedia),
            ims_registration: Arc::new(NoopIms),
        }
    }

    fn registry() -> ProviderRegistry {
        let options = ProviderOptions {
            slot_count: 2,
            thread_name_prefix: "qns-test".to_string(),
        };
        ProviderRegistry::new(options, collaborators()).unwrap()
    }

    #[test]
    fn test_options_validation() {
        let options = ProviderOptions {
            slot_count: 0,
            ..ProviderOptions::default()
        };
        assert!(matches!(
            ProviderRegistry::new(options, collaborators()),
            Err(StatusError::Config(_))
        ));
    }

    #[test]
    fn test_provider_is_shared_per_slot() {
        let registry = registry();
        let a = registry.provider(SlotIndex::new(0)).unwrap();
        let b = registry.provider(SlotIndex::new(0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.open_slots(), vec![SlotIndex::new(0)]);
    }

    #[test]
    fn test_out_of_range_slot() {
        let registry = registry();
        let err = registry.provider(SlotIndex::new(2)).unwrap_err();
        assert!(matches!(err, StatusError::InvalidSlot { slot_count: 2, .. }));
    }

    #[test]
    fn test_posted_events_apply_in_order() {
        let registry = registry();
        let provider = registry.provider(SlotIndex::new(1)).unwrap();
        let (listener, rx) = Listener::channel();
        provider
            .call_state()
            .register_call_type_changed(listener, Tag(0));

        let id = CallId::new(1);
        provider
            .post_call_info(CallLegEvent::new(id, CallKind::Voice, LegState::Active))
            .unwrap();
        provider
            .post_call_info(CallLegEvent::new(id, CallKind::Video, LegState::Active))
            .unwrap();
        provider
            .post_call_info(CallLegEvent::new(id, CallKind::Video, LegState::Disconnected))
            .unwrap();
        provider.flush().unwrap();

        assert_eq!(
            rx.drain_results(),
            vec![CallType::Voice, CallType::Video, CallType::Idle]
        );
    }

    #[test]
    fn test_threshold_request_validated_before_posting() {
        let registry = registry();
        let provider = registry.provider(SlotIndex::new(0)).unwrap();
        let request = RtpThresholdRequest {
            apn: crate::model::ApnType::Mms,
            thresholds: RtpThresholds::default(),
        };
        assert!(matches!(
            provider.post_rtp_threshold_request(request),
            Err(StatusError::InvalidTrafficClass(_))
        ));
    }

    #[test]
    fn test_close_slot_reopens_fresh_provider() {
        let registry = registry();
        let first = registry.provider(SlotIndex::new(0)).unwrap();
        registry.close_slot(SlotIndex::new(0));
        assert!(first.is_closed());
        assert!(matches!(
            first.post_try_wfc_connection_state(true),
            Err(StatusError::ProviderClosed(_))
        ));

        let second = registry.provider(SlotIndex::new(0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registry_close_is_idempotent() {
        let registry = registry();
        let provider = registry.provider(SlotIndex::new(0)).unwrap();

        registry.close();
        registry.close();
        assert!(provider.is_closed());
        assert!(matches!(
            registry.provider(SlotIndex::new(0)),
            Err(StatusError::ProviderClosed(_))
        ));
        assert!(registry.post_configuration_changed().is_err());
    }
}
