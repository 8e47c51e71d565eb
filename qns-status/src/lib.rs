//! QNS Status Feed
//!
//! Status aggregation for access network selection: turns raw, loosely
//! ordered radio and network signals into de-duplicated per-slot status
//! notifications for a transport-qualification engine.
//!
//! # Features
//!
//! - **Call State**: concurrent call legs collapsed into one call type, with
//!   the emergency call tracked separately and RTP threshold push-down
//! - **Data Connections**: per-APN state machine classifying raw reports
//!   into start/connect/fail/disconnect and handover events
//! - **IWLAN Availability**: default network, IWLAN registration and
//!   cross-SIM calling combined into one availability tuple per slot
//! - **IMS Registration**: upstream subscription held only while someone listens
//!
//! # Architecture
//!
//! ```text
//! radio / network callbacks
//!        │ post_*()
//!        ▼
//! ProviderRegistry ──> SlotProvider (one SerialExecutor per slot)
//!                          │
//!                          ├── CallStateAggregator ──> call type, low RTP quality
//!                          ├── DataConnectionTracker ──> data connection events
//!                          ├── ImsRegistrationTracker ──> IMS registration
//!                          └── IwlanAvailabilityTracker ──> availability
//!                                                        │
//!                                                        ▼
//!                                             NotificationReceiver<T>
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use qns_status::prelude::*;
//!
//! let registry = ProviderRegistry::new(ProviderOptions::default(), collaborators)?;
//! let slot0 = registry.provider(SlotIndex::new(0))?;
//!
//! let (listener, rx) = Listener::channel();
//! slot0.call_state().register_call_type_changed(listener, Tag(1));
//!
//! slot0.post_call_info(CallLegEvent::new(CallId::new(1), CallKind::Voice, LegState::Active))?;
//! slot0.flush()?;
//!
//! for notification in rx.try_iter() {
//!     println!("call type: {:?}", notification.result);
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

// Aggregators
pub mod call_state;
pub mod data_connection;
pub mod ims_registration;
pub mod iwlan;

// Composition
pub mod provider;

// Re-exports - Public API
pub use call_state::{CallStateAggregator, CallStateAggregatorBuilder, MediaQualityController};
pub use config::{ConfigSnapshot, ConfigSource, SlotConfig, StaticConfig};
pub use data_connection::{
    transition, DataConnectionStateMachine, DataConnectionStatus, DataConnectionTracker,
};
pub use error::{Result, StatusError};
pub use ims_registration::{ImsRegistrationSource, ImsRegistrationTracker};
pub use iwlan::IwlanAvailabilityTracker;
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use provider::{Collaborators, ProviderOptions, ProviderRegistry, SlotProvider};

pub use model::{
    ApnType, AvailabilityInfo, CallId, CallKind, CallLegEvent, CallType, ConnectionState,
    DataConnectionChangedInfo, DataConnectionEvent, DataConnectionReport, DefaultNetworkEvent,
    EmergencyPreferredTransport, ImsRegistrationInfo, ImsRegistrationState, LegState,
    LinkProtocol, LowLevelDataState, NetworkId, NetworkTransport, RtpLowQuality,
    RtpLowQualityReason, RtpThresholdRequest, RtpThresholds, SlotIndex, SubscriptionId,
    Transport, TryWfcConnectionState,
};

// Consumer-side types from the notification layer
pub use state_store::{ConsumerId, Listener, Notification, NotificationReceiver, Tag};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::call_state::{CallStateAggregator, MediaQualityController};
    pub use crate::config::{ConfigSource, StaticConfig};
    pub use crate::data_connection::{DataConnectionStatus, DataConnectionTracker};
    pub use crate::error::{Result, StatusError};
    pub use crate::ims_registration::ImsRegistrationSource;
    pub use crate::model::*;
    pub use crate::provider::{Collaborators, ProviderOptions, ProviderRegistry, SlotProvider};
    pub use state_store::{Listener, NotificationReceiver, Tag};
}
