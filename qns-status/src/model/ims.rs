//! IMS registration status

use serde::{Deserialize, Serialize};
use state_store::Status;

use super::apn::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImsRegistrationState {
    #[default]
    Unregistered,
    Registering,
    Registered,
}

/// IMS registration status of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImsRegistrationInfo {
    pub state: ImsRegistrationState,
    pub transport: Transport,
    /// Reason code attached to deregistration, 0 otherwise
    pub reason: i32,
}

impl ImsRegistrationInfo {
    pub fn registered(transport: Transport) -> Self {
        Self {
            state: ImsRegistrationState::Registered,
            transport,
            reason: 0,
        }
    }

    pub fn unregistered(reason: i32) -> Self {
        Self {
            state: ImsRegistrationState::Unregistered,
            transport: Transport::Invalid,
            reason,
        }
    }
}

impl Status for ImsRegistrationInfo {
    const KEY: &'static str = "ims_registration";
}
