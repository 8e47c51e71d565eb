use thiserror::Error;

use crate::model::SlotIndex;

/// Errors that can occur in the status feed
#[derive(Error, Debug)]
pub enum StatusError {
    /// Traffic-class identifier outside the supported set for this stream
    #[error("Traffic class {0:#x} is not valid for this registration")]
    InvalidTrafficClass(u32),

    /// Aggregator constructed without a required collaborator
    #[error("Missing required dependency: {0}")]
    MissingDependency(&'static str),

    /// Slot index outside the configured slot count
    #[error("Slot {slot} is out of range (slot count {slot_count})")]
    InvalidSlot { slot: SlotIndex, slot_count: u8 },

    /// Provider for the slot has been closed
    #[error("Provider for {0} has been closed")]
    ProviderClosed(SlotIndex),

    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sequential dispatch context failure
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] state_store::DispatchError),
}

impl From<serde_json::Error> for StatusError {
    fn from(err: serde_json::Error) -> Self {
        StatusError::Config(err.to_string())
    }
}

/// Result type for status feed operations
pub type Result<T> = std::result::Result<T, StatusError>;
