use thiserror::Error;

/// Errors raised by the sequential dispatch context
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The executor was shut down; nothing more can be queued
    #[error("Executor '{0}' has been shut down")]
    Closed(String),

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
