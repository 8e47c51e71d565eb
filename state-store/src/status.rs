//! Status trait for typed, change-gated values
//!
//! The Status trait defines the contract for values that can be cached,
//! compared for changes and broadcast through a `ChangeNotifier`.
//!
//! # Example
//!
//! ```rust
//! use state_store::Status;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! pub struct SignalBars(pub u8);
//!
//! impl Status for SignalBars {
//!     const KEY: &'static str = "signal_bars";
//! }
//! ```

use std::fmt::Debug;

/// Marker trait for status values that can be cached and broadcast
///
/// Status values must be:
/// - Clone: each subscriber receives its own copy
/// - Send + Sync: producers and consumers live on different threads
/// - PartialEq: for change detection (only forward real changes)
/// - Debug: every accepted change is traced
///
/// The KEY constant identifies the status stream in logs.
pub trait Status: Clone + Send + Sync + PartialEq + Debug + 'static {
    /// Unique key identifying this status type
    ///
    /// # Examples
    ///
    /// - `"call_type"` for the aggregate call type
    /// - `"iwlan_availability"` for the per-slot availability tuple
    const KEY: &'static str;
}
