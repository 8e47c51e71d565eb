//! Last-value cache with a structural equality gate
//!
//! `ChangeGate` remembers the last value that was let through and only
//! accepts a new one when it differs. It is the single place where
//! "notify on change only" is decided.
//!
//! # Example
//!
//! ```rust
//! use state_store::ChangeGate;
//!
//! let mut gate = ChangeGate::new();
//!
//! // First offer always passes
//! assert!(gate.offer(50));
//!
//! // Same value is held back
//! assert!(!gate.offer(50));
//!
//! // Different value passes
//! assert!(gate.offer(75));
//! assert_eq!(gate.current(), Some(&75));
//! ```

/// Last delivered value plus the equality check that guards it
#[derive(Debug, Clone)]
pub struct ChangeGate<T> {
    last: Option<T>,
}

impl<T: PartialEq> ChangeGate<T> {
    /// Create an empty gate
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Create a gate that treats `value` as already delivered
    pub fn with_initial(value: T) -> Self {
        Self { last: Some(value) }
    }

    /// Offer a value, returning whether it differs from the cached one
    ///
    /// The cache is only replaced when the value changed.
    pub fn offer(&mut self, value: T) -> bool {
        if self.last.as_ref() != Some(&value) {
            self.last = Some(value);
            true
        } else {
            false
        }
    }

    /// Store a value unconditionally
    pub fn force(&mut self, value: T) {
        self.last = Some(value);
    }

    /// Whether `value` would pass the gate
    pub fn would_change(&self, value: &T) -> bool {
        self.last.as_ref() != Some(value)
    }

    pub fn current(&self) -> Option<&T> {
        self.last.as_ref()
    }

    /// Forget the cached value, so the next offer passes
    pub fn reset(&mut self) -> Option<T> {
        self.last.take()
    }
}

impl<T: PartialEq> Default for ChangeGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tuple {
        available: bool,
        cross: bool,
    }

    #[test]
    fn test_gate_basic() {
        let mut gate = ChangeGate::new();
        assert!(gate.current().is_none());

        assert!(gate.offer(42));
        assert!(!gate.offer(42));
        assert!(gate.offer(99));
        assert_eq!(gate.current(), Some(&99));
    }

    #[test]
    fn test_structural_equality() {
        let mut gate = ChangeGate::new();
        assert!(gate.offer(Tuple { available: true, cross: false }));
        assert!(!gate.offer(Tuple { available: true, cross: false }));
        assert!(gate.offer(Tuple { available: true, cross: true }));
    }

    #[test]
    fn test_with_initial_suppresses_first_equal_offer() {
        let mut gate = ChangeGate::with_initial("idle");
        assert!(!gate.offer("idle"));
        assert!(gate.offer("voice"));
    }

    #[test]
    fn test_force_and_reset() {
        let mut gate = ChangeGate::new();
        gate.force(1);
        assert!(!gate.would_change(&1));
        assert_eq!(gate.reset(), Some(1));
        assert!(gate.offer(1));
    }
}
