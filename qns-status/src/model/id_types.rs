//! Identity types for slots, subscriptions, calls and networks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate common numeric ID type implementations
macro_rules! impl_id_type {
    ($name:ident, $inner:ty, $prefix:literal) => {
        impl $name {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                $name(value)
            }
        }
    };
}

/// Physical SIM slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotIndex(u8);

impl_id_type!(SlotIndex, u8, "slot");

/// Subscription id owned by a slot (or by a cellular network)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(i32);

impl_id_type!(SubscriptionId, i32, "sub");

/// Call leg identifier reported by the call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u32);

impl_id_type!(CallId, u32, "call");

/// Opaque handle of a network reported by the connectivity stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(u64);

impl_id_type!(NetworkId, u64, "net");
