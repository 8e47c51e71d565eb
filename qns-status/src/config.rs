//! Carrier and subscription configuration reads
//!
//! Aggregators never cache configuration; they pull the current value from a
//! `ConfigSource` every time they evaluate. `StaticConfig` is the in-process
//! implementation, loadable from JSON and adjustable at runtime.
//!
//! ```json
//! {
//!   "default_data_subscription": 1,
//!   "slots": [
//!     { "slot": 0, "subscription_id": 1 },
//!     { "slot": 1, "subscription_id": 2, "cross_sim_calling_enabled": true,
//!       "block_ipv6_only_wifi": true }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusError};
use crate::model::{SlotIndex, SubscriptionId};

/// Read-only, pull-based configuration consumed by the aggregators
pub trait ConfigSource: Send + Sync {
    /// Carrier policy: treat IPv6-only Wi-Fi as unusable for IWLAN
    fn block_ipv6_only_wifi(&self, slot: SlotIndex) -> bool;

    /// Whether cross-SIM calling is enabled for the slot
    fn is_cross_sim_calling_enabled(&self, slot: SlotIndex) -> bool;

    /// Subscription currently used for default data
    fn default_data_subscription(&self) -> Option<SubscriptionId>;

    /// Subscription active in the slot, if any
    fn subscription_id(&self, slot: SlotIndex) -> Option<SubscriptionId>;
}

/// Configuration of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub slot: SlotIndex,
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
    #[serde(default)]
    pub block_ipv6_only_wifi: bool,
    #[serde(default)]
    pub cross_sim_calling_enabled: bool,
}

impl SlotConfig {
    pub fn new(slot: SlotIndex, subscription_id: Option<SubscriptionId>) -> Self {
        Self {
            slot,
            subscription_id,
            block_ipv6_only_wifi: false,
            cross_sim_calling_enabled: false,
        }
    }
}

/// Serializable configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub default_data_subscription: Option<SubscriptionId>,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

impl ConfigSnapshot {
    /// Reject documents that configure the same slot twice
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.slot) {
                return Err(StatusError::Config(format!(
                    "{} is configured more than once",
                    slot.slot
                )));
            }
        }
        Ok(())
    }

    fn slot(&self, slot: SlotIndex) -> Option<&SlotConfig> {
        self.slots.iter().find(|s| s.slot == slot)
    }
}

/// In-process configuration source
#[derive(Debug, Default)]
pub struct StaticConfig {
    inner: RwLock<ConfigSnapshot>,
}

impl StaticConfig {
    pub fn new(snapshot: ConfigSnapshot) -> Result<Self> {
        snapshot.validate()?;
        Ok(Self {
            inner: RwLock::new(snapshot),
        })
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: ConfigSnapshot = serde_json::from_str(json)?;
        Self::new(snapshot)
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.inner.read().clone()
    }

    pub fn set_default_data_subscription(&self, subscription: Option<SubscriptionId>) {
        tracing::debug!(?subscription, "default data subscription updated");
        self.inner.write().default_data_subscription = subscription;
    }

    /// Insert or replace the configuration of one slot
    pub fn set_slot(&self, config: SlotConfig) {
        let mut inner = self.inner.write();
        tracing::debug!(slot = %config.slot, ?config, "slot configuration updated");
        match inner.slots.iter_mut().find(|s| s.slot == config.slot) {
            Some(existing) => *existing = config,
            None => inner.slots.push(config),
        }
    }

    pub fn set_cross_sim_calling_enabled(&self, slot: SlotIndex, enabled: bool) {
        self.update_slot(slot, |s| s.cross_sim_calling_enabled = enabled);
    }

    pub fn set_block_ipv6_only_wifi(&self, slot: SlotIndex, block: bool) {
        self.update_slot(slot, |s| s.block_ipv6_only_wifi = block);
    }

    fn update_slot(&self, slot: SlotIndex, f: impl FnOnce(&mut SlotConfig)) {
        let mut inner = self.inner.write();
        match inner.slots.iter_mut().find(|s| s.slot == slot) {
            Some(existing) => f(existing),
            None => {
                let mut config = SlotConfig::new(slot, None);
                f(&mut config);
                inner.slots.push(config);
            }
        }
    }
}

impl ConfigSource for StaticConfig {
    fn block_ipv6_only_wifi(&self, slot: SlotIndex) -> bool {
        self.inner
            .read()
            .slot(slot)
            .map_or(false, |s| s.block_ipv6_only_wifi)
    }

    fn is_cross_sim_calling_enabled(&self, slot: SlotIndex) -> bool {
        self.inner
            .read()
            .slot(slot)
            .map_or(false, |s| s.cross_sim_calling_enabled)
    }

    fn default_data_subscription(&self) -> Option<SubscriptionId> {
        self.inner.read().default_data_subscription
    }

    fn subscription_id(&self, slot: SlotIndex) -> Option<SubscriptionId> {
        self.inner.read().slot(slot).and_then(|s| s.subscription_id)
    }
}
