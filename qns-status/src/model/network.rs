//! Default-network callbacks and the IWLAN availability tuple

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use state_store::Status;

use super::id_types::{NetworkId, SubscriptionId};

/// Transport kind of the system default network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkTransport {
    Wifi,
    Cellular,
    Other,
}

/// IP families present on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkProtocol {
    #[default]
    Unknown,
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl LinkProtocol {
    /// Classify a link from its addresses
    ///
    /// Loopback addresses never count; IPv6 only counts when the address is
    /// globally routable (link-local and unique-local are ignored).
    pub fn from_addresses(addresses: &[IpAddr]) -> Self {
        let has_v4 = addresses
            .iter()
            .any(|a| matches!(a, IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified()));
        let has_v6 = addresses.iter().any(|a| match a {
            IpAddr::V6(v6) => {
                let first = v6.segments()[0];
                !v6.is_loopback()
                    && !v6.is_unspecified()
                    && (first & 0xffc0) != 0xfe80
                    && (first & 0xfe00) != 0xfc00
            }
            IpAddr::V4(_) => false,
        });

        match (has_v4, has_v6) {
            (true, true) => LinkProtocol::Ipv4v6,
            (true, false) => LinkProtocol::Ipv4,
            (false, true) => LinkProtocol::Ipv6,
            (false, false) => LinkProtocol::Unknown,
        }
    }

    /// No usable IPv4 on the link
    pub fn lacks_ipv4(&self) -> bool {
        matches!(self, LinkProtocol::Unknown | LinkProtocol::Ipv6)
    }
}

/// Default-network callback from the connectivity stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultNetworkEvent {
    Available {
        network: NetworkId,
        transport: NetworkTransport,
        /// Owning subscription, for cellular networks
        subscription: Option<SubscriptionId>,
    },
    CapabilitiesChanged {
        network: NetworkId,
        transport: NetworkTransport,
        subscription: Option<SubscriptionId>,
    },
    LinkPropertiesChanged {
        network: NetworkId,
        addresses: Vec<IpAddr>,
    },
    Lost {
        network: NetworkId,
    },
}

/// Per-slot IWLAN availability tuple
///
/// Equality is structural over all three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AvailabilityInfo {
    pub is_available: bool,
    pub is_cross_sim_wifi_calling: bool,
    /// One-shot edge raised when availability was lost abruptly
    pub notify_disabled: bool,
}

impl AvailabilityInfo {
    pub const UNAVAILABLE: AvailabilityInfo = AvailabilityInfo {
        is_available: false,
        is_cross_sim_wifi_calling: false,
        notify_disabled: false,
    };

    pub fn available(cross_sim: bool) -> Self {
        Self {
            is_available: true,
            is_cross_sim_wifi_calling: cross_sim,
            notify_disabled: false,
        }
    }

    /// Same tuple with the disabled edge raised
    pub fn with_disabled_edge(self) -> Self {
        Self {
            notify_disabled: true,
            ..self
        }
    }

    /// Same tuple with the disabled edge cleared
    pub fn settled(self) -> Self {
        Self {
            notify_disabled: false,
            ..self
        }
    }
}

impl Status for AvailabilityInfo {
    const KEY: &'static str = "iwlan_availability";
}
