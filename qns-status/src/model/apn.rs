//! Traffic classes and access transports

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic class (APN type) qualified independently for a transport
///
/// Raw values follow the telephony APN type bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApnType {
    Mms,
    Ims,
    Emergency,
    Xcap,
}

impl ApnType {
    /// Every traffic class the status feed tracks
    pub const ALL: [ApnType; 4] = [ApnType::Mms, ApnType::Ims, ApnType::Emergency, ApnType::Xcap];

    pub const fn raw(self) -> u32 {
        match self {
            ApnType::Mms => 1 << 1,
            ApnType::Ims => 1 << 6,
            ApnType::Emergency => 1 << 9,
            ApnType::Xcap => 1 << 11,
        }
    }

    /// Map a raw identifier back to a traffic class
    ///
    /// Returns `None` for unsupported or combined bitmask values.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|apn| apn.raw() == raw)
    }

    /// Whether RTP quality monitoring applies to this class
    pub fn carries_rtp(self) -> bool {
        matches!(self, ApnType::Ims | ApnType::Emergency)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApnType::Mms => "mms",
            ApnType::Ims => "ims",
            ApnType::Emergency => "emergency",
            ApnType::Xcap => "xcap",
        }
    }
}

impl fmt::Display for ApnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access transport carrying a data connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Transport {
    /// Cellular access path
    Wwan,
    /// Wi-Fi access path
    Wlan,
    #[default]
    Invalid,
}

impl Transport {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Transport::Invalid)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transport::Wwan => "WWAN",
            Transport::Wlan => "WLAN",
            Transport::Invalid => "INVALID",
        };
        f.write_str(name)
    }
}
