//! Link status and scan result types.

use std::fmt;
use std::net::Ipv4Addr;

/// Wireless link state. Exactly one value at a time, owned by the Link Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Failed,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Scanning => "Scanning",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network authentication scheme reported by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wep,
    Wpa,
    Wpa2,
    WpaWpa2,
    Wpa2Enterprise,
    Wpa3,
    Wpa2Wpa3,
    Unknown,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA",
            Self::Wpa2 => "WPA2",
            Self::WpaWpa2 => "WPA/WPA2",
            Self::Wpa2Enterprise => "WPA2-Enterprise",
            Self::Wpa3 => "WPA3",
            Self::Wpa2Wpa3 => "WPA2/WPA3",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network seen by a scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNetwork {
    /// Network identifier, at most 32 bytes. Empty for hidden networks.
    pub identifier: String,
    /// Received signal strength in dBm.
    pub signal_level: i32,
    pub auth_mode: AuthMode,
    pub hidden: bool,
}

impl LinkNetwork {
    pub fn new(identifier: impl Into<String>, signal_level: i32, auth_mode: AuthMode) -> Self {
        let identifier = identifier.into();
        let hidden = identifier.is_empty();
        Self {
            identifier,
            signal_level,
            auth_mode,
            hidden,
        }
    }

    /// Signal strength in bars, see [`signal_bars`].
    pub fn bars(&self) -> u8 {
        signal_bars(self.signal_level)
    }
}

/// Map a signal level in dBm to 0..=4 bars.
pub fn signal_bars(signal_level: i32) -> u8 {
    match signal_level {
        l if l >= -50 => 4,
        l if l >= -60 => 3,
        l if l >= -70 => 2,
        l if l >= -80 => 1,
        _ => 0,
    }
}

/// Point-in-time view of the link, handed to the Session Manager each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub status: LinkStatus,
    pub identifier: Option<String>,
    pub signal_level: i32,
    pub address: Option<Ipv4Addr>,
}

impl LinkSnapshot {
    /// A link that is down.
    pub fn down(status: LinkStatus) -> Self {
        Self {
            status,
            identifier: None,
            signal_level: 0,
            address: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == LinkStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bars() {
        assert_eq!(signal_bars(-40), 4);
        assert_eq!(signal_bars(-50), 4);
        assert_eq!(signal_bars(-55), 3);
        assert_eq!(signal_bars(-70), 2);
        assert_eq!(signal_bars(-80), 1);
        assert_eq!(signal_bars(-81), 0);
    }

    #[test]
    fn test_hidden_network() {
        assert!(LinkNetwork::new("", -60, AuthMode::Wpa2).hidden);
        assert!(!LinkNetwork::new("HomeNet", -60, AuthMode::Wpa2).hidden);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(LinkStatus::Connected.to_string(), "Connected");
        assert_eq!(AuthMode::WpaWpa2.as_str(), "WPA/WPA2");
    }
}
