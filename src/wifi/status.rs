//! Link status reported by the radio and the outcome of a join attempt.

use std::fmt;

/// Station link status as sampled from the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Associated and holding an address.
    Connected,
    /// No usable WiFi hardware.
    NoAdapter,
    /// The SSID is not in range.
    NoSuchNetwork,
    /// Authentication or association was refused.
    ConnectFailed,
    /// Link dropped after it had been up.
    ConnectionLost,
    /// Not associated; negotiation may still be running.
    Disconnected,
    /// Any state the driver does not map.
    Unknown,
}

impl LinkStatus {
    /// Map a terminal status to its outcome.
    ///
    /// `Disconnected` and `Unknown` are transient and return `None`.
    pub fn outcome(self) -> Option<ConnectionOutcome> {
        match self {
            Self::Connected => Some(ConnectionOutcome::Joined),
            Self::NoAdapter => Some(ConnectionOutcome::NoAdapter),
            Self::NoSuchNetwork => Some(ConnectionOutcome::NoSuchNetwork),
            Self::ConnectFailed => Some(ConnectionOutcome::AuthRejected),
            Self::ConnectionLost => Some(ConnectionOutcome::LinkLost),
            Self::Disconnected | Self::Unknown => None,
        }
    }
}

/// Result of one join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Joined the network.
    Joined,
    /// No usable WiFi hardware.
    NoAdapter,
    /// The SSID is not in range.
    NoSuchNetwork,
    /// Wrong password or association refused.
    AuthRejected,
    /// Link came up and dropped again.
    LinkLost,
    /// No terminal status within the wait bound.
    TimedOut,
}

impl ConnectionOutcome {
    /// Check if the attempt joined the network.
    pub fn is_joined(self) -> bool {
        self == Self::Joined
    }

    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::NoAdapter => "no adapter",
            Self::NoSuchNetwork => "no such network",
            Self::AuthRejected => "authentication rejected",
            Self::LinkLost => "link lost",
            Self::TimedOut => "timed out",
        }
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ESP-IDF `wifi_err_reason_t` values used for classification.
pub mod reason {
    pub const AUTH_EXPIRE: u16 = 2;
    pub const ASSOC_LEAVE: u16 = 8;
    pub const FOURWAY_HANDSHAKE_TIMEOUT: u16 = 15;
    pub const BEACON_TIMEOUT: u16 = 200;
    pub const NO_AP_FOUND: u16 = 201;
    pub const AUTH_FAIL: u16 = 202;
    pub const ASSOC_FAIL: u16 = 203;
    pub const HANDSHAKE_TIMEOUT: u16 = 204;
    pub const CONNECTION_FAIL: u16 = 205;
}

/// Classify a station disconnect event.
///
/// Once the link has been up every disconnect counts as lost. Before that,
/// reasons that cannot resolve by waiting are terminal; anything else is
/// treated as still negotiating.
pub fn classify_disconnect_reason(code: u16, was_connected: bool) -> LinkStatus {
    if was_connected {
        return LinkStatus::ConnectionLost;
    }
    match code {
        reason::NO_AP_FOUND => LinkStatus::NoSuchNetwork,
        reason::AUTH_EXPIRE
        | reason::FOURWAY_HANDSHAKE_TIMEOUT
        | reason::AUTH_FAIL
        | reason::ASSOC_FAIL
        | reason::HANDSHAKE_TIMEOUT
        | reason::CONNECTION_FAIL => LinkStatus::ConnectFailed,
        _ => LinkStatus::Disconnected,
    }
}
