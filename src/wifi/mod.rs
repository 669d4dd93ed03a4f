//! WiFi radio abstraction and join attempts.
//!
//! # Components
//!
//! - [`status`] - link status and attempt outcome types
//! - [`attempt`] - bounded join attempt state machine
//! - [`sim`] - simulated radio for host builds and tests
//! - `esp32` - ESP-IDF radio driver (ESP32 only)
//!
//! The radio is split into two traits: [`Station`] for joining networks and
//! [`AccessPoint`] for the fallback AP. On the device one driver implements
//! both, since station and AP share the same hardware.

mod attempt;
#[cfg(feature = "esp32")]
mod esp32;
mod sim;
mod status;

pub use attempt::{
    attempt, AttemptConfig, ConnectionAttempt, CONNECTION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL,
};
#[cfg(feature = "esp32")]
pub use esp32::{EspRadio, EspRestart};
pub use sim::SimulatedRadio;
pub use status::{classify_disconnect_reason, reason, ConnectionOutcome, LinkStatus};

use crate::config::AccessPointConfig;
use std::fmt;
use std::net::Ipv4Addr;

/// Station side of the radio.
pub trait Station {
    /// Start joining a network. Returns as soon as the request is issued.
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// Sample the current link status.
    fn status(&mut self) -> LinkStatus;

    /// Drop the current association or abort a pending join.
    fn disconnect(&mut self) -> Result<(), RadioError>;
}

/// Access point side of the radio.
pub trait AccessPoint {
    /// Bring up the access point and return its own address.
    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<Ipv4Addr, RadioError>;

    /// Shut the access point down. Stopping a stopped AP succeeds.
    fn stop_access_point(&mut self) -> Result<(), RadioError>;

    /// Address of the running access point.
    fn own_address(&self) -> Option<Ipv4Addr>;
}

/// Errors that can occur during radio operations.
#[derive(Debug)]
pub enum RadioError {
    /// SSID does not fit the driver configuration.
    InvalidSsid,
    /// Password does not fit the driver configuration.
    InvalidPassword,
    /// Radio cannot perform the request.
    Unavailable(String),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::Unavailable(msg) => write!(f, "radio unavailable: {}", msg),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for RadioError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
