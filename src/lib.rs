//! WiFi provisioning library for ESP32-class devices.
//!
//! On boot the device tries each saved network in turn. If none can be
//! joined it opens an access point with a captive portal where a new network
//! can be added, then restarts to use it.
//!
//! Everything except the ESP-IDF driver glue (`esp32` feature) is
//! platform-independent and tested on the host.

pub mod config;
pub mod portal;
pub mod provisioner;
pub mod store;
pub mod wifi;

// Re-export commonly used items
pub use config::{AccessPointConfig, ConfigError, Credential};
pub use portal::{HttpPortal, PortalConfig, PortalTransport};
pub use provisioner::{
    ProvisionError, Provisioner, ProvisionerConfig, ProvisionerState, Restart, RunOutcome,
    ServeExit, ShutdownToken,
};
pub use store::{CredentialStore, FileStorage, MemoryStorage, Storage, StoreError};
pub use wifi::{AttemptConfig, ConnectionOutcome, LinkStatus, SimulatedRadio};
