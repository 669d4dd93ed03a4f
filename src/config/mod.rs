//! Device configuration.
//!
//! # Components
//!
//! - [`wifi`] - credential and access point types, password policy
//!   (host-testable)
//!
//! Runtime tunables for the connection attempt, the portal and the
//! provisioner live next to the code they configure
//! ([`AttemptConfig`](crate::wifi::AttemptConfig),
//! [`PortalConfig`](crate::portal::PortalConfig),
//! [`ProvisionerConfig`](crate::provisioner::ProvisionerConfig)).

mod wifi;

pub use wifi::{
    chip_id_from_mac, coerce_password, default_ap_ssid, AccessPointConfig, ConfigError,
    Credential, DEFAULT_AP_CHANNEL, DEFAULT_AP_PREFIX, MAX_PASSWORD_LEN, MAX_SSID_LEN,
    MIN_PASSWORD_LEN, PASSWORD_PLACEHOLDER,
};
