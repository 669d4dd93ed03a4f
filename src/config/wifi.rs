//! WiFi credential and access point configuration.
//!
//! This module contains platform-independent types for WiFi configuration
//! that can be tested on the host machine.
//!
//! # Example
//!
//! ```
//! use wifi_picker::config::{Credential, PASSWORD_PLACEHOLDER};
//!
//! let credential = Credential::new("MyNetwork", "MyPassword").unwrap();
//! assert!(!credential.is_open());
//!
//! // Short secrets are coerced rather than rejected.
//! let coerced = Credential::coerced("net", "short").unwrap();
//! assert_eq!(coerced.password(), PASSWORD_PLACEHOLDER);
//! ```

use log::warn;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Value stored in place of a non-empty password shorter than
/// [`MIN_PASSWORD_LEN`]. Existing device records rely on it.
pub const PASSWORD_PLACEHOLDER: &str = "8characters";

/// Prefix of the default access point SSID (`ESP<chip id>`).
pub const DEFAULT_AP_PREFIX: &str = "ESP";

/// Default channel for the fallback access point.
pub const DEFAULT_AP_CHANNEL: u8 = 1;

/// Apply the short-password policy.
///
/// Empty passwords (open networks) and passwords of at least
/// [`MIN_PASSWORD_LEN`] bytes pass through unchanged; anything in between is
/// replaced by [`PASSWORD_PLACEHOLDER`].
pub fn coerce_password(password: impl Into<String>) -> String {
    let password = password.into();
    if !password.is_empty() && password.len() < MIN_PASSWORD_LEN {
        warn!(
            "Password of {} chars is shorter than {}, replaced by \"{}\"",
            password.len(),
            MIN_PASSWORD_LEN,
            PASSWORD_PLACEHOLDER
        );
        let mut password = password;
        password.zeroize();
        return PASSWORD_PLACEHOLDER.to_string();
    }
    password
}

/// Saved WiFi network: SSID plus secret.
///
/// The secret is wiped from memory when the credential is dropped and is
/// never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    ssid: String,
    password: String,
}

impl Credential {
    /// Create a new credential.
    ///
    /// Returns an error if SSID or password are invalid.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let credential = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Create a credential for an open network (no password).
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ssid, String::new())
    }

    /// Create a credential after applying [`coerce_password`].
    pub fn coerced(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ssid, coerce_password(password))
    }

    /// Network SSID.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network password (empty for open networks).
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Check whether both SSID and password match exactly.
    pub fn matches(&self, ssid: &str, password: &str) -> bool {
        self.ssid == ssid && self.password == password
    }

    /// Replace the secret, keeping the SSID.
    pub(crate) fn set_password(&mut self, password: String) {
        self.password.zeroize();
        self.password = password;
    }

    /// Validate the credential.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.ssid)?;

        // Empty is OK for open networks
        if !self.password.is_empty() && self.password.len() < MIN_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooShort {
                len: self.password.len(),
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        if has_line_break(&self.password) {
            return Err(ConfigError::InvalidCharacter("password"));
        }

        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("ssid", &self.ssid)
            .field("password_len", &self.password.len())
            .finish()
    }
}

fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    if has_line_break(ssid) {
        return Err(ConfigError::InvalidCharacter("SSID"));
    }
    Ok(())
}

/// Line breaks would split an entry in the stored record.
fn has_line_break(s: &str) -> bool {
    s.contains(|c| c == '\r' || c == '\n')
}

/// Derive the chip id from the station MAC address.
///
/// Matches the ESP8266 convention: the low 24 bits of the MAC.
pub fn chip_id_from_mac(mac: [u8; 6]) -> u32 {
    u32::from_be_bytes([0, mac[3], mac[4], mac[5]])
}

/// Device-unique default SSID for the fallback access point.
pub fn default_ap_ssid(chip_id: u32) -> String {
    format!("{}{}", DEFAULT_AP_PREFIX, chip_id)
}

/// Settings for the fallback access point.
///
/// Built once at device init and never changed afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    ssid: String,
    passphrase: String,
    hidden: bool,
    channel: u8,
}

impl AccessPointConfig {
    /// Build the access point settings.
    ///
    /// An empty `ssid` falls back to [`default_ap_ssid`] for `chip_id`; a short
    /// passphrase is coerced by [`coerce_password`].
    pub fn new(
        ssid: impl Into<String>,
        passphrase: impl Into<String>,
        hidden: bool,
        chip_id: u32,
    ) -> Result<Self, ConfigError> {
        let ssid = ssid.into();
        let ssid = if ssid.is_empty() {
            default_ap_ssid(chip_id)
        } else {
            ssid
        };
        validate_ssid(&ssid)?;

        let passphrase = coerce_password(passphrase);
        if passphrase.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong {
                len: passphrase.len(),
                max: MAX_PASSWORD_LEN,
            });
        }

        Ok(Self {
            ssid,
            passphrase,
            hidden,
            channel: DEFAULT_AP_CHANNEL,
        })
    }

    /// Open, visible access point named after the chip.
    pub fn for_chip(chip_id: u32) -> Self {
        Self {
            ssid: default_ap_ssid(chip_id),
            passphrase: String::new(),
            hidden: false,
            channel: DEFAULT_AP_CHANNEL,
        }
    }

    /// Use a different channel (1-13).
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel.clamp(1, 13);
        self
    }

    /// Access point SSID.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Access point passphrase (empty for an open AP).
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Whether the SSID is hidden from beacons.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Radio channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Check if the access point is open.
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }
}

impl fmt::Debug for AccessPointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointConfig")
            .field("ssid", &self.ssid)
            .field("passphrase_len", &self.passphrase.len())
            .field("hidden", &self.hidden)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// Field contains a line break.
    InvalidCharacter(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::InvalidCharacter(field) => write!(f, "{} contains a line break", field),
        }
    }
}

impl std::error::Error for ConfigError {}
