//! Persistent credential store.
//!
//! Keeps the saved networks as an ordered list. The order is the order in
//! which networks were first added and doubles as the connection priority.
//! Every mutation rewrites the complete record through a [`Storage`]
//! backend before returning.
//!
//! # Record Format
//!
//! Each entry is two text lines, SSID first, then password:
//!
//! ```text
//! HomeNetwork\r\n
//! password123\r\n
//! CafeOpen\r\n
//! \r\n
//! ```
//!
//! Readers accept `\n` as well as `\r\n`. A missing record is an empty store.
//!
//! # Example
//!
//! ```
//! use wifi_picker::store::{CredentialStore, MemoryStorage};
//!
//! let mut store = CredentialStore::open(MemoryStorage::new());
//! store.add("HomeNetwork", "password123").unwrap();
//! store.add("CafeOpen", "").unwrap();
//!
//! let reopened = CredentialStore::open(store.into_storage());
//! assert_eq!(reopened.len(), 2);
//! assert_eq!(reopened.credentials()[0].ssid(), "HomeNetwork");
//! ```

mod file;
mod memory;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_store_path, FileStorage};
pub use memory::MemoryStorage;
#[cfg(feature = "esp32")]
pub use nvs::NvsStorage;

use crate::config::{
    coerce_password, ConfigError, Credential, MAX_PASSWORD_LEN, MAX_SSID_LEN,
};
use log::{debug, info, warn};
use std::fmt;

/// Maximum number of saved networks.
pub const MAX_CREDENTIALS: usize = 16;

/// Upper bound of an encoded record in bytes.
pub const MAX_RECORD_LEN: usize = MAX_CREDENTIALS * (MAX_SSID_LEN + MAX_PASSWORD_LEN + 4);

/// Line terminator written after every field.
const LINE_END: &str = "\r\n";

/// Durable backing for the credential record.
///
/// Implementations replace the whole record on [`write`](Storage::write) so
/// that a reader sees either the old or the new record, never a mix.
pub trait Storage {
    /// Read the record. `Ok(None)` means no record exists.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the record.
    fn write(&mut self, record: &str) -> Result<(), StorageError>;

    /// Delete the record. Deleting a missing record succeeds.
    fn remove(&mut self) -> Result<(), StorageError>;
}

/// Encode credentials into the line record.
pub fn encode(credentials: &[Credential]) -> String {
    let mut record = String::new();
    for credential in credentials {
        record.push_str(credential.ssid());
        record.push_str(LINE_END);
        record.push_str(credential.password());
        record.push_str(LINE_END);
    }
    record
}

/// Decode a line record.
///
/// Short passwords are coerced as on [`CredentialStore::add`]. Entries that
/// still fail validation are skipped, a trailing SSID line without a password
/// line is discarded, and a repeated SSID keeps its first position with the
/// last password. Entries beyond [`MAX_CREDENTIALS`] are dropped.
pub fn decode(record: &str) -> Vec<Credential> {
    let mut credentials: Vec<Credential> = Vec::new();
    let mut dropped = 0usize;
    let mut lines = record
        .split_terminator('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    while let Some(ssid) = lines.next() {
        let Some(password) = lines.next() else {
            warn!("Discarding incomplete trailing entry {:?}", ssid);
            break;
        };

        match Credential::coerced(ssid, password) {
            Ok(credential) => {
                if let Some(existing) = credentials.iter_mut().find(|c| c.ssid() == ssid) {
                    existing.set_password(credential.password().to_string());
                } else if credentials.len() >= MAX_CREDENTIALS {
                    dropped += 1;
                } else {
                    credentials.push(credential);
                }
            }
            Err(e) => warn!("Skipping malformed entry {:?}: {}", ssid, e),
        }
    }

    if dropped > 0 {
        warn!(
            "Record holds more than {} networks, dropped {}",
            MAX_CREDENTIALS, dropped
        );
    }
    credentials
}

/// Ordered set of saved networks backed by durable storage.
pub struct CredentialStore<S: Storage> {
    storage: S,
    credentials: Vec<Credential>,
}

impl<S: Storage> CredentialStore<S> {
    /// Create an empty store without reading the backend.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            credentials: Vec::new(),
        }
    }

    /// Create a store and load the record from the backend.
    pub fn open(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.load();
        store
    }

    /// Reload the credentials from the backend.
    ///
    /// Never fails: an unreadable or missing record gives an empty store.
    pub fn load(&mut self) -> &[Credential] {
        self.credentials = match self.storage.read() {
            Ok(Some(record)) => decode(&record),
            Ok(None) => {
                info!("No saved networks found");
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read saved networks, starting empty: {}", e);
                Vec::new()
            }
        };
        debug!("Loaded {} saved networks", self.credentials.len());
        &self.credentials
    }

    /// Write the complete current set to the backend.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.storage.write(&encode(&self.credentials))?;
        Ok(())
    }

    /// Add a network or replace the password of a saved one.
    ///
    /// A short password is coerced to the placeholder. A replaced entry keeps
    /// its position in the priority order.
    pub fn add(&mut self, ssid: &str, password: &str) -> Result<(), StoreError> {
        let credential = Credential::new(ssid, coerce_password(password))?;

        let mut updated = self.credentials.clone();
        match updated.iter_mut().find(|c| c.ssid() == ssid) {
            Some(existing) => existing.set_password(credential.password().to_string()),
            None => {
                if updated.len() >= MAX_CREDENTIALS {
                    return Err(StoreError::Full {
                        max: MAX_CREDENTIALS,
                    });
                }
                updated.push(credential);
            }
        }

        self.commit(updated)?;
        info!("Saved network \"{}\"", ssid);
        Ok(())
    }

    /// Remove a network if both SSID and password match exactly.
    ///
    /// Returns `Ok(false)` without touching the backend when nothing matches.
    pub fn remove(&mut self, ssid: &str, password: &str) -> Result<bool, StoreError> {
        let Some(index) = self
            .credentials
            .iter()
            .position(|c| c.matches(ssid, password))
        else {
            debug!("No saved network matches \"{}\"", ssid);
            return Ok(false);
        };

        let mut updated = self.credentials.clone();
        updated.remove(index);
        self.commit(updated)?;
        info!("Removed network \"{}\"", ssid);
        Ok(true)
    }

    /// Forget every network and delete the durable record.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.storage.remove()?;
        self.credentials.clear();
        info!("Saved networks cleared");
        Ok(())
    }

    /// Saved networks in priority order.
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// Look up a saved network by SSID.
    pub fn get(&self, ssid: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.ssid() == ssid)
    }

    /// Number of saved networks.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Check if no networks are saved.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Borrow the backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consume the store, returning the backend.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Persist `updated`, then make it current.
    fn commit(&mut self, updated: Vec<Credential>) -> Result<(), StoreError> {
        self.storage.write(&encode(&updated))?;
        self.credentials = updated;
        Ok(())
    }
}

/// Errors from a storage backend.
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem I/O error.
    Io(std::io::Error),
    /// Record is not valid UTF-8.
    InvalidUtf8,
    /// Record does not fit the backend.
    TooLarge { len: usize, max: usize },
    /// ESP-IDF NVS error.
    #[cfg(feature = "esp32")]
    Nvs(esp_idf_sys::EspError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidUtf8 => write!(f, "record is not valid UTF-8"),
            Self::TooLarge { len, max } => {
                write!(f, "record too large: {} bytes (max {})", len, max)
            }
            #[cfg(feature = "esp32")]
            Self::Nvs(e) => write!(f, "NVS error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Nvs(e)
    }
}

/// Errors from credential store mutations.
#[derive(Debug)]
pub enum StoreError {
    /// Credential failed validation.
    Config(ConfigError),
    /// Backend failed to persist the change.
    Storage(StorageError),
    /// Store already holds the maximum number of networks.
    Full { max: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid credential: {}", e),
            Self::Storage(e) => write!(f, "storage error: {}", e),
            Self::Full { max } => write!(f, "store full ({} networks)", max),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Storage(e) => Some(e),
            Self::Full { .. } => None,
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PASSWORD_PLACEHOLDER;

    fn ssids<S: Storage>(store: &CredentialStore<S>) -> Vec<&str> {
        store.credentials().iter().map(|c| c.ssid()).collect()
    }

    // ==================== Codec Tests ====================

    #[test]
    fn test_encode_two_lines_per_entry() {
        let credentials = vec![
            Credential::new("home", "password123").unwrap(),
            Credential::open("cafe").unwrap(),
        ];
        assert_eq!(encode(&credentials), "home\r\npassword123\r\ncafe\r\n\r\n");
    }

    #[test]
    fn test_decode_accepts_bare_newlines() {
        let credentials = decode("home\npassword123\ncafe\n\n");
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].password(), "password123");
        assert!(credentials[1].is_open());
    }

    #[test]
    fn test_decode_discards_trailing_partial_entry() {
        let credentials = decode("home\r\npassword123\r\norphan\r\n");
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].ssid(), "home");
    }

    #[test]
    fn test_decode_skips_malformed_entries() {
        // Empty SSID and a 65-char password are both invalid
        let record = format!(
            "\r\npassword123\r\nlong\r\n{}\r\nok\r\npassword123\r\n",
            "x".repeat(MAX_PASSWORD_LEN + 1)
        );
        let credentials = decode(&record);
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].ssid(), "ok");
    }

    #[test]
    fn test_decode_coerces_short_legacy_password() {
        let credentials = decode("legacy\r\nshort\r\nhome\r\npassword123\r\n");
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].ssid(), "legacy");
        assert_eq!(credentials[0].password(), PASSWORD_PLACEHOLDER);
        assert_eq!(credentials[1].password(), "password123");
    }

    #[test]
    fn test_decode_caps_entry_count() {
        let record: String = (0..MAX_CREDENTIALS + 3)
            .map(|i| format!("net{}\r\npassword{}\r\n", i, i))
            .collect();
        let credentials = decode(&record);
        assert_eq!(credentials.len(), MAX_CREDENTIALS);
        assert_eq!(credentials[MAX_CREDENTIALS - 1].ssid(), format!("net{}", MAX_CREDENTIALS - 1));
    }

    #[test]
    fn test_decode_duplicate_past_cap_still_updates() {
        let mut record: String = (0..MAX_CREDENTIALS)
            .map(|i| format!("net{}\npassword{}\n", i, i))
            .collect();
        record.push_str("net0\nreplaced1\n");
        let credentials = decode(&record);
        assert_eq!(credentials.len(), MAX_CREDENTIALS);
        assert_eq!(credentials[0].password(), "replaced1");
    }

    #[test]
    fn test_decode_duplicate_keeps_first_position() {
        let credentials = decode("a\npassword1\nb\npassword2\na\npassword3\n");
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].ssid(), "a");
        assert_eq!(credentials[0].password(), "password3");
    }

    #[test]
    fn test_decode_empty_record() {
        assert!(decode("").is_empty());
    }

    // ==================== Load/Save Tests ====================

    #[test]
    fn test_missing_record_is_empty_store() {
        let store = CredentialStore::open(MemoryStorage::new());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unreadable_record_is_empty_store() {
        let mut storage = MemoryStorage::new();
        storage.fail_reads(true);
        let store = CredentialStore::open(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn test_odd_line_record_loads_prefix() {
        let storage = MemoryStorage::with_record("one\npassword1\ntwo\npassword2\nthree\n");
        let store = CredentialStore::open(storage);
        assert_eq!(ssids(&store), vec!["one", "two"]);
    }

    #[test]
    fn test_save_load_is_fixed_point() {
        let storage = MemoryStorage::with_record("one\npassword1\nopen\n\ntwo\npassword2\n");
        let mut store = CredentialStore::open(storage);
        let before = store.credentials().to_vec();

        store.save().unwrap();
        let reloaded = store.load().to_vec();
        assert_eq!(before, reloaded);

        store.save().unwrap();
        let first = store.storage().record().unwrap().to_string();
        store.load();
        store.save().unwrap();
        assert_eq!(store.storage().record().unwrap(), first);
    }

    // ==================== Mutation Tests ====================

    #[test]
    fn test_add_persists_immediately() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("home", "password123").unwrap();
        assert_eq!(store.storage().writes(), 1);
        assert_eq!(store.storage().record(), Some("home\r\npassword123\r\n"));
    }

    #[test]
    fn test_add_twice_keeps_single_entry() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("home", "password123").unwrap();
        store.add("home", "password123").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_readd_keeps_position_and_updates_secret() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("a", "password1").unwrap();
        store.add("b", "password2").unwrap();
        store.add("a", "password9").unwrap();

        assert_eq!(ssids(&store), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().password(), "password9");
    }

    #[test]
    fn test_add_short_password_stores_placeholder() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("net", "short").unwrap();
        assert_eq!(store.get("net").unwrap().password(), PASSWORD_PLACEHOLDER);
    }

    #[test]
    fn test_add_invalid_ssid_rejected() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        let result = store.add("", "password123");
        assert!(matches!(result, Err(StoreError::Config(ConfigError::SsidEmpty))));
        assert_eq!(store.storage().writes(), 0);
    }

    #[test]
    fn test_add_when_full() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        for i in 0..MAX_CREDENTIALS {
            store.add(&format!("net{}", i), "").unwrap();
        }
        let result = store.add("one-more", "");
        assert!(matches!(result, Err(StoreError::Full { .. })));

        // Updating an existing entry still works
        store.add("net0", "password123").unwrap();
        assert_eq!(store.len(), MAX_CREDENTIALS);
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let mut store = CredentialStore::open(MemoryStorage::with_record("a\npassword1\n"));
        store.storage_mut_for_test().fail_writes(true);

        assert!(matches!(
            store.add("b", "password2"),
            Err(StoreError::Storage(_))
        ));
        assert_eq!(ssids(&store), vec!["a"]);
    }

    #[test]
    fn test_remove_exact_match() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("a", "password1").unwrap();
        store.add("b", "password2").unwrap();

        assert!(store.remove("a", "password1").unwrap());
        assert_eq!(ssids(&store), vec!["b"]);
        assert_eq!(store.storage().record(), Some("b\r\npassword2\r\n"));
    }

    #[test]
    fn test_remove_mismatched_secret_is_noop() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("a", "password1").unwrap();
        let writes = store.storage().writes();

        assert!(!store.remove("a", "password2").unwrap());
        assert!(!store.remove("missing", "password1").unwrap());
        assert_eq!(ssids(&store), vec!["a"]);
        assert_eq!(store.storage().writes(), writes);
    }

    #[test]
    fn test_reset_deletes_record() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("a", "password1").unwrap();
        store.reset().unwrap();

        assert!(store.is_empty());
        assert_eq!(store.storage().record(), None);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_failed_reset_keeps_networks() {
        let mut store = CredentialStore::open(MemoryStorage::new());
        store.add("a", "password1").unwrap();
        store.storage_mut_for_test().fail_writes(true);

        assert!(store.reset().is_err());
        assert_eq!(ssids(&store), vec!["a"]);
        assert_eq!(store.storage().record(), Some("a\r\npassword1\r\n"));
    }

    impl<S: Storage> CredentialStore<S> {
        fn storage_mut_for_test(&mut self) -> &mut S {
            &mut self.storage
        }
    }
}
