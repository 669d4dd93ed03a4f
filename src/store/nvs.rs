//! NVS storage backend.
//!
//! Stores the credential record in ESP32's Non-Volatile Storage so it
//! persists across reboots. The record is a single blob key, which NVS
//! replaces atomically.

use super::{Storage, StorageError, MAX_RECORD_LEN};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;

/// NVS namespace for saved networks.
const NVS_NAMESPACE: &str = "wifi_picker";

/// NVS key for the record.
const NVS_KEY: &str = "networks";

/// Record kept in NVS.
pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    /// Open the namespace on the given partition.
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    /// Take the default NVS partition and open the namespace.
    pub fn take() -> Result<Self, EspError> {
        Self::new(EspNvsPartition::<NvsDefault>::take()?)
    }
}

impl Storage for NvsStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let mut buf = vec![0u8; MAX_RECORD_LEN];
        let Some(bytes) = self.nvs.get_raw(NVS_KEY, &mut buf)? else {
            return Ok(None);
        };
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| StorageError::InvalidUtf8)
    }

    fn write(&mut self, record: &str) -> Result<(), StorageError> {
        if record.len() > MAX_RECORD_LEN {
            return Err(StorageError::TooLarge {
                len: record.len(),
                max: MAX_RECORD_LEN,
            });
        }
        self.nvs.set_raw(NVS_KEY, record.as_bytes())?;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.nvs.remove(NVS_KEY)?;
        Ok(())
    }
}
