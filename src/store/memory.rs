//! In-memory storage backend.
//!
//! Used by tests and the host simulator. Counts writes so callers can check
//! that no-op mutations never touch the backend.

use super::{Storage, StorageError};
use std::io;

/// Record held in RAM.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    record: Option<String>,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    /// Create an empty backend (no record).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend holding `record`.
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Some(record.into()),
            ..Self::default()
        }
    }

    /// Current record, if any.
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every read fail.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every write and remove fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::Other, "read failure").into());
        }
        Ok(self.record.clone())
    }

    fn write(&mut self, record: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "write failure").into());
        }
        self.record = Some(record.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "remove failure").into());
        }
        self.record = None;
        Ok(())
    }
}
