//! Key-value storage seam used by the ACL store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ArborError, Result};

/// Read-modify-write callback: receives the current value, returns the new one.
pub type UpdateFn<'a> = dyn FnMut(Option<Vec<u8>>) -> Result<Vec<u8>> + 'a;

/// Byte-oriented record storage partitioned by column family.
pub trait AclStorage: Send + Sync {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &'static str;

    fn get(&self, column_family: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, column_family: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Atomic read-modify-write of one record.
    ///
    /// The default is a plain get followed by a put; backends shared between
    /// writers must override it so concurrent updates of one key serialize.
    /// When `f` fails nothing is written.
    fn update(&self, column_family: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
        let current = self.get(column_family, key)?;
        let next = f(current)?;
        self.put(column_family, key, &next)
    }
}

/// Process-local storage backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records().map_or(0, |records| records.len())
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>>> {
        self.records
            .lock()
            .map_err(|_| ArborError::Lock("memory storage poisoned".into()))
    }
}

impl AclStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, column_family: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let records = self.records()?;
        Ok(records
            .get(&(column_family.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, column_family: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut records = self.records()?;
        records.insert((column_family.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn update(&self, column_family: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
        let mut records = self.records()?;
        let record_key = (column_family.to_string(), key.to_string());
        let next = f(records.get(&record_key).cloned())?;
        records.insert(record_key, next);
        Ok(())
    }
}
