//! Namespaced persistent key/value storage.
//!
//! The configuration store only needs three primitives from the persistence
//! layer: read a key, write a key, and erase a whole namespace. Backends:
//!
//! - [`MemoryStore`] - volatile, with write-failure injection for tests
//! - [`FileStore`] - one directory per namespace on the host filesystem
//! - `NvsStore` - ESP32 Non-Volatile Storage (`esp32` feature)

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

mod file;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::FileStore;
#[cfg(feature = "esp32")]
pub use nvs::{get_nvs_default_partition, NvsStore};

/// Maximum size of a single stored value.
///
/// NVS blobs are limited by the partition page size; 8 KiB leaves plenty of
/// room for the configuration document.
pub const MAX_VALUE_LEN: usize = 8 * 1024;

/// Namespaced key/value persistence.
///
/// Implementations must be safe to share between the HTTP worker, the reset
/// button task and the boot path.
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key does not exist.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write (create or replace) a value.
    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Erase every key in the namespace.
    fn erase_namespace(&self, namespace: &str) -> Result<(), StorageError>;
}

/// Errors reported by a storage backend.
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem or flash I/O failed.
    Io(std::io::Error),
    /// Value exceeds [`MAX_VALUE_LEN`].
    TooLarge { len: usize, max: usize },
    /// Data read back differs from what was written.
    VerifyFailed,
    /// Backend-specific failure (e.g. an ESP-IDF error code).
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::TooLarge { len, max } => {
                write!(f, "value too large: {} bytes (max {})", len, max)
            }
            Self::VerifyFailed => write!(f, "read-back verification failed"),
            Self::Backend(msg) => write!(f, "storage backend error: {}", msg),
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

type Namespaces = HashMap<String, HashMap<String, Vec<u8>>>;

/// Volatile in-memory store.
///
/// Used by tests and by the host binary when no data directory is usable.
/// Writes and erases can be made to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<Namespaces>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`erase_namespace` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of keys currently stored in a namespace.
    pub fn key_count(&self, namespace: &str) -> usize {
        self.lock().get(namespace).map_or(0, HashMap::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Namespaces> {
        self.namespaces.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("write rejected".into()));
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .lock()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        if value.len() > MAX_VALUE_LEN {
            return Err(StorageError::TooLarge {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }
        self.lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn erase_namespace(&self, namespace: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.lock().remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("cfg", "json").unwrap(), None);

        store.set("cfg", "json", b"{}").unwrap();
        assert_eq!(store.get("cfg", "json").unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn test_memory_store_erase_namespace_removes_all_keys() {
        let store = MemoryStore::new();
        store.set("cfg", "json", b"{}").unwrap();
        store.set("cfg", "other", b"1").unwrap();
        store.set("wifi", "creds", b"x").unwrap();

        store.erase_namespace("cfg").unwrap();
        assert_eq!(store.key_count("cfg"), 0);
        assert_eq!(store.key_count("wifi"), 1);
    }

    #[test]
    fn test_memory_store_fail_writes() {
        let store = MemoryStore::new();
        store.set("cfg", "json", b"old").unwrap();
        store.set_fail_writes(true);

        assert!(store.set("cfg", "json", b"new").is_err());
        assert!(store.erase_namespace("cfg").is_err());
        assert_eq!(store.get("cfg", "json").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_memory_store_rejects_oversized_value() {
        let store = MemoryStore::new();
        let big = vec![0u8; MAX_VALUE_LEN + 1];
        assert!(matches!(
            store.set("cfg", "json", &big),
            Err(StorageError::TooLarge { .. })
        ));
    }
}
