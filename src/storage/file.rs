//! File-backed store for host (development) builds.
//!
//! Each namespace is a directory under the data root, each key a file.
//! Uses `~/.modhub-esp32/` by default.

use super::{KvStore, StorageError, MAX_VALUE_LEN};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Directory-per-namespace persistent store.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Serializes writers so a write and its read-back verification are not interleaved.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the default data directory.
    ///
    /// Returns `~/.modhub-esp32`
    pub fn default_root() -> io::Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(PathBuf::from(home).join(".modhub-esp32"))
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }
}

impl KvStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.key_path(namespace, key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No value stored at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(StorageError::TooLarge {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.key_path(namespace, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling file and rename so a crash never leaves a torn value
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        if fs::read(&path)? != value {
            return Err(StorageError::VerifyFailed);
        }

        debug!("Stored {} bytes at {:?}", value.len(), path);
        Ok(())
    }

    fn erase_namespace(&self, namespace: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let dir = self.root.join(namespace);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Erased namespace {:?}", dir);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
