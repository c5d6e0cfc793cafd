//! ESP32 Non-Volatile Storage backend.
//!
//! Namespaces map one-to-one onto NVS namespaces. Values are stored as blobs
//! and verified by reading them back after every write, which catches flash
//! write failures that do not return an error code.

use super::{KvStore, StorageError, MAX_VALUE_LEN};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::{esp, EspError};
use log::{info, warn};
use std::ffi::CString;
use std::sync::{Mutex, OnceLock};

static NVS_PARTITION: OnceLock<EspDefaultNvsPartition> = OnceLock::new();

/// Shared handle to the default NVS partition.
///
/// `EspNvsPartition::take()` may only succeed once per boot, so the handle is
/// taken on first use and cloned afterwards. Safe to call multiple times.
pub fn get_nvs_default_partition() -> Result<EspDefaultNvsPartition, EspError> {
    if let Some(partition) = NVS_PARTITION.get() {
        return Ok(partition.clone());
    }
    let partition = EspDefaultNvsPartition::take()?;
    Ok(NVS_PARTITION.get_or_init(|| partition).clone())
}

impl From<EspError> for StorageError {
    fn from(e: EspError) -> Self {
        Self::Backend(format!("{:?}", e))
    }
}

/// NVS-backed [`KvStore`].
pub struct NvsStore {
    partition: EspDefaultNvsPartition,
    /// NVS handles are not safe for concurrent writers.
    lock: Mutex<()>,
}

impl NvsStore {
    /// Open the default partition.
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self {
            partition: get_nvs_default_partition()?,
            lock: Mutex::new(()),
        })
    }

    fn open(&self, namespace: &str) -> Result<EspNvs<NvsDefault>, StorageError> {
        Ok(EspNvs::new(self.partition.clone(), namespace, true)?)
    }
}

impl KvStore for NvsStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let nvs = self.open(namespace)?;

        let len = match nvs.blob_len(key)? {
            Some(len) => len,
            None => return Ok(None),
        };
        if len > MAX_VALUE_LEN {
            warn!("NVS value {}/{} is {} bytes, ignoring", namespace, key, len);
            return Err(StorageError::TooLarge {
                len,
                max: MAX_VALUE_LEN,
            });
        }

        let mut buf = vec![0u8; len];
        Ok(nvs.get_raw(key, &mut buf)?.map(<[u8]>::to_vec))
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(StorageError::TooLarge {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut nvs = self.open(namespace)?;
        nvs.set_raw(key, value)?;

        let mut verify_buf = vec![0u8; value.len()];
        match nvs.get_raw(key, &mut verify_buf)? {
            Some(read_back) if read_back == value => Ok(()),
            _ => {
                log::error!("NVS verification failed for {}/{}", namespace, key);
                Err(StorageError::VerifyFailed)
            }
        }
    }

    fn erase_namespace(&self, namespace: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // Make sure the partition is initialised before going through the raw API
        drop(self.open(namespace)?);

        let ns = CString::new(namespace)
            .map_err(|_| StorageError::Backend("namespace contains NUL".into()))?;
        let mut handle: esp_idf_sys::nvs_handle_t = 0;

        // SAFETY: `ns` outlives the call and `handle` is a valid out-pointer.
        esp!(unsafe {
            esp_idf_sys::nvs_open(
                ns.as_ptr(),
                esp_idf_sys::nvs_open_mode_t_NVS_READWRITE,
                &mut handle,
            )
        })?;

        // SAFETY: `handle` was opened above and is closed exactly once below.
        let result = esp!(unsafe { esp_idf_sys::nvs_erase_all(handle) })
            .and_then(|()| esp!(unsafe { esp_idf_sys::nvs_commit(handle) }));
        unsafe { esp_idf_sys::nvs_close(handle) };

        result?;
        info!("NVS namespace '{}' erased", namespace);
        Ok(())
    }
}
