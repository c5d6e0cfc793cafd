//! Persisted configuration store.
//!
//! Readers get an `Arc` snapshot of the current document. A save builds and
//! persists the new document first and only then swaps the shared pointer, so
//! a reader sees either the old or the new document in full.

use super::{ConfigDocument, ConfigError};
use crate::storage::KvStore;
use log::{info, warn};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};

/// Storage namespace holding the configuration. Factory reset erases all of it.
pub const CONFIG_NAMESPACE: &str = "cfg";

/// Key of the serialized document inside [`CONFIG_NAMESPACE`].
pub const CONFIG_KEY: &str = "json";

/// Owner of the single configuration document.
pub struct ConfigStore {
    kv: Arc<dyn KvStore>,
    current: RwLock<Arc<ConfigDocument>>,
    /// Serializes mutators; readers never take it.
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Create a store holding the built-in default until [`load_or_default`] runs.
    ///
    /// [`load_or_default`]: Self::load_or_default
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            current: RwLock::new(Arc::new(ConfigDocument::builtin_default())),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the persisted document, substituting (and persisting) the built-in
    /// default when it is missing, unreadable or invalid. Never fails.
    pub fn load_or_default(&self) -> Arc<ConfigDocument> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let loaded = match self.kv.get(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(Some(bytes)) => match ConfigDocument::from_slice(&bytes) {
                Ok(doc) => {
                    info!("Configuration loaded ({} bytes)", bytes.len());
                    Some(doc)
                }
                Err(e) => {
                    warn!("Stored configuration rejected, using defaults: {}", e);
                    None
                }
            },
            Ok(None) => {
                info!("No stored configuration, using defaults");
                None
            }
            Err(e) => {
                warn!("Failed to read configuration, using defaults: {}", e);
                None
            }
        };

        let doc = match loaded {
            Some(doc) => doc,
            None => {
                let doc = ConfigDocument::builtin_default();
                if let Err(e) = self.persist(&doc) {
                    warn!("Failed to persist default configuration: {}", e);
                }
                doc
            }
        };

        self.swap(doc)
    }

    /// Current document snapshot.
    pub fn get(&self) -> Arc<ConfigDocument> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Validate, persist and publish a complete document.
    ///
    /// On any error the previously published document stays current.
    pub fn set_and_save(&self, value: Value) -> Result<(), ConfigError> {
        let doc = ConfigDocument::from_value(value)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.persist(&doc)?;
        self.swap(doc);
        info!("Configuration saved");
        Ok(())
    }

    /// Replace the document with the built-in default.
    pub fn reset_to_default(&self) -> Result<(), ConfigError> {
        self.set_and_save(ConfigDocument::builtin_default().as_value().clone())
    }

    /// Erase the whole configuration namespace.
    ///
    /// The in-memory document is left untouched; the caller is expected to
    /// restart, and the next boot recreates the default.
    pub fn factory_reset(&self) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.kv.erase_namespace(CONFIG_NAMESPACE)?;
        info!("Configuration namespace '{}' erased", CONFIG_NAMESPACE);
        Ok(())
    }

    fn persist(&self, doc: &ConfigDocument) -> Result<(), ConfigError> {
        let bytes = doc.to_bytes()?;
        self.kv.set(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        Ok(())
    }

    fn swap(&self, doc: ConfigDocument) -> Arc<ConfigDocument> {
        let doc = Arc::new(doc);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&doc);
        doc
    }
}
