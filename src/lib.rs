//! Control plane of a small networked appliance.
//!
//! Persists a JSON configuration document, maps it onto pluggable hardware
//! modules (relay, PWM output, addressable LED strip), brings up an access
//! point or joins a network, and exposes an HTTP API plus a long-press
//! factory reset.
//!
//! Everything except the ESP-IDF backends (`esp32` feature) runs and is
//! tested on the host against simulated hardware.

pub mod api;
pub mod app;
pub mod bridge;
pub mod config;
pub mod device_state;
pub mod dns;
pub mod hal;
pub mod modules;
pub mod network;
pub mod reset;
pub mod settings;
pub mod storage;
pub mod system;

// Re-export commonly used items
pub use api::{ApiRequest, ApiResponse, ControlApi, HttpServer};
pub use app::{Appliance, BootError, Platform};
pub use config::{ConfigDocument, ConfigError, ConfigStore};
pub use device_state::{DeviceSnapshot, DeviceState};
pub use dns::CaptiveDns;
pub use modules::{Module, ModuleError, ModuleKind, ModuleRegistry};
pub use network::{NetworkBootstrap, NetworkDriver, NetworkError, NetworkMode};
pub use reset::{ButtonWatcher, FactoryReset};
pub use settings::RuntimeSettings;
pub use storage::{FileStore, KvStore, MemoryStore, StorageError};
