//! Process-level operations: restart and radio credential erase.

use log::{info, warn};
use std::fmt;

/// Restart / credential-erase collaborator.
pub trait SystemControl: Send + Sync {
    /// Erase credentials the radio stack persisted on its own.
    fn erase_network_credentials(&self) -> Result<(), SystemError>;

    /// Restart the device. On real hardware this does not return.
    fn restart(&self);
}

/// A system operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemError(pub String);

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system error: {}", self.0)
    }
}

impl std::error::Error for SystemError {}

/// Host implementation: nothing to erase, restart exits the process.
#[derive(Debug, Default)]
pub struct HostSystem;

impl SystemControl for HostSystem {
    fn erase_network_credentials(&self) -> Result<(), SystemError> {
        info!("Host build keeps no radio credentials");
        Ok(())
    }

    fn restart(&self) {
        warn!("Restart requested, exiting");
        std::process::exit(0);
    }
}

/// ESP-IDF implementation.
#[cfg(feature = "esp32")]
#[derive(Debug, Default)]
pub struct EspSystem;

#[cfg(feature = "esp32")]
impl SystemControl for EspSystem {
    fn erase_network_credentials(&self) -> Result<(), SystemError> {
        // SAFETY: resets the Wi-Fi NVS settings; valid once the driver is initialised.
        let err = unsafe { esp_idf_sys::esp_wifi_restore() };
        if err != esp_idf_sys::ESP_OK {
            return Err(SystemError(format!("esp_wifi_restore failed: {}", err)));
        }
        info!("Wi-Fi credentials erased");
        Ok(())
    }

    fn restart(&self) {
        info!("Restarting");
        unsafe { esp_idf_sys::esp_restart() };
    }
}
