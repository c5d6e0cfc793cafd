//! Runtime settings: ports, pins and timings.
//!
//! These are build-time constants on the device. The host binary can override
//! them from `MODHUB_*` environment variables.

use crate::reset::ButtonConfig;
use log::warn;
use std::env;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_DNS_PORT: u16 = crate::dns::DNS_PORT;
pub const DEFAULT_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
/// BOOT button on most ESP32-C3 boards.
pub const DEFAULT_RESET_GPIO: u32 = 9;
pub const DEFAULT_RESET_HOLD: Duration = Duration::from_millis(6000);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(40);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Pause between a factory-reset erase and the restart.
pub const DEFAULT_RESTART_GRACE: Duration = Duration::from_millis(200);

/// Settings not stored in the configuration document.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub http_port: u16,
    pub dns_port: u16,
    /// Access-point address reported by the host driver.
    pub ap_address: Ipv4Addr,
    pub reset_gpio: u32,
    pub reset_active_low: bool,
    pub reset_hold: Duration,
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub restart_grace: Duration,
    /// Host store location; `None` selects `FileStore::default_root()`.
    pub data_dir: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            dns_port: DEFAULT_DNS_PORT,
            ap_address: DEFAULT_AP_ADDRESS,
            reset_gpio: DEFAULT_RESET_GPIO,
            reset_active_low: true,
            reset_hold: DEFAULT_RESET_HOLD,
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart_grace: DEFAULT_RESTART_GRACE,
            data_dir: None,
        }
    }
}

impl RuntimeSettings {
    /// Defaults overridden by `MODHUB_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unparseable values are logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = parse_var(&lookup, "MODHUB_HTTP_PORT") {
            self.http_port = port;
        }
        if let Some(port) = parse_var(&lookup, "MODHUB_DNS_PORT") {
            self.dns_port = port;
        }
        if let Some(addr) = parse_var(&lookup, "MODHUB_AP_ADDR") {
            self.ap_address = addr;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "MODHUB_RESET_HOLD_MS") {
            self.reset_hold = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup("MODHUB_DATA_DIR").filter(|d| !d.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Parameters for the reset button watcher.
    pub fn button_config(&self) -> ButtonConfig {
        ButtonConfig {
            active_low: self.reset_active_low,
            debounce: self.debounce,
            hold: self.reset_hold,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
