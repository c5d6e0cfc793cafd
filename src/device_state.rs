//! Aggregate device state reported by `/api/status`.

use serde::Serialize;
use std::sync::Mutex;

/// Copy of the aggregate state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub relay_on: bool,
    /// Output level in percent, 0..=100.
    pub level: u8,
}

/// Device state guarded by a single lock, held only for the copy.
#[derive(Debug, Default)]
pub struct DeviceState {
    inner: Mutex<DeviceSnapshot>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> DeviceSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_relay(&self, on: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).relay_on = on;
    }

    /// Set the output level, clamped to 100.
    pub fn set_level(&self, level: u8) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).level = level.min(100);
    }
}
