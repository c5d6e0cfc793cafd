//! Device-to-device protocol bridge.
//!
//! Only the interface exists; [`UnimplementedBridge`] reports that no bridge
//! is available and boot continues without one.

use log::info;
use std::fmt;

/// Bridge between this device and a home-automation fabric.
pub trait DeviceBridge: Send {
    fn name(&self) -> &str;

    /// Start the bridge. Failure is not fatal to the device.
    fn start(&mut self) -> Result<(), BridgeError>;
}

/// Bridge start failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No bridge implementation is built in.
    Unavailable,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "bridge not available"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Placeholder bridge.
#[derive(Debug, Default)]
pub struct UnimplementedBridge;

impl DeviceBridge for UnimplementedBridge {
    fn name(&self) -> &str {
        "none"
    }

    fn start(&mut self) -> Result<(), BridgeError> {
        info!("Device bridge not available in this build");
        Err(BridgeError::Unavailable)
    }
}
