//! Hardware primitives consumed by the modules and the reset button.
//!
//! Pins are identified by their runtime GPIO number because the module
//! configuration chooses them at runtime.
//!
//! - [`sim`] - recording in-memory implementations (host builds, tests)
//! - `esp` - ESP-IDF GPIO/LEDC drivers (`esp32` feature)

#[cfg(feature = "esp32")]
mod esp;
pub mod sim;

#[cfg(feature = "esp32")]
pub use esp::{EspGpio, EspInputPin, EspPwm};

use std::fmt;

/// Highest GPIO number accepted by the modules (ESP32-S3 has 0..=48).
pub const MAX_GPIO: u32 = 48;

/// Digital output control.
pub trait GpioDriver: Send + Sync {
    /// Configure `pin` as a push-pull output.
    fn configure_output(&self, pin: u32) -> Result<(), HalError>;
    /// Drive `pin` high or low.
    fn set_level(&self, pin: u32, high: bool) -> Result<(), HalError>;
    /// Return `pin` to its reset (unconfigured) state.
    fn release(&self, pin: u32) -> Result<(), HalError>;
}

/// Single PWM channel control.
pub trait PwmDriver: Send + Sync {
    /// Bind the channel to `pin` with the given frequency and resolution.
    fn configure(&self, pin: u32, freq_hz: u32, res_bits: u32) -> Result<(), HalError>;
    /// Set the raw duty value (0 ..= 2^res_bits - 1).
    fn set_duty(&self, raw: u32) -> Result<(), HalError>;
    /// Stop the channel and release its pin.
    fn stop(&self) -> Result<(), HalError>;
}

/// Digital input sampling.
pub trait InputPin: Send {
    /// Current electrical level.
    fn is_high(&self) -> Result<bool, HalError>;
}

/// Errors reported by a hardware primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    /// Pin number is not usable on this chip.
    InvalidPin(u32),
    /// Channel or timer could not be programmed with the requested parameters.
    InvalidConfig(String),
    /// Driver call failed.
    Driver(String),
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid GPIO {}", pin),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Driver(msg) => write!(f, "driver error: {}", msg),
        }
    }
}

impl std::error::Error for HalError {}
