//! Pluggable hardware modules.
//!
//! Every module implements the same [`Module`] contract over a configuration
//! fragment (`modules.<name>` in the configuration document):
//!
//! - `apply` - bind or release hardware per the fragment; idempotent
//! - `status` - snapshot of the module's runtime state
//! - `action` - change runtime-only state without touching the configuration
//!
//! Fragment parsing is permissive: missing or wrong-typed fields fall back to
//! per-field defaults and numbers are clamped into range. The set of modules is
//! closed ([`ModuleKind`]); names are translated once at the API boundary.

mod led_strip;
mod pwm;
mod registry;
mod relay;

pub use led_strip::LedStrip;
pub use pwm::Pwm;
pub use registry::ModuleRegistry;
pub use relay::Relay;

use crate::hal::{HalError, MAX_GPIO};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Uniform apply/status/action contract.
///
/// Implementations serialize concurrent calls internally.
pub trait Module: Send + Sync {
    /// Which module this is.
    fn kind(&self) -> ModuleKind;

    /// Apply a configuration fragment. `None` behaves like an empty fragment.
    fn apply(&self, fragment: Option<&Value>) -> Result<(), ModuleError>;

    /// Snapshot of the runtime state. Never fails.
    fn status(&self) -> Value;

    /// Mutate runtime state; returns the post-mutation status.
    fn action(&self, request: &Value) -> Result<Value, ModuleError>;
}

/// The closed set of modules, in `apply_all` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Relay,
    Pwm,
    LedStrip,
}

impl ModuleKind {
    /// Every module kind, in application order.
    pub const ALL: [ModuleKind; 3] = [ModuleKind::Relay, ModuleKind::Pwm, ModuleKind::LedStrip];

    /// Canonical name, also the key under `modules` in the configuration.
    pub fn name(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::Pwm => "pwm",
            Self::LedStrip => "ws2812",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleKind {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relay" => Ok(Self::Relay),
            "pwm" => Ok(Self::Pwm),
            "ws2812" | "led-strip" | "led_strip" => Ok(Self::LedStrip),
            other => Err(ModuleError::NotFound(other.to_string())),
        }
    }
}

/// Module operation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// No module with this name.
    NotFound(String),
    /// Action on a module that is not enabled.
    Disabled(ModuleKind),
    /// Malformed apply fragment or action request.
    InvalidArgument(String),
    /// A hardware primitive rejected the request.
    Hardware(HalError),
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "unknown module '{}'", name),
            Self::Disabled(kind) => write!(f, "module '{}' is disabled", kind),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Hardware(e) => write!(f, "hardware error: {}", e),
        }
    }
}

impl std::error::Error for ModuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hardware(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HalError> for ModuleError {
    fn from(e: HalError) -> Self {
        Self::Hardware(e)
    }
}

// Fragment field readers. A wrong-typed field is treated as missing.

fn field<'a>(fragment: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    fragment.and_then(|f| f.get(key))
}

pub(crate) fn bool_field(fragment: Option<&Value>, key: &str, default: bool) -> bool {
    field(fragment, key)
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

/// Integer field; floats are truncated toward zero.
pub(crate) fn int_field(fragment: Option<&Value>, key: &str) -> Option<i64> {
    let value = field(fragment, key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

pub(crate) fn clamped(fragment: Option<&Value>, key: &str, default: i64, min: i64, max: i64) -> i64 {
    int_field(fragment, key).unwrap_or(default).clamp(min, max)
}

pub(crate) fn str_field<'a>(fragment: Option<&'a Value>, key: &str) -> Option<&'a str> {
    field(fragment, key).and_then(Value::as_str)
}

/// GPIO number for an enabled module.
pub(crate) fn gpio_field(fragment: Option<&Value>, default: u32) -> Result<u32, ModuleError> {
    let pin = int_field(fragment, "gpio").unwrap_or(i64::from(default));
    u32::try_from(pin)
        .ok()
        .filter(|&p| p <= MAX_GPIO)
        .ok_or_else(|| ModuleError::InvalidArgument(format!("gpio {} out of range", pin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names_and_aliases() {
        for kind in ModuleKind::ALL {
            assert_eq!(kind.name().parse::<ModuleKind>(), Ok(kind));
        }
        assert_eq!("led-strip".parse::<ModuleKind>(), Ok(ModuleKind::LedStrip));
        assert_eq!("led_strip".parse::<ModuleKind>(), Ok(ModuleKind::LedStrip));
        assert_eq!(
            "servo".parse::<ModuleKind>(),
            Err(ModuleError::NotFound("servo".into()))
        );
    }

    #[test]
    fn test_permissive_fields() {
        let frag = json!({"enable": "yes", "duty": 42.9, "freq": "fast", "effect": 3});
        let f = Some(&frag);
        assert!(!bool_field(f, "enable", false));
        assert_eq!(int_field(f, "duty"), Some(42));
        assert_eq!(clamped(f, "freq", 20000, 1, i64::MAX), 20000);
        assert_eq!(str_field(f, "effect"), None);
        assert_eq!(clamped(None, "duty", 150, 0, 100), 100);
    }

    #[test]
    fn test_gpio_field_range() {
        assert_eq!(gpio_field(None, 4), Ok(4));
        assert_eq!(gpio_field(Some(&json!({"gpio": 48})), 4), Ok(48));
        assert!(matches!(
            gpio_field(Some(&json!({"gpio": 49})), 4),
            Err(ModuleError::InvalidArgument(_))
        ));
        assert!(matches!(
            gpio_field(Some(&json!({"gpio": -1})), 4),
            Err(ModuleError::InvalidArgument(_))
        ));
    }
}
