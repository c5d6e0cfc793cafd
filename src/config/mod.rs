//! Device configuration document.
//!
//! The configuration is a single JSON object tree:
//!
//! ```json
//! {
//!   "net": {
//!     "hostname": "esp32-c3",
//!     "ap":  { "ssid": "ESP32-SETUP", "pass": "12345678" },
//!     "sta": { "ssid": "", "pass": "" }
//!   },
//!   "modules": {
//!     "relay":  { "enable": false, "gpio": 4, "active_level": 1, "default_on": false },
//!     "pwm":    { "enable": false, "gpio": 5, "freq": 20000, "res_bits": 10, "duty": 0 },
//!     "ws2812": { "enable": false, "gpio": 8, "count": 30, "brightness": 50, "effect": "solid" }
//!   }
//! }
//! ```
//!
//! A [`ConfigDocument`] is always object-shaped and has passed schema
//! validation; the only way to build one from untrusted input is
//! [`ConfigDocument::from_value`] / [`ConfigDocument::from_slice`].
//!
//! # Components
//!
//! - [`ConfigStore`] - load-or-default, set-and-save, factory reset

mod store;

pub use store::{ConfigStore, CONFIG_KEY, CONFIG_NAMESPACE};

use crate::network::credentials::{validate_client_password, validate_password, validate_ssid};
use crate::storage::StorageError;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Default hostname.
pub const DEFAULT_HOSTNAME: &str = "esp32-c3";

/// Default access-point SSID.
pub const DEFAULT_AP_SSID: &str = "ESP32-SETUP";

/// Default access-point password.
pub const DEFAULT_AP_PASS: &str = "12345678";

/// A validated configuration document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigDocument(Value);

impl ConfigDocument {
    /// Built-in default document, used at first boot and after a factory reset.
    pub fn builtin_default() -> Self {
        Self(json!({
            "net": {
                "hostname": DEFAULT_HOSTNAME,
                "ap":  { "ssid": DEFAULT_AP_SSID, "pass": DEFAULT_AP_PASS },
                "sta": { "ssid": "", "pass": "" }
            },
            "modules": {
                "relay": {
                    "enable": false, "gpio": 4, "active_level": 1, "default_on": false
                },
                "pwm": {
                    "enable": false, "gpio": 5, "freq": 20000, "res_bits": 10, "duty": 0
                },
                "ws2812": {
                    "enable": false, "gpio": 8, "count": 30, "brightness": 50, "effect": "solid"
                }
            }
        }))
    }

    /// Validate and wrap a JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        validate(&value)?;
        Ok(Self(value))
    }

    /// Parse and validate serialized bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ConfigError::Invalid(format!("JSON parse error: {}", e)))?;
        Self::from_value(value)
    }

    /// Serialize to compact JSON for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec(&self.0)
            .map_err(|e| ConfigError::Invalid(format!("serialization failed: {}", e)))
    }

    /// The document as a JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a value by JSON pointer (e.g. `/net/sta/ssid`).
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// String at a JSON pointer, if present and a string.
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(Value::as_str)
    }

    /// The `modules.<name>` fragment, if present.
    pub fn module_fragment(&self, name: &str) -> Option<&Value> {
        self.0.get("modules").and_then(|mods| mods.get(name))
    }

    /// Configured hostname, falling back to [`DEFAULT_HOSTNAME`].
    pub fn hostname(&self) -> &str {
        self.str_at("/net/hostname").unwrap_or(DEFAULT_HOSTNAME)
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::builtin_default()
    }
}

/// Check that a value is a well-formed configuration document.
fn validate(value: &Value) -> Result<(), ConfigError> {
    let root = value
        .as_object()
        .ok_or_else(|| ConfigError::Invalid("document must be a JSON object".into()))?;

    if let Some(net) = root.get("net") {
        expect_object(net, "net")?;
        expect_string(net.get("hostname"), "net.hostname")?;

        if let Some(ap) = net.get("ap") {
            expect_object(ap, "net.ap")?;
            if let Some(ssid) = expect_string(ap.get("ssid"), "net.ap.ssid")? {
                validate_ssid(ssid, false)
                    .map_err(|e| ConfigError::Invalid(format!("net.ap.ssid: {}", e)))?;
            }
            if let Some(pass) = expect_string(ap.get("pass"), "net.ap.pass")? {
                validate_password(pass)
                    .map_err(|e| ConfigError::Invalid(format!("net.ap.pass: {}", e)))?;
            }
        }

        if let Some(sta) = net.get("sta") {
            expect_object(sta, "net.sta")?;
            if let Some(ssid) = expect_string(sta.get("ssid"), "net.sta.ssid")? {
                validate_ssid(ssid, true)
                    .map_err(|e| ConfigError::Invalid(format!("net.sta.ssid: {}", e)))?;
            }
            if let Some(pass) = expect_string(sta.get("pass"), "net.sta.pass")? {
                validate_client_password(pass)
                    .map_err(|e| ConfigError::Invalid(format!("net.sta.pass: {}", e)))?;
            }
        }
    }

    if let Some(modules) = root.get("modules") {
        let modules = expect_object(modules, "modules")?;
        for (name, fragment) in modules {
            expect_object(fragment, &format!("modules.{}", name))?;
        }
    }

    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a serde_json::Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| ConfigError::Invalid(format!("{} must be an object", path)))
}

fn expect_string<'a>(value: Option<&'a Value>, path: &str) -> Result<Option<&'a str>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ConfigError::Invalid(format!("{} must be a string", path))),
    }
}

/// Errors from the configuration store.
#[derive(Debug)]
pub enum ConfigError {
    /// Document failed to parse or failed schema validation.
    Invalid(String),
    /// The persistence layer is unavailable or full.
    IoFailure(StorageError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
            Self::IoFailure(e) => write!(f, "configuration storage failed: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoFailure(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::IoFailure(e)
    }
}
