//! Relay on a single GPIO output.
//!
//! Fragment: `{enable, gpio = 4, active_level = 1, default_on = false}`.
//! Action: `{"set": bool}` or `{"toggle": true}`.

use super::{bool_field, gpio_field, int_field, Module, ModuleError, ModuleKind};
use crate::hal::GpioDriver;
use log::info;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_GPIO: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct RelayState {
    enabled: bool,
    gpio: Option<u32>,
    active_level: u8,
    on: bool,
}

impl RelayState {
    const OFF: Self = Self {
        enabled: false,
        gpio: None,
        active_level: 1,
        on: false,
    };

    fn level_for(&self, on: bool) -> bool {
        (self.active_level == 1) == on
    }
}

/// Relay module.
pub struct Relay {
    gpio: Arc<dyn GpioDriver>,
    state: Mutex<RelayState>,
}

impl Relay {
    pub fn new(gpio: Arc<dyn GpioDriver>) -> Self {
        Self {
            gpio,
            state: Mutex::new(RelayState::OFF),
        }
    }

    /// Whether the relay is currently energized.
    pub fn is_on(&self) -> bool {
        self.lock().on
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, state: &mut RelayState, on: bool) -> Result<(), ModuleError> {
        if let Some(pin) = state.gpio {
            self.gpio.set_level(pin, state.level_for(on))?;
            state.on = on;
        }
        Ok(())
    }
}

impl Module for Relay {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Relay
    }

    fn apply(&self, fragment: Option<&Value>) -> Result<(), ModuleError> {
        let mut state = self.lock();

        if !bool_field(fragment, "enable", false) {
            let prev = *state;
            *state = RelayState::OFF;
            if let Some(pin) = prev.gpio {
                self.gpio.release(pin)?;
            }
            if prev.enabled {
                info!("relay disabled");
            }
            return Ok(());
        }

        let pin = gpio_field(fragment, DEFAULT_GPIO)?;
        let active_level = match int_field(fragment, "active_level") {
            Some(0) => 0,
            Some(_) | None => 1,
        };
        let default_on = bool_field(fragment, "default_on", false);

        if let Some(prev) = state.gpio.filter(|&p| p != pin) {
            *state = RelayState::OFF;
            self.gpio.release(prev)?;
        }

        self.gpio.configure_output(pin)?;
        let mut next = RelayState {
            enabled: true,
            gpio: Some(pin),
            active_level,
            on: false,
        };
        self.write(&mut next, default_on)?;
        *state = next;

        info!(
            "relay enabled gpio={} active_level={} default_on={}",
            pin, active_level, default_on
        );
        Ok(())
    }

    fn status(&self) -> Value {
        let state = *self.lock();
        json!({
            "enabled": state.enabled,
            "gpio": state.gpio,
            "active_level": state.active_level,
            "state": state.on,
        })
    }

    fn action(&self, request: &Value) -> Result<Value, ModuleError> {
        {
            let mut state = self.lock();
            if !state.enabled {
                return Err(ModuleError::Disabled(ModuleKind::Relay));
            }

            let target = match (
                request.get("set").and_then(Value::as_bool),
                request.get("toggle").and_then(Value::as_bool),
            ) {
                (Some(on), _) => on,
                (None, Some(true)) => !state.on,
                _ => {
                    return Err(ModuleError::InvalidArgument(
                        "expected {\"set\": bool} or {\"toggle\": true}".into(),
                    ))
                }
            };
            self.write(&mut state, target)?;
        }
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimGpio;
    use crate::hal::HalError;

    /// GPIO driver whose `release` always fails.
    struct StuckGpio(SimGpio);

    impl GpioDriver for StuckGpio {
        fn configure_output(&self, pin: u32) -> Result<(), HalError> {
            self.0.configure_output(pin)
        }

        fn set_level(&self, pin: u32, high: bool) -> Result<(), HalError> {
            self.0.set_level(pin, high)
        }

        fn release(&self, pin: u32) -> Result<(), HalError> {
            Err(HalError::Driver(format!("GPIO{} busy", pin)))
        }
    }

    fn relay() -> (SimGpio, Relay) {
        let gpio = SimGpio::new();
        let relay = Relay::new(Arc::new(gpio.clone()));
        (gpio, relay)
    }

    #[test]
    fn test_apply_enable_reports_status() {
        let (gpio, relay) = relay();
        relay
            .apply(Some(&json!({
                "enable": true, "gpio": 4, "active_level": 1, "default_on": true
            })))
            .unwrap();

        assert_eq!(
            relay.status(),
            json!({"enabled": true, "gpio": 4, "active_level": 1, "state": true})
        );
        assert_eq!(gpio.level(4), Some(true));
    }

    #[test]
    fn test_active_low_inverts_output() {
        let (gpio, relay) = relay();
        relay
            .apply(Some(&json!({"enable": true, "gpio": 2, "active_level": 0})))
            .unwrap();
        assert_eq!(gpio.level(2), Some(true));

        relay.action(&json!({"set": true})).unwrap();
        assert_eq!(gpio.level(2), Some(false));
        assert!(relay.is_on());
    }

    #[test]
    fn test_non_zero_active_level_means_high() {
        let (_, relay) = relay();
        relay
            .apply(Some(&json!({"enable": true, "active_level": 7})))
            .unwrap();
        assert_eq!(relay.status()["active_level"], 1);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (_, relay) = relay();
        let frag = json!({"enable": true, "gpio": 4, "default_on": true});
        relay.apply(Some(&frag)).unwrap();
        let first = relay.status();
        relay.apply(Some(&frag)).unwrap();
        assert_eq!(relay.status(), first);

        relay.apply(Some(&json!({"enable": false}))).unwrap();
        let disabled = relay.status();
        relay.apply(Some(&json!({"enable": false}))).unwrap();
        assert_eq!(relay.status(), disabled);
    }

    #[test]
    fn test_toggle() {
        let (_, relay) = relay();
        relay
            .apply(Some(&json!({"enable": true, "default_on": true})))
            .unwrap();
        let status = relay.action(&json!({"toggle": true})).unwrap();
        assert_eq!(status["state"], false);
    }

    #[test]
    fn test_action_errors() {
        let (_, relay) = relay();
        assert_eq!(
            relay.action(&json!({"toggle": true})),
            Err(ModuleError::Disabled(ModuleKind::Relay))
        );

        relay.apply(Some(&json!({"enable": true}))).unwrap();
        for request in [json!({}), json!({"toggle": false}), json!({"set": "on"})] {
            assert!(matches!(
                relay.action(&request),
                Err(ModuleError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_disable_releases_pin() {
        let (gpio, relay) = relay();
        relay
            .apply(Some(&json!({"enable": true, "gpio": 4})))
            .unwrap();
        relay.apply(Some(&json!({"enable": false}))).unwrap();

        assert!(!gpio.is_configured(4));
        assert_eq!(
            relay.status(),
            json!({"enabled": false, "gpio": null, "active_level": 1, "state": false})
        );
    }

    #[test]
    fn test_rebind_releases_previous_pin() {
        let (gpio, relay) = relay();
        relay
            .apply(Some(&json!({"enable": true, "gpio": 4})))
            .unwrap();
        relay
            .apply(Some(&json!({"enable": true, "gpio": 6})))
            .unwrap();

        assert!(!gpio.is_configured(4));
        assert!(gpio.is_configured(6));
        assert_eq!(relay.status()["gpio"], 6);
    }

    #[test]
    fn test_out_of_range_gpio_rejected() {
        let (_, relay) = relay();
        assert!(matches!(
            relay.apply(Some(&json!({"enable": true, "gpio": 99}))),
            Err(ModuleError::InvalidArgument(_))
        ));
        assert_eq!(relay.status()["enabled"], false);
    }

    #[test]
    fn test_disable_reports_off_when_release_fails() {
        let relay = Relay::new(Arc::new(StuckGpio(SimGpio::new())));
        relay
            .apply(Some(&json!({"enable": true, "gpio": 4, "default_on": true})))
            .unwrap();

        assert!(matches!(
            relay.apply(Some(&json!({"enable": false}))),
            Err(ModuleError::Hardware(_))
        ));
        assert_eq!(
            relay.status(),
            json!({"enabled": false, "gpio": null, "active_level": 1, "state": false})
        );
        assert!(!relay.is_on());
    }
}
