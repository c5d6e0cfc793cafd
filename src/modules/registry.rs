//! Fixed table of modules.

use super::{LedStrip, Module, ModuleError, ModuleKind, Pwm, Relay};
use crate::config::ConfigDocument;
use crate::device_state::DeviceState;
use crate::hal::{GpioDriver, PwmDriver};
use log::{info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Owns one instance of every module and keeps [`DeviceState`] in step with them.
pub struct ModuleRegistry {
    relay: Relay,
    pwm: Pwm,
    led_strip: LedStrip,
    device: Arc<DeviceState>,
}

impl ModuleRegistry {
    pub fn new(
        gpio: Arc<dyn GpioDriver>,
        pwm: Arc<dyn PwmDriver>,
        device: Arc<DeviceState>,
    ) -> Self {
        Self {
            relay: Relay::new(gpio),
            pwm: Pwm::new(pwm),
            led_strip: LedStrip::new(),
            device,
        }
    }

    /// The module implementing `kind`.
    pub fn module(&self, kind: ModuleKind) -> &dyn Module {
        match kind {
            ModuleKind::Relay => &self.relay,
            ModuleKind::Pwm => &self.pwm,
            ModuleKind::LedStrip => &self.led_strip,
        }
    }

    /// Every module in apply order: relay, pwm, ws2812.
    fn modules(&self) -> [&dyn Module; 3] {
        [&self.relay, &self.pwm, &self.led_strip]
    }

    /// Apply one module's fragment from `doc`.
    pub fn apply(&self, kind: ModuleKind, doc: &ConfigDocument) -> Result<(), ModuleError> {
        let result = self.module(kind).apply(doc.module_fragment(kind.name()));
        self.sync_device_state(kind);
        result
    }

    /// Apply every module's fragment in fixed order.
    ///
    /// Every module is attempted; the first failure is returned.
    pub fn apply_all(&self, doc: &ConfigDocument) -> Result<(), ModuleError> {
        let mut first_err = None;
        for kind in self.modules().map(|m| m.kind()) {
            if let Err(e) = self.apply(kind, doc) {
                warn!("Failed to apply module '{}': {}", kind, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                info!("Modules applied");
                Ok(())
            }
        }
    }

    /// Status of every module keyed by name.
    pub fn status_all(&self) -> Value {
        let map: Map<String, Value> = self
            .modules()
            .iter()
            .map(|m| (m.kind().name().to_string(), m.status()))
            .collect();
        Value::Object(map)
    }

    /// Run an action on the module named `name` (aliases accepted).
    pub fn action(&self, name: &str, request: &Value) -> Result<Value, ModuleError> {
        let kind: ModuleKind = name.parse()?;
        let status = self.module(kind).action(request)?;
        self.sync_device_state(kind);
        Ok(status)
    }

    fn sync_device_state(&self, kind: ModuleKind) {
        match kind {
            ModuleKind::Relay => self.device.set_relay(self.relay.is_on()),
            ModuleKind::Pwm => self.device.set_level(self.pwm.duty()),
            ModuleKind::LedStrip => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{SimGpio, SimPwm};
    use serde_json::json;

    fn registry() -> (Arc<DeviceState>, ModuleRegistry) {
        let device = Arc::new(DeviceState::new());
        let registry = ModuleRegistry::new(
            Arc::new(SimGpio::new()),
            Arc::new(SimPwm::new()),
            device.clone(),
        );
        (device, registry)
    }

    #[test]
    fn test_module_table_matches_kinds() {
        let (_, registry) = registry();
        for kind in ModuleKind::ALL {
            assert_eq!(registry.module(kind).kind(), kind);
        }
        let order: Vec<ModuleKind> = registry.modules().map(|m| m.kind()).to_vec();
        assert_eq!(order, ModuleKind::ALL.to_vec());
    }

    #[test]
    fn test_default_document_applies_cleanly() {
        let (_, registry) = registry();
        registry
            .apply_all(&ConfigDocument::builtin_default())
            .unwrap();

        let status = registry.status_all();
        for kind in ModuleKind::ALL {
            assert_eq!(status[kind.name()]["enabled"], false);
        }
    }

    #[test]
    fn test_unknown_module_is_not_found() {
        let (_, registry) = registry();
        assert_eq!(
            registry.action("servo", &json!({"set": true})),
            Err(ModuleError::NotFound("servo".into()))
        );
    }

    #[test]
    fn test_alias_resolves_to_led_strip() {
        let (_, registry) = registry();
        let doc = ConfigDocument::from_value(json!({"modules": {"ws2812": {"enable": true}}}))
            .unwrap();
        registry.apply_all(&doc).unwrap();

        let status = registry
            .action("led-strip", &json!({"effect": "rainbow"}))
            .unwrap();
        assert_eq!(status["effect"], "rainbow");
    }

    #[test]
    fn test_apply_all_continues_after_failure() {
        let (_, registry) = registry();
        let doc = ConfigDocument::from_value(json!({
            "modules": {
                "relay": {"enable": true, "gpio": 120},
                "pwm": {"enable": true, "duty": 25}
            }
        }))
        .unwrap();

        assert!(matches!(
            registry.apply_all(&doc),
            Err(ModuleError::InvalidArgument(_))
        ));
        let status = registry.status_all();
        assert_eq!(status["relay"]["enabled"], false);
        assert_eq!(status["pwm"]["enabled"], true);
        assert_eq!(status["pwm"]["duty"], 25);
    }

    #[test]
    fn test_device_state_follows_modules() {
        let (device, registry) = registry();
        let doc = ConfigDocument::from_value(json!({
            "modules": {
                "relay": {"enable": true, "default_on": true},
                "pwm": {"enable": true, "duty": 60}
            }
        }))
        .unwrap();
        registry.apply_all(&doc).unwrap();
        assert!(device.get().relay_on);
        assert_eq!(device.get().level, 60);

        registry.action("relay", &json!({"toggle": true})).unwrap();
        registry.action("pwm", &json!({"duty": 10})).unwrap();
        assert!(!device.get().relay_on);
        assert_eq!(device.get().level, 10);
    }

    #[test]
    fn test_empty_action_is_invalid_argument() {
        let (_, registry) = registry();
        let doc = ConfigDocument::from_value(json!({
            "modules": {
                "relay": {"enable": true},
                "pwm": {"enable": true},
                "ws2812": {"enable": true}
            }
        }))
        .unwrap();
        registry.apply_all(&doc).unwrap();

        for kind in ModuleKind::ALL {
            assert!(matches!(
                registry.action(kind.name(), &json!({})),
                Err(ModuleError::InvalidArgument(_))
            ));
        }
    }
}
