//! Addressable LED strip (WS2812).
//!
//! Only stores and reports its configuration; nothing is transmitted to the
//! strip, so `status` carries `"stub": true`.

use super::{bool_field, clamped, gpio_field, int_field, str_field, Module, ModuleError, ModuleKind};
use log::info;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};

const DEFAULT_GPIO: u32 = 8;
const DEFAULT_COUNT: i64 = 30;
const MAX_COUNT: i64 = 1024;
const DEFAULT_BRIGHTNESS: i64 = 50;
const DEFAULT_EFFECT: &str = "solid";
/// Longest effect name kept.
const MAX_EFFECT_LEN: usize = 15;

#[derive(Debug, Clone)]
struct StripState {
    enabled: bool,
    gpio: Option<u32>,
    count: u16,
    brightness: u8,
    effect: String,
}

impl StripState {
    fn off() -> Self {
        Self {
            enabled: false,
            gpio: None,
            count: 0,
            brightness: 0,
            effect: DEFAULT_EFFECT.to_string(),
        }
    }
}

fn effect_name(name: &str) -> String {
    name.chars().take(MAX_EFFECT_LEN).collect()
}

/// LED strip module.
pub struct LedStrip {
    state: Mutex<StripState>,
}

impl LedStrip {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StripState::off()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StripState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LedStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for LedStrip {
    fn kind(&self) -> ModuleKind {
        ModuleKind::LedStrip
    }

    fn apply(&self, fragment: Option<&Value>) -> Result<(), ModuleError> {
        let mut state = self.lock();

        if !bool_field(fragment, "enable", false) {
            if state.enabled {
                info!("ws2812 disabled");
            }
            *state = StripState::off();
            return Ok(());
        }

        *state = StripState {
            enabled: true,
            gpio: Some(gpio_field(fragment, DEFAULT_GPIO)?),
            count: clamped(fragment, "count", DEFAULT_COUNT, 1, MAX_COUNT) as u16,
            brightness: clamped(fragment, "brightness", DEFAULT_BRIGHTNESS, 0, 100) as u8,
            effect: effect_name(str_field(fragment, "effect").unwrap_or(DEFAULT_EFFECT)),
        };
        info!(
            "ws2812 enabled gpio={:?} count={} brightness={} effect={}",
            state.gpio, state.count, state.brightness, state.effect
        );
        Ok(())
    }

    fn status(&self) -> Value {
        let state = self.lock();
        json!({
            "enabled": state.enabled,
            "gpio": state.gpio,
            "count": state.count,
            "brightness": state.brightness,
            "effect": state.effect,
            "stub": true,
        })
    }

    fn action(&self, request: &Value) -> Result<Value, ModuleError> {
        {
            let mut state = self.lock();
            if !state.enabled {
                return Err(ModuleError::Disabled(ModuleKind::LedStrip));
            }

            let effect = str_field(Some(request), "effect");
            let brightness = int_field(Some(request), "brightness");
            if effect.is_none() && brightness.is_none() {
                return Err(ModuleError::InvalidArgument(
                    "expected \"effect\" and/or \"brightness\"".into(),
                ));
            }

            if let Some(effect) = effect {
                state.effect = effect_name(effect);
            }
            if let Some(brightness) = brightness {
                state.brightness = brightness.clamp(0, 100) as u8;
            }
            info!(
                "ws2812 action brightness={} effect={}",
                state.brightness, state.effect
            );
        }
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps_values() {
        let strip = LedStrip::new();
        strip
            .apply(Some(&json!({
                "enable": true, "count": 5000, "brightness": 140,
                "effect": "a-very-long-effect-name"
            })))
            .unwrap();

        let status = strip.status();
        assert_eq!(status["count"], 1024);
        assert_eq!(status["brightness"], 100);
        assert_eq!(status["effect"], "a-very-long-eff");
        assert_eq!(status["gpio"], 8);

        strip
            .apply(Some(&json!({"enable": true, "count": 0})))
            .unwrap();
        assert_eq!(strip.status()["count"], 1);
    }

    #[test]
    fn test_disabled_form() {
        let strip = LedStrip::new();
        strip
            .apply(Some(&json!({"enable": true, "effect": "rainbow"})))
            .unwrap();
        strip.apply(Some(&json!({"enable": false}))).unwrap();

        assert_eq!(
            strip.status(),
            json!({
                "enabled": false, "gpio": null, "count": 0, "brightness": 0,
                "effect": "solid", "stub": true
            })
        );
    }

    #[test]
    fn test_action() {
        let strip = LedStrip::new();
        assert_eq!(
            strip.action(&json!({"effect": "rainbow"})),
            Err(ModuleError::Disabled(ModuleKind::LedStrip))
        );

        strip.apply(Some(&json!({"enable": true}))).unwrap();
        let status = strip
            .action(&json!({"effect": "rainbow", "brightness": -3}))
            .unwrap();
        assert_eq!(status["effect"], "rainbow");
        assert_eq!(status["brightness"], 0);

        assert!(matches!(
            strip.action(&json!({})),
            Err(ModuleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let strip = LedStrip::new();
        let frag = json!({"enable": true, "gpio": 3, "count": 60, "brightness": 20, "effect": "fade"});
        strip.apply(Some(&frag)).unwrap();
        let first = strip.status();
        strip.apply(Some(&frag)).unwrap();
        assert_eq!(strip.status(), first);

        strip.apply(Some(&json!({"enable": false}))).unwrap();
        let disabled = strip.status();
        strip.apply(Some(&json!({"enable": false}))).unwrap();
        assert_eq!(strip.status(), disabled);
    }
}
