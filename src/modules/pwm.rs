//! PWM output on one LEDC channel.
//!
//! Fragment: `{enable, gpio = 5, freq = 20000, res_bits = 10, duty = 0}`, duty in
//! percent. Action: `{"duty": 0..100}` and/or `{"freq": hz}`.

use super::{bool_field, clamped, gpio_field, int_field, Module, ModuleError, ModuleKind};
use crate::hal::PwmDriver;
use log::info;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_GPIO: u32 = 5;
const DEFAULT_FREQ: i64 = 20_000;
const DEFAULT_RES_BITS: i64 = 10;
const MAX_RES_BITS: i64 = 14;

#[derive(Debug, Clone, Copy)]
struct PwmState {
    enabled: bool,
    gpio: Option<u32>,
    freq: u32,
    res_bits: u32,
    duty: u8,
}

impl PwmState {
    /// Quiescent form reported while disabled.
    const OFF: Self = Self {
        enabled: false,
        gpio: None,
        freq: DEFAULT_FREQ as u32,
        res_bits: DEFAULT_RES_BITS as u32,
        duty: 0,
    };

    /// Raw channel duty for the current percentage and resolution.
    fn raw_duty(&self) -> u32 {
        let max = (1u32 << self.res_bits) - 1;
        max * u32::from(self.duty) / 100
    }
}

/// PWM module.
pub struct Pwm {
    driver: Arc<dyn PwmDriver>,
    state: Mutex<PwmState>,
}

impl Pwm {
    pub fn new(driver: Arc<dyn PwmDriver>) -> Self {
        Self {
            driver,
            state: Mutex::new(PwmState::OFF),
        }
    }

    /// Current duty in percent.
    pub fn duty(&self) -> u8 {
        self.lock().duty
    }

    fn lock(&self) -> MutexGuard<'_, PwmState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn program(&self, state: &PwmState) -> Result<(), ModuleError> {
        if let Some(pin) = state.gpio {
            self.driver.configure(pin, state.freq, state.res_bits)?;
            self.driver.set_duty(state.raw_duty())?;
        }
        Ok(())
    }
}

impl Module for Pwm {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Pwm
    }

    fn apply(&self, fragment: Option<&Value>) -> Result<(), ModuleError> {
        let mut state = self.lock();

        if !bool_field(fragment, "enable", false) {
            let bound = state.gpio.is_some();
            *state = PwmState::OFF;
            if bound {
                self.driver.stop()?;
                info!("pwm disabled");
            }
            return Ok(());
        }

        let next = PwmState {
            enabled: true,
            gpio: Some(gpio_field(fragment, DEFAULT_GPIO)?),
            freq: clamped(fragment, "freq", DEFAULT_FREQ, 1, i64::from(u32::MAX)) as u32,
            res_bits: clamped(fragment, "res_bits", DEFAULT_RES_BITS, 1, MAX_RES_BITS) as u32,
            duty: clamped(fragment, "duty", 0, 0, 100) as u8,
        };

        if state.gpio.is_some_and(|prev| Some(prev) != next.gpio) {
            self.driver.stop()?;
            state.enabled = false;
            state.gpio = None;
        }

        self.program(&next)?;
        *state = next;

        info!(
            "pwm enabled gpio={:?} freq={} res_bits={} duty={}",
            next.gpio, next.freq, next.res_bits, next.duty
        );
        Ok(())
    }

    fn status(&self) -> Value {
        let state = *self.lock();
        json!({
            "enabled": state.enabled,
            "gpio": state.gpio,
            "freq": state.freq,
            "res_bits": state.res_bits,
            "duty": state.duty,
        })
    }

    fn action(&self, request: &Value) -> Result<Value, ModuleError> {
        {
            let mut state = self.lock();
            if !state.enabled {
                return Err(ModuleError::Disabled(ModuleKind::Pwm));
            }

            let duty = int_field(Some(request), "duty");
            let freq = int_field(Some(request), "freq");
            if duty.is_none() && freq.is_none() {
                return Err(ModuleError::InvalidArgument(
                    "expected \"duty\" and/or \"freq\"".into(),
                ));
            }

            let mut next = *state;
            if let Some(duty) = duty {
                next.duty = duty.clamp(0, 100) as u8;
            }
            if let Some(freq) = freq {
                next.freq = freq.clamp(1, i64::from(u32::MAX)) as u32;
            }
            self.program(&next)?;
            *state = next;
        }
        Ok(self.status())
    }
}
