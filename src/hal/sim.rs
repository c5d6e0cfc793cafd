//! Simulated hardware.
//!
//! Each driver records what it was asked to do behind a shared lock, so a
//! test can hand a clone to the code under test and inspect the result.

use super::{GpioDriver, HalError, InputPin, PwmDriver, MAX_GPIO};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn check_pin(pin: u32) -> Result<(), HalError> {
    if pin > MAX_GPIO {
        return Err(HalError::InvalidPin(pin));
    }
    Ok(())
}

/// Output pin as seen by [`SimGpio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinState {
    pub high: bool,
}

/// Recording GPIO driver.
#[derive(Debug, Clone, Default)]
pub struct SimGpio {
    pins: Arc<Mutex<HashMap<u32, SimPinState>>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level of a configured output, `None` if the pin is not configured.
    pub fn level(&self, pin: u32) -> Option<bool> {
        lock(&self.pins).get(&pin).map(|p| p.high)
    }

    /// Whether `pin` is currently configured as an output.
    pub fn is_configured(&self, pin: u32) -> bool {
        lock(&self.pins).contains_key(&pin)
    }
}

impl GpioDriver for SimGpio {
    fn configure_output(&self, pin: u32) -> Result<(), HalError> {
        check_pin(pin)?;
        lock(&self.pins)
            .entry(pin)
            .or_insert(SimPinState { high: false });
        debug!("sim: GPIO{} output", pin);
        Ok(())
    }

    fn set_level(&self, pin: u32, high: bool) -> Result<(), HalError> {
        match lock(&self.pins).get_mut(&pin) {
            Some(state) => {
                state.high = high;
                Ok(())
            }
            None => Err(HalError::Driver(format!("GPIO{} not configured", pin))),
        }
    }

    fn release(&self, pin: u32) -> Result<(), HalError> {
        lock(&self.pins).remove(&pin);
        debug!("sim: GPIO{} released", pin);
        Ok(())
    }
}

/// Channel as seen by [`SimPwm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPwmState {
    pub pin: u32,
    pub freq_hz: u32,
    pub res_bits: u32,
    pub raw_duty: u32,
}

/// Recording single-channel PWM driver.
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    channel: Arc<Mutex<Option<SimPwmState>>>,
}

impl SimPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current channel state, `None` when stopped.
    pub fn state(&self) -> Option<SimPwmState> {
        *lock(&self.channel)
    }
}

impl PwmDriver for SimPwm {
    fn configure(&self, pin: u32, freq_hz: u32, res_bits: u32) -> Result<(), HalError> {
        check_pin(pin)?;
        if freq_hz == 0 || !(1..=14).contains(&res_bits) {
            return Err(HalError::InvalidConfig(format!(
                "{} Hz / {} bits",
                freq_hz, res_bits
            )));
        }
        let mut channel = lock(&self.channel);
        let raw_duty = channel.map_or(0, |c| c.raw_duty);
        *channel = Some(SimPwmState {
            pin,
            freq_hz,
            res_bits,
            raw_duty,
        });
        Ok(())
    }

    fn set_duty(&self, raw: u32) -> Result<(), HalError> {
        match lock(&self.channel).as_mut() {
            Some(state) => {
                state.raw_duty = raw;
                Ok(())
            }
            None => Err(HalError::Driver("PWM channel not configured".into())),
        }
    }

    fn stop(&self) -> Result<(), HalError> {
        *lock(&self.channel) = None;
        Ok(())
    }
}

/// Input pin driven by the test.
#[derive(Debug, Clone, Default)]
pub struct SimInput {
    high: Arc<AtomicBool>,
}

impl SimInput {
    /// Create an input reading `high`.
    pub fn new(high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(high)),
        }
    }

    /// Change the level seen by readers.
    pub fn set_high(&self, high: bool) {
        self.high.store(high, Ordering::SeqCst);
    }
}

impl InputPin for SimInput {
    fn is_high(&self) -> Result<bool, HalError> {
        Ok(self.high.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_gpio_lifecycle() {
        let gpio = SimGpio::new();
        assert!(gpio.set_level(4, true).is_err());

        gpio.configure_output(4).unwrap();
        gpio.set_level(4, true).unwrap();
        assert_eq!(gpio.level(4), Some(true));

        gpio.release(4).unwrap();
        assert!(!gpio.is_configured(4));
        assert_eq!(
            gpio.configure_output(MAX_GPIO + 1),
            Err(HalError::InvalidPin(MAX_GPIO + 1))
        );
    }

    #[test]
    fn test_sim_pwm_keeps_duty_across_reconfigure() {
        let pwm = SimPwm::new();
        pwm.configure(5, 1000, 8).unwrap();
        pwm.set_duty(128).unwrap();
        pwm.configure(5, 2000, 8).unwrap();

        let state = pwm.state().unwrap();
        assert_eq!(state.freq_hz, 2000);
        assert_eq!(state.raw_duty, 128);

        pwm.stop().unwrap();
        assert!(pwm.state().is_none());
        assert!(pwm.configure(5, 0, 8).is_err());
    }

    #[test]
    fn test_sim_input_shared_level() {
        let input = SimInput::new(true);
        let reader = input.clone();
        input.set_high(false);
        assert!(!reader.is_high().unwrap());
    }
}
