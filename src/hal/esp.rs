//! ESP-IDF GPIO and LEDC drivers.
//!
//! Pins are chosen at runtime from the configuration document, so these go
//! through the raw IDF calls instead of the typed `esp_idf_hal` pin drivers.

use super::{GpioDriver, HalError, InputPin, PwmDriver, MAX_GPIO};
use esp_idf_sys::{self as sys, esp, EspError};
use log::debug;
use std::sync::Mutex;

const LEDC_MODE: sys::ledc_mode_t = sys::ledc_mode_t_LEDC_LOW_SPEED_MODE;
const LEDC_TIMER: sys::ledc_timer_t = sys::ledc_timer_t_LEDC_TIMER_0;
const LEDC_CHANNEL: sys::ledc_channel_t = sys::ledc_channel_t_LEDC_CHANNEL_0;

impl From<EspError> for HalError {
    fn from(e: EspError) -> Self {
        Self::Driver(format!("{:?}", e))
    }
}

fn gpio_num(pin: u32) -> Result<sys::gpio_num_t, HalError> {
    if pin > MAX_GPIO {
        return Err(HalError::InvalidPin(pin));
    }
    Ok(pin as sys::gpio_num_t)
}

/// GPIO outputs through `gpio_set_direction` / `gpio_set_level`.
#[derive(Debug, Default)]
pub struct EspGpio;

impl EspGpio {
    pub fn new() -> Self {
        Self
    }
}

impl GpioDriver for EspGpio {
    fn configure_output(&self, pin: u32) -> Result<(), HalError> {
        let num = gpio_num(pin)?;
        // SAFETY: plain register configuration for a validated pin number.
        esp!(unsafe { sys::gpio_reset_pin(num) })?;
        esp!(unsafe { sys::gpio_set_direction(num, sys::gpio_mode_t_GPIO_MODE_OUTPUT) })?;
        debug!("GPIO{} configured as output", pin);
        Ok(())
    }

    fn set_level(&self, pin: u32, high: bool) -> Result<(), HalError> {
        let num = gpio_num(pin)?;
        esp!(unsafe { sys::gpio_set_level(num, high as u32) })?;
        Ok(())
    }

    fn release(&self, pin: u32) -> Result<(), HalError> {
        let num = gpio_num(pin)?;
        esp!(unsafe { sys::gpio_reset_pin(num) })?;
        debug!("GPIO{} released", pin);
        Ok(())
    }
}

/// LEDC channel 0 on timer 0, low-speed mode.
#[derive(Debug, Default)]
pub struct EspPwm {
    /// Pin currently bound to the channel.
    pin: Mutex<Option<u32>>,
}

impl EspPwm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PwmDriver for EspPwm {
    fn configure(&self, pin: u32, freq_hz: u32, res_bits: u32) -> Result<(), HalError> {
        let num = gpio_num(pin)?;
        if freq_hz == 0 || !(1..=14).contains(&res_bits) {
            return Err(HalError::InvalidConfig(format!(
                "{} Hz / {} bits",
                freq_hz, res_bits
            )));
        }

        let timer = sys::ledc_timer_config_t {
            speed_mode: LEDC_MODE,
            duty_resolution: res_bits as sys::ledc_timer_bit_t,
            timer_num: LEDC_TIMER,
            freq_hz,
            ..Default::default()
        };
        // SAFETY: the config structs live across the calls that read them.
        esp!(unsafe { sys::ledc_timer_config(&timer) })
            .map_err(|e| HalError::InvalidConfig(format!("LEDC timer: {:?}", e)))?;

        let channel = sys::ledc_channel_config_t {
            gpio_num: num,
            speed_mode: LEDC_MODE,
            channel: LEDC_CHANNEL,
            intr_type: sys::ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: LEDC_TIMER,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        esp!(unsafe { sys::ledc_channel_config(&channel) })?;

        let mut bound = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = bound.replace(pin) {
            if prev != pin {
                esp!(unsafe { sys::gpio_reset_pin(gpio_num(prev)?) })?;
            }
        }
        debug!("LEDC bound to GPIO{} at {} Hz / {} bits", pin, freq_hz, res_bits);
        Ok(())
    }

    fn set_duty(&self, raw: u32) -> Result<(), HalError> {
        esp!(unsafe { sys::ledc_set_duty(LEDC_MODE, LEDC_CHANNEL, raw) })?;
        esp!(unsafe { sys::ledc_update_duty(LEDC_MODE, LEDC_CHANNEL) })?;
        Ok(())
    }

    fn stop(&self) -> Result<(), HalError> {
        let mut bound = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pin) = bound.take() {
            esp!(unsafe { sys::ledc_stop(LEDC_MODE, LEDC_CHANNEL, 0) })?;
            esp!(unsafe { sys::gpio_reset_pin(gpio_num(pin)?) })?;
        }
        Ok(())
    }
}

/// GPIO input with the internal pull-up enabled.
#[derive(Debug)]
pub struct EspInputPin {
    num: sys::gpio_num_t,
}

impl EspInputPin {
    pub fn new(pin: u32) -> Result<Self, HalError> {
        let num = gpio_num(pin)?;
        esp!(unsafe { sys::gpio_reset_pin(num) })?;
        esp!(unsafe { sys::gpio_set_direction(num, sys::gpio_mode_t_GPIO_MODE_INPUT) })?;
        esp!(unsafe { sys::gpio_set_pull_mode(num, sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY) })?;
        Ok(Self { num })
    }
}

impl InputPin for EspInputPin {
    fn is_high(&self) -> Result<bool, HalError> {
        Ok(unsafe { sys::gpio_get_level(self.num) } != 0)
    }
}
