//! Appliance firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== Appliance firmware starting ===");

    let _appliance = match boot() {
        Ok(appliance) => appliance,
        Err(e) => {
            log::error!("Boot failed: {}", e);
            halt();
        }
    };

    log::info!("Entering main loop...");
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(feature = "esp32")]
fn boot() -> Result<modhub_esp32::Appliance, Box<dyn std::error::Error>> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use modhub_esp32::bridge::UnimplementedBridge;
    use modhub_esp32::hal::{EspGpio, EspInputPin, EspPwm};
    use modhub_esp32::network::WifiNetwork;
    use modhub_esp32::storage::NvsStore;
    use modhub_esp32::system::EspSystem;
    use modhub_esp32::{Appliance, Platform, RuntimeSettings};
    use std::sync::Arc;

    let settings = RuntimeSettings::default();
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let platform = Platform {
        kv: Arc::new(NvsStore::new()?),
        gpio: Arc::new(EspGpio::new()),
        pwm: Arc::new(EspPwm::new()),
        network: Box::new(WifiNetwork::new(peripherals.modem, sysloop)?),
        reset_input: Box::new(EspInputPin::new(settings.reset_gpio)?),
        system: Arc::new(EspSystem),
        bridge: Box::new(UnimplementedBridge),
    };
    Ok(Appliance::boot(platform, &settings)?)
}

/// Park the main task after a fatal boot error.
#[cfg(feature = "esp32")]
fn halt() -> ! {
    loop {
        std::thread::sleep(std::time::Duration::from_secs(3600));
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-device' to run on the host.");
}
