//! Host-based appliance for development and testing.
//!
//! Runs the whole control plane on the host machine: configuration in a
//! file-backed store, simulated GPIO/PWM and reset button, and the OS network
//! stack. The HTTP API listens on `MODHUB_HTTP_PORT` and, in access-point
//! mode, captive DNS on `MODHUB_DNS_PORT`.
//!
//! # Usage
//!
//! ```bash
//! MODHUB_HTTP_PORT=8080 MODHUB_DNS_PORT=5353 cargo run --bin host-device
//! ```

use log::{error, info};
use modhub_esp32::bridge::UnimplementedBridge;
use modhub_esp32::hal::sim::{SimGpio, SimInput, SimPwm};
use modhub_esp32::network::HostNetwork;
use modhub_esp32::system::HostSystem;
use modhub_esp32::{Appliance, FileStore, Platform, RuntimeSettings};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== Host appliance starting ===");

    let settings = RuntimeSettings::from_env();
    let data_dir = match settings.data_dir.clone() {
        Some(dir) => dir,
        None => match FileStore::default_root() {
            Ok(dir) => dir,
            Err(e) => {
                error!("No data directory: {}", e);
                std::process::exit(1);
            }
        },
    };

    // Idle level for an active-low button is high
    let reset_input = SimInput::new(settings.reset_active_low);

    let store = FileStore::new(data_dir);
    info!("Configuration stored under {}", store.root().display());

    let platform = Platform {
        kv: Arc::new(store),
        gpio: Arc::new(SimGpio::new()),
        pwm: Arc::new(SimPwm::new()),
        network: Box::new(HostNetwork::new(settings.ap_address)),
        reset_input: Box::new(reset_input),
        system: Arc::new(HostSystem),
        bridge: Box::new(UnimplementedBridge),
    };

    let appliance = match Appliance::boot(platform, &settings) {
        Ok(appliance) => appliance,
        Err(e) => {
            error!("Boot failed: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Control API at http://localhost:{}/ ({} mode)",
        appliance.http_addr().port(),
        appliance.network().mode().label()
    );
    if let Some(addr) = appliance.dns_addr() {
        info!("Captive DNS on {}", addr);
    }

    info!("Entering main loop (Ctrl+C to exit)...");
    let mut heartbeat_counter = 0u64;
    loop {
        std::thread::sleep(Duration::from_secs(30));
        heartbeat_counter += 1;
        let state = appliance.device().get();
        info!(
            "Heartbeat #{} - relay {}, level {}%",
            heartbeat_counter,
            if state.relay_on { "on" } else { "off" },
            state.level
        );
    }
}
