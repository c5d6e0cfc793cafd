fn main() {
    // The ESP-IDF environment is only needed for ESP32 targets; host builds
    // (tests, host-device) skip it. Build scripts run on the host, so look at TARGET.
    if let Ok(target) = std::env::var("TARGET") {
        if target.ends_with("-espidf") {
            embuild::espidf::sysenv::output();
        }
    }
}
