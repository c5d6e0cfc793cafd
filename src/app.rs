//! Boot orchestration.
//!
//! [`Appliance::boot`] wires the platform collaborators into the control
//! plane and starts the background tasks:
//!
//! 1. load the configuration (never fails)
//! 2. start the network identity (fatal)
//! 3. in access-point mode, start the captive DNS responder (fatal)
//! 4. apply the configuration to the modules (logged)
//! 5. arm the reset button
//! 6. start the HTTP control API (fatal)
//! 7. start the protocol bridge (logged)
//!
//! The returned [`Appliance`] owns every piece of state; dropping it stops
//! the tasks.

use crate::api::{ControlApi, HttpServer};
use crate::bridge::DeviceBridge;
use crate::config::ConfigStore;
use crate::device_state::DeviceState;
use crate::dns::CaptiveDns;
use crate::hal::{GpioDriver, InputPin, PwmDriver};
use crate::modules::ModuleRegistry;
use crate::network::{NetworkBootstrap, NetworkDriver, NetworkError};
use crate::reset::{ButtonWatcher, FactoryReset};
use crate::settings::RuntimeSettings;
use crate::storage::KvStore;
use crate::system::SystemControl;
use log::{error, info, warn};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Platform collaborators handed to [`Appliance::boot`].
pub struct Platform {
    pub kv: Arc<dyn KvStore>,
    pub gpio: Arc<dyn GpioDriver>,
    pub pwm: Arc<dyn PwmDriver>,
    pub network: Box<dyn NetworkDriver>,
    pub reset_input: Box<dyn InputPin>,
    pub system: Arc<dyn SystemControl>,
    pub bridge: Box<dyn DeviceBridge>,
}

/// Fatal boot failures.
#[derive(Debug)]
pub enum BootError {
    /// Network identity could not be started.
    Network(NetworkError),
    /// Captive DNS port could not be bound.
    Dns(io::Error),
    /// HTTP port could not be bound.
    Http(io::Error),
    /// A background task could not be spawned.
    Task(io::Error),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network start failed: {}", e),
            Self::Dns(e) => write!(f, "captive DNS failed: {}", e),
            Self::Http(e) => write!(f, "HTTP server failed: {}", e),
            Self::Task(e) => write!(f, "task spawn failed: {}", e),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Dns(e) | Self::Http(e) | Self::Task(e) => Some(e),
        }
    }
}

impl From<NetworkError> for BootError {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

/// The running device.
pub struct Appliance {
    store: Arc<ConfigStore>,
    registry: Arc<ModuleRegistry>,
    device: Arc<DeviceState>,
    network: NetworkBootstrap,
    api: Arc<ControlApi>,
    http: HttpServer,
    dns: Option<CaptiveDns>,
    _button: ButtonWatcher,
    // Kept alive: dropping the driver tears the radio down
    _network_driver: Box<dyn NetworkDriver>,
    _bridge: Box<dyn DeviceBridge>,
}

impl Appliance {
    /// Bring the device up. See the module docs for the order.
    pub fn boot(platform: Platform, settings: &RuntimeSettings) -> Result<Self, BootError> {
        let Platform {
            kv,
            gpio,
            pwm,
            network: mut network_driver,
            reset_input,
            system,
            mut bridge,
        } = platform;

        let store = Arc::new(ConfigStore::new(kv));
        let doc = store.load_or_default();

        let network = NetworkBootstrap::start(&doc, network_driver.as_mut()).map_err(|e| {
            error!("Network start failed: {}", e);
            BootError::Network(e)
        })?;

        let dns = match network.ap_address() {
            Some(addr) if network.is_access_point() => Some(
                CaptiveDns::start(None, settings.dns_port, addr).map_err(|e| {
                    error!("Captive DNS bind failed: {}", e);
                    BootError::Dns(e)
                })?,
            ),
            _ => None,
        };

        let device = Arc::new(DeviceState::new());
        let registry = Arc::new(ModuleRegistry::new(gpio, pwm, device.clone()));
        if let Err(e) = registry.apply_all(&doc) {
            warn!("Boot apply incomplete: {}", e);
        }

        let reset = Arc::new(FactoryReset::new(
            store.clone(),
            system,
            settings.restart_grace,
        ));
        let button = ButtonWatcher::start(reset_input, settings.button_config(), reset.clone())
            .map_err(BootError::Task)?;

        let api = Arc::new(ControlApi::new(
            store.clone(),
            registry.clone(),
            device.clone(),
            network.clone(),
            reset,
        ));
        let http = HttpServer::start(None, settings.http_port, api.clone()).map_err(|e| {
            error!("HTTP bind failed: {}", e);
            BootError::Http(e)
        })?;

        match bridge.start() {
            Ok(()) => info!("Bridge '{}' started", bridge.name()),
            Err(e) => warn!("Bridge '{}' not started: {}", bridge.name(), e),
        }

        info!(
            "Boot complete: {} mode, API on port {}",
            network.mode().label(),
            http.local_addr().port()
        );

        Ok(Self {
            store,
            registry,
            device,
            network,
            api,
            http,
            dns,
            _button: button,
            _network_driver: network_driver,
            _bridge: bridge,
        })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn device(&self) -> &Arc<DeviceState> {
        &self.device
    }

    pub fn network(&self) -> &NetworkBootstrap {
        &self.network
    }

    pub fn api(&self) -> &Arc<ControlApi> {
        &self.api
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http.local_addr()
    }

    /// Captive DNS address; `None` in client mode.
    pub fn dns_addr(&self) -> Option<SocketAddr> {
        self.dns.as_ref().map(CaptiveDns::local_addr)
    }

    /// Address clients reach the API on in access-point mode.
    pub fn portal_ip(&self) -> Option<IpAddr> {
        self.network.ap_address().map(IpAddr::V4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiRequest;
    use crate::bridge::UnimplementedBridge;
    use crate::hal::sim::{SimGpio, SimInput, SimPwm};
    use crate::network::HostNetwork;
    use crate::storage::MemoryStore;
    use crate::system::SystemError;
    use serde_json::json;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::Duration;

    struct NoRestart;

    impl SystemControl for NoRestart {
        fn erase_network_credentials(&self) -> Result<(), SystemError> {
            Ok(())
        }

        fn restart(&self) {}
    }

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            http_port: 0,
            dns_port: 0,
            ap_address: Ipv4Addr::LOCALHOST,
            ..Default::default()
        }
    }

    fn platform(kv: Arc<MemoryStore>, gpio: Arc<SimGpio>) -> Platform {
        Platform {
            kv,
            gpio,
            pwm: Arc::new(SimPwm::new()),
            network: Box::new(HostNetwork::new(Ipv4Addr::LOCALHOST)),
            reset_input: Box::new(SimInput::new(true)),
            system: Arc::new(NoRestart),
            bridge: Box::new(UnimplementedBridge),
        }
    }

    fn seeded(doc: serde_json::Value) -> Arc<MemoryStore> {
        let kv = Arc::new(MemoryStore::new());
        ConfigStore::new(kv.clone()).set_and_save(doc).unwrap();
        kv
    }

    #[test]
    fn test_first_boot_runs_access_point_with_dns() {
        let kv = Arc::new(MemoryStore::new());
        let app = Appliance::boot(platform(kv, Arc::new(SimGpio::new())), &settings()).unwrap();

        assert!(app.network().is_access_point());
        assert!(app.dns_addr().is_some());
        assert_ne!(app.http_addr().port(), 0);
        assert_eq!(app.portal_ip(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(app.store().get().hostname(), "esp32-c3");
    }

    #[test]
    fn test_client_boot_skips_dns_and_applies_modules() {
        let kv = seeded(json!({
            "net": {"sta": {"ssid": "home", "pass": "x"}},
            "modules": {"relay": {"enable": true, "gpio": 4, "default_on": true}}
        }));
        let gpio = Arc::new(SimGpio::new());
        let app = Appliance::boot(platform(kv, gpio.clone()), &settings()).unwrap();

        assert!(!app.network().is_access_point());
        assert!(app.dns_addr().is_none());
        assert!(app.device().get().relay_on);
        assert_eq!(gpio.level(4), Some(true));
    }

    #[test]
    fn test_apply_failure_is_not_fatal() {
        let kv = seeded(json!({
            "modules": {
                "relay": {"enable": true, "gpio": 99},
                "pwm": {"enable": true, "duty": 40}
            }
        }));
        let app = Appliance::boot(platform(kv, Arc::new(SimGpio::new())), &settings()).unwrap();

        assert_eq!(app.device().get().level, 40);
        let status = app.registry().status_all();
        assert_eq!(status["pwm"]["enabled"], true);
    }

    #[test]
    fn test_dns_bind_conflict_aborts_boot() {
        let taken = UdpSocket::bind("0.0.0.0:0").unwrap();
        let settings = RuntimeSettings {
            dns_port: taken.local_addr().unwrap().port(),
            ..settings()
        };
        let kv = Arc::new(MemoryStore::new());
        let result = Appliance::boot(platform(kv, Arc::new(SimGpio::new())), &settings);
        assert!(matches!(result, Err(BootError::Dns(_))));
    }

    #[test]
    fn test_api_reaches_booted_state() {
        let kv = Arc::new(MemoryStore::new());
        let app = Appliance::boot(platform(kv, Arc::new(SimGpio::new())), &settings()).unwrap();

        let body = json!({"modules": {"pwm": {"enable": true, "duty": 25}}}).to_string();
        assert_eq!(
            app.api()
                .handle(&ApiRequest::post("/api/config", body))
                .status,
            200
        );
        assert_eq!(app.device().get().level, 0);

        app.api().handle(&ApiRequest::post("/api/apply", ""));
        assert_eq!(app.device().get().level, 25);

        // Dropping stops the tasks within their poll intervals
        let started = std::time::Instant::now();
        drop(app);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
