//! ESP32 Wi-Fi network driver.
//!
//! Access-point mode waits for the AP netif before returning its address.
//! Client mode starts the station and returns immediately; a system event
//! subscription calls `esp_wifi_connect` on every disconnect, so reconnects
//! are immediate and unbounded.

use super::{Credentials, NetworkDriver, NetworkError, AP_MAX_CONNECTIONS};
use crate::storage::get_nvs_default_partition;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi, WifiEvent,
};
use log::{info, warn};
use std::net::Ipv4Addr;

/// Wi-Fi driver backed by `EspWifi`.
pub struct WifiNetwork {
    wifi: EspWifi<'static>,
    sysloop: EspSystemEventLoop,
    /// Keeps the reconnect handler registered.
    reconnect: Option<EspSubscription<'static, System>>,
}

impl WifiNetwork {
    /// Create the driver. Radio credentials are kept in the default NVS partition.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, NetworkError> {
        let nvs = get_nvs_default_partition()?;
        let wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        Ok(Self {
            wifi,
            sysloop,
            reconnect: None,
        })
    }

    fn auth_method(creds: &Credentials) -> AuthMethod {
        if creds.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        }
    }
}

impl NetworkDriver for WifiNetwork {
    fn start_access_point(
        &mut self,
        hostname: &str,
        creds: &Credentials,
    ) -> Result<Ipv4Addr, NetworkError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::StartFailure("AP SSID too long".into()))?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::StartFailure("AP password too long".into()))?,
            auth_method: Self::auth_method(creds),
            max_connections: AP_MAX_CONNECTIONS,
            channel: 1,
            ..Default::default()
        });

        if let Err(e) = self.wifi.ap_netif_mut().set_hostname(hostname) {
            warn!("Failed to set AP hostname: {:?}", e);
        }

        let mut wifi = BlockingWifi::wrap(&mut self.wifi, self.sysloop.clone())?;
        wifi.set_configuration(&config)?;
        wifi.start()?;
        wifi.wait_netif_up()?;

        let ip = wifi.wifi().ap_netif().get_ip_info()?.ip;
        info!("Wi-Fi AP '{}' started, IP {}", creds.ssid, ip);
        Ok(ip)
    }

    fn start_client(&mut self, hostname: &str, creds: &Credentials) -> Result<(), NetworkError> {
        let config = Configuration::Client(ClientConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::StartFailure("SSID too long".into()))?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::StartFailure("password too long".into()))?,
            auth_method: Self::auth_method(creds),
            ..Default::default()
        });

        if let Err(e) = self.wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("Failed to set STA hostname: {:?}", e);
        }

        self.reconnect = Some(self.sysloop.subscribe::<WifiEvent, _>(|event| {
            if matches!(event, WifiEvent::StaDisconnected { .. }) {
                info!("Wi-Fi disconnected, reconnecting");
                // SAFETY: the driver is started before this handler can fire.
                let err = unsafe { esp_idf_sys::esp_wifi_connect() };
                if err != esp_idf_sys::ESP_OK {
                    warn!("esp_wifi_connect failed: {}", err);
                }
            }
        })?);

        self.wifi.set_configuration(&config)?;
        self.wifi.start()?;
        self.wifi.connect()?;
        info!("Wi-Fi client connecting to '{}'", creds.ssid);
        Ok(())
    }
}
