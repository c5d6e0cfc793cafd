//! Network bootstrap.
//!
//! The mode is a pure function of the configuration document: a non-empty
//! `net.sta.ssid` selects [`NetworkMode::Client`], otherwise the device hosts
//! its own access point. The decision runs once per boot.
//!
//! Drivers:
//! - **ESP32** (`esp32` feature): [`WifiNetwork`], the ESP-IDF Wi-Fi driver
//! - **Host**: [`HostNetwork`], the OS network stack
//!
//! # Example
//!
//! ```
//! use modhub_esp32::config::ConfigDocument;
//! use modhub_esp32::network::{HostNetwork, NetworkBootstrap, NetworkMode};
//! use std::net::Ipv4Addr;
//!
//! let doc = ConfigDocument::builtin_default();
//! let mut driver = HostNetwork::new(Ipv4Addr::new(192, 168, 4, 1));
//! let network = NetworkBootstrap::start(&doc, &mut driver).unwrap();
//! assert_eq!(network.mode(), NetworkMode::AccessPoint);
//! ```

pub mod credentials;
mod host;
#[cfg(feature = "esp32")]
mod wifi;

pub use credentials::{CredentialError, Credentials};
pub use host::HostNetwork;
#[cfg(feature = "esp32")]
pub use wifi::WifiNetwork;

use crate::config::{ConfigDocument, DEFAULT_AP_PASS, DEFAULT_AP_SSID};
use log::info;
use std::fmt;
use std::net::Ipv4Addr;

/// Maximum stations the access point accepts.
pub const AP_MAX_CONNECTIONS: u16 = 4;

/// Network identity selected at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    AccessPoint,
    Client,
}

impl NetworkMode {
    /// Mode implied by `doc`.
    pub fn from_config(doc: &ConfigDocument) -> Self {
        match doc.str_at("/net/sta/ssid") {
            Some(ssid) if !ssid.is_empty() => Self::Client,
            _ => Self::AccessPoint,
        }
    }

    /// Short label used by the status endpoint.
    pub fn label(self) -> &'static str {
        match self {
            Self::AccessPoint => "AP",
            Self::Client => "STA",
        }
    }
}

/// Platform network bring-up.
pub trait NetworkDriver: Send {
    /// Host an access point; returns the device's address on it.
    fn start_access_point(
        &mut self,
        hostname: &str,
        creds: &Credentials,
    ) -> Result<Ipv4Addr, NetworkError>;

    /// Join an existing network, reconnecting indefinitely on disconnect.
    fn start_client(&mut self, hostname: &str, creds: &Credentials) -> Result<(), NetworkError>;
}

/// Outcome of the boot-time network decision.
#[derive(Debug, Clone)]
pub struct NetworkBootstrap {
    mode: NetworkMode,
    hostname: String,
    ap_ssid: String,
    sta_ssid: String,
    ap_address: Option<Ipv4Addr>,
}

impl NetworkBootstrap {
    /// Decide the mode from `doc` and start the matching identity.
    pub fn start(
        doc: &ConfigDocument,
        driver: &mut dyn NetworkDriver,
    ) -> Result<Self, NetworkError> {
        let mode = NetworkMode::from_config(doc);
        let hostname = doc.hostname().to_string();
        let ap_ssid = doc.str_at("/net/ap/ssid").unwrap_or(DEFAULT_AP_SSID);
        let sta_ssid = doc.str_at("/net/sta/ssid").unwrap_or("");
        info!("Network mode: {:?} (hostname {})", mode, hostname);

        let ap_address = match mode {
            NetworkMode::AccessPoint => {
                let pass = match doc.str_at("/net/ap/pass") {
                    Some(pass) => pass,
                    None if doc.pointer("/net/ap/ssid").is_none() => DEFAULT_AP_PASS,
                    None => "",
                };
                let creds = Credentials::new(ap_ssid, pass)?;
                let addr = driver.start_access_point(&hostname, &creds)?;
                info!("Access point '{}' up at {}", creds.ssid, addr);
                Some(addr)
            }
            NetworkMode::Client => {
                let creds =
                    Credentials::client(sta_ssid, doc.str_at("/net/sta/pass").unwrap_or(""))?;
                driver.start_client(&hostname, &creds)?;
                info!("Client started for '{}'", creds.ssid);
                None
            }
        };

        Ok(Self {
            mode,
            hostname,
            ap_ssid: ap_ssid.to_string(),
            sta_ssid: sta_ssid.to_string(),
            ap_address,
        })
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    pub fn is_access_point(&self) -> bool {
        self.mode == NetworkMode::AccessPoint
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ap_ssid(&self) -> &str {
        &self.ap_ssid
    }

    pub fn sta_ssid(&self) -> &str {
        &self.sta_ssid
    }

    /// Address on the hosted access point, `None` in client mode.
    pub fn ap_address(&self) -> Option<Ipv4Addr> {
        self.ap_address
    }
}

/// Network errors.
#[derive(Debug)]
pub enum NetworkError {
    /// Access-point or client bring-up failed.
    StartFailure(String),
    /// Configured SSID or password unusable.
    InvalidCredentials(CredentialError),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailure(msg) => write!(f, "network start failed: {}", msg),
            Self::InvalidCredentials(e) => write!(f, "invalid credentials: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCredentials(e) => Some(e),
            Self::StartFailure(_) => None,
        }
    }
}

impl From<CredentialError> for NetworkError {
    fn from(e: CredentialError) -> Self {
        Self::InvalidCredentials(e)
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        Self::StartFailure(e.to_string())
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for NetworkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::StartFailure(format!("ESP error: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Records which identity was started.
    #[derive(Default)]
    struct RecordingDriver {
        ap: Option<(String, String, String)>,
        client: Option<(String, String)>,
        fail: bool,
    }

    impl NetworkDriver for RecordingDriver {
        fn start_access_point(
            &mut self,
            hostname: &str,
            creds: &Credentials,
        ) -> Result<Ipv4Addr, NetworkError> {
            if self.fail {
                return Err(NetworkError::StartFailure("radio".into()));
            }
            self.ap = Some((
                hostname.to_string(),
                creds.ssid.clone(),
                creds.password.clone(),
            ));
            Ok(Ipv4Addr::new(192, 168, 4, 1))
        }

        fn start_client(&mut self, _hostname: &str, creds: &Credentials) -> Result<(), NetworkError> {
            self.client = Some((creds.ssid.clone(), creds.password.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_mode_is_pure_function_of_sta_ssid() {
        let cases = [
            (json!({}), NetworkMode::AccessPoint),
            (json!({"net": {"sta": {"ssid": ""}}}), NetworkMode::AccessPoint),
            (json!({"net": {"sta": {"ssid": "home"}}}), NetworkMode::Client),
            (
                json!({"net": {"sta": {"ssid": "x", "pass": "12345678"}, "ap": {"ssid": "y"}}}),
                NetworkMode::Client,
            ),
        ];
        for (value, expected) in cases {
            let doc = ConfigDocument::from_value(value).unwrap();
            assert_eq!(NetworkMode::from_config(&doc), expected);
        }
    }

    #[test]
    fn test_default_document_starts_access_point() {
        let mut driver = RecordingDriver::default();
        let net = NetworkBootstrap::start(&ConfigDocument::builtin_default(), &mut driver).unwrap();

        assert!(net.is_access_point());
        assert_eq!(net.ap_address(), Some(Ipv4Addr::new(192, 168, 4, 1)));
        assert_eq!(
            driver.ap,
            Some(("esp32-c3".into(), "ESP32-SETUP".into(), "12345678".into()))
        );
        assert!(driver.client.is_none());
    }

    #[test]
    fn test_sta_ssid_starts_client() {
        let doc = ConfigDocument::from_value(json!({
            "net": {"sta": {"ssid": "home", "pass": "password1"}}
        }))
        .unwrap();
        let mut driver = RecordingDriver::default();
        let net = NetworkBootstrap::start(&doc, &mut driver).unwrap();

        assert_eq!(net.mode(), NetworkMode::Client);
        assert_eq!(net.sta_ssid(), "home");
        assert_eq!(net.ap_address(), None);
        assert_eq!(driver.client, Some(("home".into(), "password1".into())));
    }

    #[test]
    fn test_short_client_password_still_starts_client() {
        let doc =
            ConfigDocument::from_value(json!({"net": {"sta": {"ssid": "home", "pass": "x"}}}))
                .unwrap();
        let mut driver = RecordingDriver::default();
        let net = NetworkBootstrap::start(&doc, &mut driver).unwrap();
        assert_eq!(net.mode(), NetworkMode::Client);
        assert_eq!(driver.client, Some(("home".into(), "x".into())));
    }

    #[test]
    fn test_start_failure_propagates() {
        let mut driver = RecordingDriver {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(
            NetworkBootstrap::start(&ConfigDocument::builtin_default(), &mut driver),
            Err(NetworkError::StartFailure(_))
        ));
    }
}
