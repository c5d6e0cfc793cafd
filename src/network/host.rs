//! Host network driver.
//!
//! On host systems the OS owns the network. Access-point mode is simulated:
//! the "access point" is the configured address, which the host binary binds
//! its DNS and HTTP listeners to.

use super::{Credentials, NetworkDriver, NetworkError};
use log::info;
use std::net::{IpAddr, Ipv4Addr};

/// Host network driver.
pub struct HostNetwork {
    ap_address: Ipv4Addr,
}

impl HostNetwork {
    /// Create a driver reporting `ap_address` as the access-point address.
    pub fn new(ap_address: Ipv4Addr) -> Self {
        Self { ap_address }
    }

    /// Get the primary local IP address.
    ///
    /// Creates a UDP socket and "connects" it to a public IP (nothing is
    /// sent), then reads back which local address was chosen.
    fn detect_local_ip() -> Option<IpAddr> {
        use std::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }
}

impl NetworkDriver for HostNetwork {
    fn start_access_point(
        &mut self,
        hostname: &str,
        creds: &Credentials,
    ) -> Result<Ipv4Addr, NetworkError> {
        info!(
            "Host access point '{}' ({}) simulated at {}, hostname {}",
            creds.ssid,
            if creds.is_open() { "open" } else { "WPA2" },
            self.ap_address,
            hostname
        );
        Ok(self.ap_address)
    }

    fn start_client(&mut self, hostname: &str, creds: &Credentials) -> Result<(), NetworkError> {
        // The OS is already connected; just report the address it uses
        match Self::detect_local_ip() {
            Some(ip) => info!(
                "Host client for '{}' ready, local IP {}, hostname {}",
                creds.ssid, ip, hostname
            ),
            None => info!("Host client for '{}' ready, no default route", creds.ssid),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_point_reports_configured_address() {
        let mut network = HostNetwork::new(Ipv4Addr::new(10, 0, 0, 1));
        let creds = Credentials::new("ESP32-SETUP", "12345678").unwrap();
        assert_eq!(
            network.start_access_point("host", &creds).unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }

    #[test]
    fn test_client_start_never_fails() {
        let mut network = HostNetwork::new(Ipv4Addr::LOCALHOST);
        let creds = Credentials::client("home", "").unwrap();
        assert!(network.start_client("host", &creds).is_ok());
    }
}
