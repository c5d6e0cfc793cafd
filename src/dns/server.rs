//! UDP responder task.

use super::{build_response, MAX_PACKET_LEN};
use log::{debug, error, info, warn};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Socket read timeout; bounds how long `stop` waits.
const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// Captive DNS responder.
///
/// Runs in a background thread. Drop it to stop the responder.
pub struct CaptiveDns {
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl CaptiveDns {
    /// Bind `bind_addr:port` and answer every query with `answer`.
    ///
    /// A bind failure is returned to the caller.
    pub fn start(bind_addr: Option<IpAddr>, port: u16, answer: Ipv4Addr) -> io::Result<Self> {
        let ip = bind_addr.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let socket = UdpSocket::bind(SocketAddr::new(ip, port))?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let local_addr = socket.local_addr()?;

        info!("Captive DNS listening on {} -> {}", local_addr, answer);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::Builder::new()
            .name("captive-dns".into())
            .spawn(move || Self::run(socket, answer, shutdown_clone))?;

        Ok(Self {
            local_addr,
            handle: Some(handle),
            shutdown,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn run(socket: UdpSocket, answer: Ipv4Addr, shutdown: Arc<AtomicBool>) {
        let mut buf = [0u8; MAX_PACKET_LEN];
        while !shutdown.load(Ordering::Acquire) {
            let (len, peer) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Captive DNS receive failed: {}", e);
                    break;
                }
            };

            match build_response(&buf[..len], answer) {
                Some(response) => {
                    if let Err(e) = socket.send_to(&response, peer) {
                        warn!("Captive DNS reply to {} failed: {}", peer, e);
                    }
                }
                None => debug!("Dropped malformed DNS packet ({} bytes) from {}", len, peer),
            }
        }
        info!("Captive DNS stopped");
    }

    /// Stop the responder. May take up to the socket read timeout.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptiveDns {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(id: u16) -> Vec<u8> {
        let mut packet = id.to_be_bytes().to_vec();
        packet.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
        packet.extend_from_slice(b"\x03foo\x05local\x00\x00\x01\x00\x01");
        packet
    }

    #[test]
    fn test_responder_answers_over_udp() {
        let answer = Ipv4Addr::new(192, 168, 4, 1);
        let mut dns = CaptiveDns::start(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), 0, answer).unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        // A malformed packet is ignored and does not stop the task
        client.send_to(&[0u8; 5], dns.local_addr()).unwrap();
        client.send_to(&query(0x1234), dns.local_addr()).unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        let response = &buf[..len];
        assert_eq!(&response[0..2], &[0x12, 0x34]);
        assert_eq!(&response[len - 4..], &answer.octets());

        dns.stop();
    }

    #[test]
    fn test_bind_conflict_is_an_error() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(CaptiveDns::start(
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port,
            Ipv4Addr::LOCALHOST
        )
        .is_err());
    }
}
