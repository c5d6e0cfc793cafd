//! `tiny_http` transport for [`ControlApi`].

use super::{ApiRequest, ApiResponse, ControlApi, Method, MAX_BODY_LEN};
use log::{debug, error, info, warn};
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

/// Poll interval of the accept loop; bounds how long `stop` waits.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// HTTP server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct HttpServer {
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl HttpServer {
    /// Start serving `api` on `bind_addr:port` (`None` binds all interfaces).
    pub fn start(bind_addr: Option<IpAddr>, port: u16, api: Arc<ControlApi>) -> io::Result<Self> {
        let ip = bind_addr.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let server = Server::http(SocketAddr::new(ip, port))
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server
            .server_addr()
            .to_ip()
            .unwrap_or_else(|| SocketAddr::new(ip, port));

        info!("Control API listening on http://{}/", local_addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::Builder::new()
            .name("http".into())
            .spawn(move || Self::run(server, api, shutdown_clone))?;

        Ok(Self {
            local_addr,
            handle: Some(handle),
            shutdown,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn run(server: Server, api: Arc<ControlApi>, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Control API shutting down");
                break;
            }

            match server.recv_timeout(RECV_TIMEOUT) {
                Ok(Some(request)) => {
                    if Self::serve(request, &api) {
                        api.restart();
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Handle one request. Returns whether a restart was requested.
    fn serve(mut request: Request, api: &ControlApi) -> bool {
        let method = match request.method() {
            tiny_http::Method::Get => Method::Get,
            tiny_http::Method::Post => Method::Post,
            _ => Method::Other,
        };
        let path = request.url().to_string();

        // One byte past the limit is enough to detect an oversized body
        let mut body = Vec::new();
        let limit = (MAX_BODY_LEN + 1) as u64;
        let read = request.as_reader().take(limit).read_to_end(&mut body);
        let response = match read {
            Ok(_) => api.handle(&ApiRequest { method, path, body }),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                ApiResponse::error(400, "unreadable body")
            }
        };

        debug!("{:?} {} -> {}", method, request.url(), response.status);
        let restart = response.restart;
        if let Err(e) = request.respond(to_tiny(response)) {
            warn!("Failed to send response: {}", e);
        }
        restart
    }

    /// Stop the server. May take up to one accept poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn to_tiny(resp: ApiResponse) -> Response<io::Cursor<Vec<u8>>> {
    let mut out = Response::from_data(resp.body).with_status_code(resp.status);
    let headers = std::iter::once(("Content-Type", resp.content_type.to_string()))
        .chain(resp.headers);
    for (name, value) in headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => out.add_header(header),
            Err(()) => warn!("Dropping invalid header {}", name),
        }
    }
    out
}
