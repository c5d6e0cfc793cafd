//! Control API.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/` | landing page |
//! | GET | `/api/status` | hostname, mode, SSIDs, device state, uptime |
//! | GET | `/api/config` | current configuration document |
//! | POST | `/api/config` | `{"ok":true}`; persists only, does not apply |
//! | POST | `/api/apply` | `{"ok":true}`; applies the persisted document |
//! | GET | `/api/modules` | status of every module keyed by name |
//! | POST | `/api/modules/{name}/action` | module status after the action |
//! | POST | `/api/factory_reset` | `{"ok":true,"reboot":true}`; erases, then restarts |
//!
//! After a factory reset has erased the configuration, and until the device
//! restarts, `POST /api/config`, `/api/apply` and module actions answer `503`
//! so nothing is persisted or driven behind the reset.
//!
//! In access-point mode, OS connectivity probes and any other unknown `GET`
//! are redirected to the landing page, and `/favicon.ico` gets `204`. In
//! client mode they are all `404`.
//!
//! [`ControlApi::handle`] is transport independent; [`HttpServer`] adapts it
//! to `tiny_http`.

mod page;
mod server;

pub use page::INDEX_HTML;
pub use server::HttpServer;

use crate::config::{ConfigError, ConfigStore};
use crate::device_state::DeviceState;
use crate::modules::{ModuleError, ModuleRegistry};
use crate::network::NetworkBootstrap;
use crate::reset::FactoryReset;
use log::{info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Largest accepted request body.
pub const MAX_BODY_LEN: usize = 4096;

/// Paths client operating systems probe to detect a captive portal.
const CAPTIVE_PROBES: &[&str] = &[
    "/generate_204",
    "/gen_204",
    "/hotspot-detect.html",
    "/connecttest.txt",
    "/ncsi.txt",
    "/redirect",
];

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

/// Parsed request as delivered by the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Request target; a query string is ignored.
    pub path: String,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method,
            path: path.into(),
            body: body.into(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path, Vec::new())
    }

    pub fn post(path: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::Post, path, body)
    }
}

/// Response for the transport to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    /// Restart the device once the response has been sent.
    pub restart: bool,
}

impl ApiResponse {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            headers: Vec::new(),
            body: body.into(),
            restart: false,
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, JSON, value.to_string())
    }

    pub fn ok() -> Self {
        Self::json(200, &json!({"ok": true}))
    }

    pub fn error(status: u16, message: impl AsRef<str>) -> Self {
        Self::json(status, &json!({"ok": false, "error": message.as_ref()}))
    }

    pub fn html(body: &str) -> Self {
        Self::new(200, HTML, body)
    }

    pub fn redirect(location: String) -> Self {
        Self::new(302, TEXT, Vec::new()).with_header("Location", location)
    }

    pub fn no_content() -> Self {
        Self::new(204, TEXT, Vec::new())
    }

    pub fn not_found() -> Self {
        Self::error(404, "not found")
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON (tests and diagnostics).
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl From<ModuleError> for ApiResponse {
    fn from(e: ModuleError) -> Self {
        let status = match e {
            ModuleError::NotFound(_) => 404,
            ModuleError::Disabled(_) => 403,
            ModuleError::InvalidArgument(_) => 400,
            ModuleError::Hardware(_) => 500,
        };
        Self::error(status, e.to_string())
    }
}

impl From<ConfigError> for ApiResponse {
    fn from(e: ConfigError) -> Self {
        let status = match e {
            ConfigError::Invalid(_) => 400,
            ConfigError::IoFailure(_) => 500,
        };
        Self::error(status, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Index,
    Status,
    Config,
    Apply,
    Modules,
    ModuleAction(&'a str),
    FactoryReset,
}

impl<'a> Route<'a> {
    fn resolve(path: &'a str) -> Option<Self> {
        let route = match path {
            "/" => Self::Index,
            "/api/status" => Self::Status,
            "/api/config" => Self::Config,
            "/api/apply" => Self::Apply,
            "/api/modules" => Self::Modules,
            "/api/factory_reset" => Self::FactoryReset,
            _ => {
                let name = path
                    .strip_prefix("/api/modules/")?
                    .strip_suffix("/action")?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                Self::ModuleAction(name)
            }
        };
        Some(route)
    }

    /// Writes configuration or drives hardware.
    fn mutates(self) -> bool {
        matches!(self, Self::Config | Self::Apply | Self::ModuleAction(_))
    }

    fn allow(self) -> &'static str {
        match self {
            Self::Index | Self::Status | Self::Modules => "GET",
            Self::Config => "GET, POST",
            Self::Apply | Self::ModuleAction(_) | Self::FactoryReset => "POST",
        }
    }
}

/// Endpoint table over the device's components.
pub struct ControlApi {
    store: Arc<ConfigStore>,
    registry: Arc<ModuleRegistry>,
    device: Arc<DeviceState>,
    network: NetworkBootstrap,
    reset: Arc<FactoryReset>,
    started: Instant,
}

impl ControlApi {
    pub fn new(
        store: Arc<ConfigStore>,
        registry: Arc<ModuleRegistry>,
        device: Arc<DeviceState>,
        network: NetworkBootstrap,
        reset: Arc<FactoryReset>,
    ) -> Self {
        Self {
            store,
            registry,
            device,
            network,
            reset,
            started: Instant::now(),
        }
    }

    /// Route and handle one request.
    pub fn handle(&self, req: &ApiRequest) -> ApiResponse {
        if req.body.len() > MAX_BODY_LEN {
            return ApiResponse::error(413, "request body too large");
        }

        let path = req.path.split('?').next().unwrap_or("");
        let route = match Route::resolve(path) {
            Some(route) => route,
            None => return self.captive(req.method, path),
        };

        if req.method == Method::Post && route.mutates() && self.reset.is_pending() {
            return ApiResponse::error(503, "factory reset pending");
        }

        match (route, req.method) {
            (Route::Index, Method::Get) => ApiResponse::html(INDEX_HTML),
            (Route::Status, Method::Get) => self.status(),
            (Route::Config, Method::Get) => ApiResponse::json(200, self.store.get().as_value()),
            (Route::Config, Method::Post) => self.save_config(&req.body),
            (Route::Apply, Method::Post) => self.apply(),
            (Route::Modules, Method::Get) => ApiResponse::json(200, &self.registry.status_all()),
            (Route::ModuleAction(name), Method::Post) => self.module_action(name, &req.body),
            (Route::FactoryReset, Method::Post) => self.factory_reset(),
            (route, _) => {
                ApiResponse::error(405, "method not allowed").with_header("Allow", route.allow())
            }
        }
    }

    /// Restart the device (after a factory-reset response has been sent).
    pub fn restart(&self) {
        self.reset.restart();
    }

    fn captive(&self, method: Method, path: &str) -> ApiResponse {
        let ap_address = match (method, self.network.ap_address()) {
            (Method::Get, Some(addr)) if self.network.is_access_point() => addr,
            _ => return ApiResponse::not_found(),
        };
        if path == "/favicon.ico" {
            return ApiResponse::no_content();
        }
        if CAPTIVE_PROBES.contains(&path) {
            info!("Captive probe {} redirected", path);
        }
        ApiResponse::redirect(format!("http://{}/", ap_address))
    }

    fn status(&self) -> ApiResponse {
        let device = self.device.get();
        ApiResponse::json(
            200,
            &json!({
                "hostname": self.network.hostname(),
                "mode": self.network.mode().label(),
                "ap_ssid": self.network.ap_ssid(),
                "sta_ssid": self.network.sta_ssid(),
                "ap_address": self.network.ap_address().map(|a| a.to_string()),
                "relay_on": device.relay_on,
                "level": device.level,
                "uptime_secs": self.started.elapsed().as_secs(),
            }),
        )
    }

    fn save_config(&self, body: &[u8]) -> ApiResponse {
        let value = match parse_body(body) {
            Ok(value) => value,
            Err(resp) => return resp,
        };
        match self.store.set_and_save(value) {
            Ok(()) => ApiResponse::ok(),
            Err(e) => {
                warn!("Rejected configuration: {}", e);
                e.into()
            }
        }
    }

    fn apply(&self) -> ApiResponse {
        match self.registry.apply_all(&self.store.get()) {
            Ok(()) => ApiResponse::ok(),
            Err(e) => e.into(),
        }
    }

    fn module_action(&self, name: &str, body: &[u8]) -> ApiResponse {
        let request = match parse_body(body) {
            Ok(value) => value,
            Err(resp) => return resp,
        };
        match self.registry.action(name, &request) {
            Ok(status) => ApiResponse::json(200, &status),
            Err(e) => e.into(),
        }
    }

    fn factory_reset(&self) -> ApiResponse {
        self.reset.erase();
        let mut response = ApiResponse::json(200, &json!({"ok": true, "reboot": true}));
        response.restart = true;
        response
    }
}

fn parse_body(body: &[u8]) -> Result<Value, ApiResponse> {
    serde_json::from_slice(body)
        .map_err(|e| ApiResponse::error(400, format!("invalid JSON: {}", e)))
}
