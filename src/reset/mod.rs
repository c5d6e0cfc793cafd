//! Factory reset.
//!
//! Both trigger paths end in the same place: erase the configuration
//! namespace and the radio's stored credentials, then restart. Erase failures
//! are logged and never block the restart, since the next boot recreates the
//! default configuration anyway.
//!
//! - HTTP: `POST /api/factory_reset` erases, responds, then restarts
//! - Button: a debounced long press ([`ResetButton`]) erases, waits for
//!   release, then restarts
//!
//! Once erased, the reset is pending until the restart:
//! [`FactoryReset::is_pending`] lets the control API refuse writes that would
//! otherwise be persisted and survive the restart.

mod button;

pub use button::{ButtonEvent, ResetButton};

use crate::config::ConfigStore;
use crate::hal::InputPin;
use crate::system::SystemControl;
use log::{error, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Erase-then-restart coordinator.
pub struct FactoryReset {
    store: Arc<ConfigStore>,
    system: Arc<dyn SystemControl>,
    grace: Duration,
    pending: AtomicBool,
}

impl FactoryReset {
    /// `grace` is the pause between erase and restart.
    pub fn new(store: Arc<ConfigStore>, system: Arc<dyn SystemControl>, grace: Duration) -> Self {
        Self {
            store,
            system,
            grace,
            pending: AtomicBool::new(false),
        }
    }

    /// Erase persisted configuration and radio credentials. Never fails.
    pub fn erase(&self) {
        self.pending.store(true, Ordering::Release);
        warn!("Factory reset: erasing configuration");
        if let Err(e) = self.store.factory_reset() {
            warn!("Factory reset: configuration erase failed: {}", e);
        }
        if let Err(e) = self.system.erase_network_credentials() {
            warn!("Factory reset: credential erase failed: {}", e);
        }
    }

    /// Whether an erase has happened and the restart is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Restart after the grace period.
    pub fn restart(&self) {
        thread::sleep(self.grace);
        self.system.restart();
    }
}

/// Button sampling parameters.
#[derive(Debug, Clone, Copy)]
pub struct ButtonConfig {
    /// Input level that means "pressed".
    pub active_low: bool,
    pub debounce: Duration,
    pub hold: Duration,
    pub poll_interval: Duration,
}

/// Background task polling the reset button.
///
/// Drop it to stop polling.
pub struct ButtonWatcher {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ButtonWatcher {
    pub fn start(
        input: Box<dyn InputPin>,
        config: ButtonConfig,
        reset: Arc<FactoryReset>,
    ) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::Builder::new()
            .name("reset-button".into())
            .spawn(move || Self::run(input, config, reset, shutdown_clone))?;

        info!(
            "Reset button armed (hold {} ms, active {})",
            config.hold.as_millis(),
            if config.active_low { "low" } else { "high" }
        );
        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    fn run(
        input: Box<dyn InputPin>,
        config: ButtonConfig,
        reset: Arc<FactoryReset>,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut button = ResetButton::new(config.debounce, config.hold);
        while !shutdown.load(Ordering::Acquire) {
            let pressed = match input.is_high() {
                Ok(high) => high != config.active_low,
                Err(e) => {
                    error!("Reset button read failed: {}", e);
                    false
                }
            };

            match button.poll(pressed, Instant::now()) {
                ButtonEvent::Pressed => info!("Reset button pressed"),
                ButtonEvent::Released => info!("Reset button released before threshold"),
                ButtonEvent::Triggered => {
                    reset.erase();
                    info!("Factory reset done, release the button to restart");
                }
                ButtonEvent::RestartDue => {
                    reset.restart();
                    break;
                }
                ButtonEvent::None => {}
            }

            thread::sleep(config.poll_interval);
        }
    }

    /// Stop polling. May take up to one poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ButtonWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigDocument, CONFIG_NAMESPACE};
    use crate::hal::sim::SimInput;
    use crate::storage::MemoryStore;
    use crate::system::SystemError;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSystem {
        erases: AtomicUsize,
        restarts: AtomicUsize,
        fail_erase: bool,
    }

    impl SystemControl for CountingSystem {
        fn erase_network_credentials(&self) -> Result<(), SystemError> {
            self.erases.fetch_add(1, Ordering::SeqCst);
            if self.fail_erase {
                return Err(SystemError("radio not initialised".into()));
            }
            Ok(())
        }

        fn restart(&self) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(system: CountingSystem) -> (Arc<MemoryStore>, Arc<CountingSystem>, Arc<FactoryReset>) {
        let kv = Arc::new(MemoryStore::new());
        let store = Arc::new(ConfigStore::new(kv.clone()));
        store
            .set_and_save(json!({"net": {"hostname": "custom"}}))
            .unwrap();
        let system = Arc::new(system);
        let reset = Arc::new(FactoryReset::new(store, system.clone(), Duration::ZERO));
        (kv, system, reset)
    }

    #[test]
    fn test_erase_clears_namespace_and_credentials() {
        let (kv, system, reset) = setup(CountingSystem::default());
        assert!(!reset.is_pending());
        reset.erase();
        assert!(reset.is_pending());
        assert_eq!(kv.key_count(CONFIG_NAMESPACE), 0);
        assert_eq!(system.erases.load(Ordering::SeqCst), 1);

        let fresh = ConfigStore::new(kv);
        assert_eq!(*fresh.load_or_default(), ConfigDocument::builtin_default());
    }

    #[test]
    fn test_erase_failures_do_not_block_restart() {
        let (kv, system, reset) = setup(CountingSystem {
            fail_erase: true,
            ..Default::default()
        });
        kv.set_fail_writes(true);

        reset.erase();
        reset.restart();
        assert_eq!(system.restarts.load(Ordering::SeqCst), 1);
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_watcher_long_press_erases_then_restarts_on_release() {
        let (kv, system, reset) = setup(CountingSystem::default());
        let input = SimInput::new(true);
        let config = ButtonConfig {
            active_low: true,
            debounce: Duration::from_millis(10),
            hold: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
        };
        let mut watcher =
            ButtonWatcher::start(Box::new(input.clone()), config, reset.clone()).unwrap();

        input.set_high(false);
        assert!(wait_for(|| system.erases.load(Ordering::SeqCst) == 1));
        assert_eq!(kv.key_count(CONFIG_NAMESPACE), 0);
        assert!(reset.is_pending());

        // Still held: no restart yet
        thread::sleep(Duration::from_millis(50));
        assert_eq!(system.restarts.load(Ordering::SeqCst), 0);

        input.set_high(true);
        assert!(wait_for(|| system.restarts.load(Ordering::SeqCst) == 1));
        assert_eq!(system.erases.load(Ordering::SeqCst), 1);
        watcher.stop();
    }

    #[test]
    fn test_watcher_short_press_does_nothing() {
        let (_, system, reset) = setup(CountingSystem::default());
        let input = SimInput::new(false);
        let config = ButtonConfig {
            active_low: false,
            debounce: Duration::from_millis(10),
            hold: Duration::from_secs(10),
            poll_interval: Duration::from_millis(5),
        };
        let watcher = ButtonWatcher::start(Box::new(input.clone()), config, reset).unwrap();

        input.set_high(true);
        thread::sleep(Duration::from_millis(60));
        input.set_high(false);
        thread::sleep(Duration::from_millis(30));
        drop(watcher);

        assert_eq!(system.erases.load(Ordering::SeqCst), 0);
        assert_eq!(system.restarts.load(Ordering::SeqCst), 0);
    }
}
