//! Shared state mutated by the monitor's subscription tasks and read by
//! the video/server threads elsewhere in the process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPowerState {
    On,
    Off,
    Unknown,
}

impl HostPowerState {
    /// Maps the `xyz.openbmc_project.State.Host.HostState` enum's string
    /// suffix (the part after the last dot) to a power state.
    pub fn from_state_suffix(suffix: &str) -> Self {
        match suffix {
            "Running" => Self::On,
            "Off" | "Quiesced" => Self::Off,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug)]
struct Inner {
    continue_executing: AtomicBool,
    screenshot_requested: AtomicBool,
    service_enabled: AtomicBool,
    session_timeout: AtomicU64,
    host_power_state: Mutex<HostPowerState>,
    active_session_ids: Mutex<Vec<u8>>,
}

/// Cheaply clonable handle onto the monitor's view of host/session state.
///
/// `CoreContext` intentionally does not implement `ikvm_rfb::CoreSignal` or
/// `ikvm_input::PowerSaveControl` itself, so this crate never depends on
/// either of those; the binding lives in the process that wires all three
/// crates together.
#[derive(Debug, Clone)]
pub struct CoreContext {
    inner: Arc<Inner>,
}

impl Default for CoreContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                continue_executing: AtomicBool::new(true),
                screenshot_requested: AtomicBool::new(false),
                service_enabled: AtomicBool::new(true),
                session_timeout: AtomicU64::new(900),
                host_power_state: Mutex::new(HostPowerState::Unknown),
                active_session_ids: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn continue_executing(&self) -> bool {
        self.inner.continue_executing.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.inner.continue_executing.store(false, Ordering::Release);
    }

    /// Peeks the screenshot flag without clearing it. The render loop reads
    /// this to decide whether to run capture at all; only a successful
    /// snapshot write clears it, via [`CoreContext::clear_screenshot_request`].
    pub fn screenshot_requested(&self) -> bool {
        self.inner.screenshot_requested.load(Ordering::Acquire)
    }

    pub fn request_screenshot(&self) {
        self.inner.screenshot_requested.store(true, Ordering::Release);
    }

    pub fn clear_screenshot_request(&self) {
        self.inner.screenshot_requested.store(false, Ordering::Release);
    }

    /// Whether the platform's KVM service switch is enabled. `false` is what
    /// `ikvm_rfb::CoreSignal::kvm_status` reports upstream as `true`: despite
    /// the name, that flag means "service disabled, disconnect everyone".
    pub fn service_enabled(&self) -> bool {
        self.inner.service_enabled.load(Ordering::Acquire)
    }

    pub fn set_service_enabled(&self, enabled: bool) {
        self.inner.service_enabled.store(enabled, Ordering::Release);
    }

    pub fn session_timeout(&self) -> u64 {
        self.inner.session_timeout.load(Ordering::Acquire)
    }

    pub fn set_session_timeout(&self, seconds: u64) {
        self.inner.session_timeout.store(seconds, Ordering::Release);
    }

    pub fn host_power_state(&self) -> HostPowerState {
        *self.inner.host_power_state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_host_power_state(&self, state: HostPowerState) {
        *self.inner.host_power_state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn active_session_ids(&self) -> Vec<u8> {
        self.inner.active_session_ids.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_active_session_ids(&self, ids: Vec<u8>) {
        *self.inner.active_session_ids.lock().unwrap_or_else(|e| e.into_inner()) = ids;
    }

    pub fn session_is_active(&self, session_id: u8) -> bool {
        self.active_session_ids().contains(&session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_from_suffix() {
        assert_eq!(HostPowerState::from_state_suffix("Running"), HostPowerState::On);
        assert_eq!(HostPowerState::from_state_suffix("Off"), HostPowerState::Off);
        assert_eq!(HostPowerState::from_state_suffix("Bogus"), HostPowerState::Unknown);
    }

    #[test]
    fn test_screenshot_request_persists_until_cleared() {
        let ctx = CoreContext::new();
        assert!(!ctx.screenshot_requested());
        ctx.request_screenshot();
        assert!(ctx.screenshot_requested());
        assert!(ctx.screenshot_requested());
        ctx.clear_screenshot_request();
        assert!(!ctx.screenshot_requested());
    }

    #[test]
    fn test_session_membership() {
        let ctx = CoreContext::new();
        ctx.set_active_session_ids(vec![3, 7]);
        assert!(ctx.session_is_active(3));
        assert!(!ctx.session_is_active(4));
    }
}
