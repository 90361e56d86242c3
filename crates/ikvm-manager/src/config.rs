//! Aggregates every sub-crate's configuration plus the manager's own
//! snapshot-path bundle, mirroring the reference `Args` object.

use ikvm_input::HidConfig;
use ikvm_monitor::MonitorConfig;
use ikvm_rfb::ServerConfig;
use ikvm_video::CaptureConfig;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub capture: CaptureConfig,
    pub hid: HidConfig,
    pub server: ServerConfig,
    pub monitor: MonitorConfig,

    /// Snapshot written on a successful screenshot request.
    pub snapshot_path: String,
    /// Fallback asset copied in when the capture signal is absent.
    pub no_signal_path: String,
    /// Fallback asset copied in when the host is powered off.
    pub power_off_path: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            hid: HidConfig::default(),
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
            snapshot_path: "/tmp/ikvm-snapshot.jpeg".to_string(),
            no_signal_path: "/usr/share/ikvm/no-signal.jpeg".to_string(),
            power_off_path: "/usr/share/ikvm/power-off.jpeg".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Reads the env-var bundle documented for `ikvmd`: `IKVM_VIDEO_PATH`,
    /// `IKVM_BIND_ADDR`, `IKVM_KEYBOARD_PATH`, `IKVM_POINTER_PATH`,
    /// `IKVM_SNAPSHOT_PATH`. Unset variables keep the built-in defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("IKVM_VIDEO_PATH") {
            config.capture.video_path = path;
        }
        if let Ok(addr) = std::env::var("IKVM_BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("IKVM_KEYBOARD_PATH") {
            config.hid.keyboard_path = path;
        }
        if let Ok(path) = std::env::var("IKVM_POINTER_PATH") {
            config.hid.pointer_path = path;
        }
        if let Ok(path) = std::env::var("IKVM_SNAPSHOT_PATH") {
            config.snapshot_path = path;
        }
        config
    }
}

#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    inner: ManagerConfig,
}

impl ManagerConfigBuilder {
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.inner.capture = capture;
        self
    }

    pub fn hid(mut self, hid: HidConfig) -> Self {
        self.inner.hid = hid;
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.inner.server = server;
        self
    }

    pub fn monitor(mut self, monitor: MonitorConfig) -> Self {
        self.inner.monitor = monitor;
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<String>) -> Self {
        self.inner.snapshot_path = path.into();
        self
    }

    pub fn build(self) -> ManagerConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_sane_snapshot_path() {
        let config = ManagerConfig::default();
        assert!(config.snapshot_path.ends_with(".jpeg"));
    }

    #[test]
    fn test_builder_overrides_snapshot_path() {
        let config = ManagerConfig::builder().snapshot_path("/var/x.jpeg").build();
        assert_eq!(config.snapshot_path, "/var/x.jpeg");
    }
}
