//! Configuration for the RFB server adapter.

use std::time::Duration;

/// # Examples
///
/// ```no_run
/// # use ikvm_rfb::ServerConfig;
/// # use std::time::Duration;
/// let config = ServerConfig::builder()
///     .desktop_name("OpenBMC IKVM")
///     .calc_frame_crc(true)
///     .session_timeout(Duration::from_secs(900))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub desktop_name: String,
    pub bind_addr: String,
    pub calc_frame_crc: bool,
    pub frame_rate: u32,
    pub session_timeout: Duration,
}

/// Placeholder used only when a caller omits `.session_timeout(..)` from the
/// builder; the reference implementation's three historical defaults
/// (900s/1800s/86401s) disagree, so this is not treated as load-bearing
/// configuration, only a documented fallback with a startup warning.
pub const FALLBACK_SESSION_TIMEOUT: Duration = Duration::from_secs(900);

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            desktop_name: "OpenBMC IKVM".to_string(),
            bind_addr: "127.0.0.1:5900".to_string(),
            calc_frame_crc: true,
            frame_rate: 30,
            session_timeout: FALLBACK_SESSION_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Microseconds to run the RFB event pump per render-loop tick:
    /// `1_000_000 / frame_rate - 100`.
    pub fn process_time_micros(&self) -> u64 {
        (1_000_000 / u64::from(self.frame_rate)).saturating_sub(100)
    }
}

#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    inner: ServerConfigPartial,
}

#[derive(Debug, Default)]
struct ServerConfigPartial {
    desktop_name: Option<String>,
    bind_addr: Option<String>,
    calc_frame_crc: Option<bool>,
    frame_rate: Option<u32>,
    session_timeout: Option<Duration>,
    session_timeout_was_set: bool,
}

impl ServerConfigBuilder {
    pub fn desktop_name(mut self, name: impl Into<String>) -> Self {
        self.inner.desktop_name = Some(name.into());
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.bind_addr = Some(addr.into());
        self
    }

    pub fn calc_frame_crc(mut self, enabled: bool) -> Self {
        self.inner.calc_frame_crc = Some(enabled);
        self
    }

    pub fn frame_rate(mut self, rate: u32) -> Self {
        self.inner.frame_rate = Some(rate);
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.inner.session_timeout = Some(timeout);
        self.inner.session_timeout_was_set = true;
        self
    }

    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        if !self.inner.session_timeout_was_set {
            tracing::warn!(
                fallback_seconds = FALLBACK_SESSION_TIMEOUT.as_secs(),
                "session_timeout not configured, using fallback"
            );
        }
        ServerConfig {
            desktop_name: self.inner.desktop_name.unwrap_or(defaults.desktop_name),
            bind_addr: self.inner.bind_addr.unwrap_or(defaults.bind_addr),
            calc_frame_crc: self.inner.calc_frame_crc.unwrap_or(defaults.calc_frame_crc),
            frame_rate: self.inner.frame_rate.unwrap_or(defaults.frame_rate),
            session_timeout: self.inner.session_timeout.unwrap_or(defaults.session_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_time_micros() {
        let config = ServerConfig::builder().frame_rate(30).build();
        assert_eq!(config.process_time_micros(), 1_000_000 / 30 - 100);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder().desktop_name("Custom").calc_frame_crc(false).build();
        assert_eq!(config.desktop_name, "Custom");
        assert!(!config.calc_frame_crc);
    }
}
