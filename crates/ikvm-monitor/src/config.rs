//! Bus names, object paths and interfaces the monitor watches.
//!
//! All of these are plain fields rather than hardcoded constants so a
//! deployment can point at a differently-named sensor or service object;
//! the defaults are the well-known OpenBMC paths for each signal.

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// OS-stop (BSOD/crash) IPMI sensor object. Offset `2` on this sensor's
    /// `Value` property means the host crashed.
    pub crash_sensor_path: String,
    pub crash_sensor_service: String,

    /// Screenshot-trigger bool property, flipped by another BMC interface
    /// to request an out-of-band snapshot.
    pub screenshot_trigger_path: String,
    pub screenshot_trigger_service: String,

    /// Active KVM session id list, mutated by the platform session manager.
    pub session_list_path: String,
    pub session_list_service: String,

    /// Idle session timeout, in seconds, settable by the platform.
    pub session_timeout_path: String,
    pub session_timeout_service: String,

    /// Chassis/host power state (`xyz.openbmc_project.State.Host`).
    pub host_power_path: String,
    pub host_power_service: String,

    /// This service's own enable/disable switch.
    pub service_enable_path: String,
    pub service_enable_service: String,

    /// Object path this monitor exports its own `Trigger`/`TriggerScreenshot`
    /// interface at.
    pub snapshot_object_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            crash_sensor_path: "/xyz/openbmc_project/sensors/os_status/OS_Status".to_string(),
            crash_sensor_service: "xyz.openbmc_project.HostStatusManager".to_string(),

            screenshot_trigger_path: "/xyz/openbmc_project/ikvm/screenshot".to_string(),
            screenshot_trigger_service: "xyz.openbmc_project.IkvmScreenshot".to_string(),

            session_list_path: "/xyz/openbmc_project/ikvm/sessions".to_string(),
            session_list_service: "xyz.openbmc_project.User.SessionManager".to_string(),

            session_timeout_path: "/xyz/openbmc_project/ikvm/sessions".to_string(),
            session_timeout_service: "xyz.openbmc_project.User.SessionManager".to_string(),

            host_power_path: "/xyz/openbmc_project/state/host0".to_string(),
            host_power_service: "xyz.openbmc_project.State.Host".to_string(),

            service_enable_path: "/xyz/openbmc_project/ikvm".to_string(),
            service_enable_service: "xyz.openbmc_project.IkvmControl".to_string(),

            snapshot_object_path: "/xyz/openbmc_project/ikvm/snapshot".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    inner: MonitorConfig,
}

impl MonitorConfigBuilder {
    pub fn host_power(mut self, service: impl Into<String>, path: impl Into<String>) -> Self {
        self.inner.host_power_service = service.into();
        self.inner.host_power_path = path.into();
        self
    }

    pub fn crash_sensor(mut self, service: impl Into<String>, path: impl Into<String>) -> Self {
        self.inner.crash_sensor_service = service.into();
        self.inner.crash_sensor_path = path.into();
        self
    }

    pub fn build(self) -> MonitorConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_well_formed() {
        let config = MonitorConfig::default();
        assert!(config.host_power_path.starts_with('/'));
        assert!(config.snapshot_object_path.starts_with('/'));
    }

    #[test]
    fn test_builder_overrides_host_power() {
        let config = MonitorConfig::builder().host_power("com.example.Host", "/com/example/host0").build();
        assert_eq!(config.host_power_service, "com.example.Host");
        assert_eq!(config.host_power_path, "/com/example/host0");
    }
}
