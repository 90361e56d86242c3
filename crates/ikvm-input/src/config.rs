//! Configuration for the input relay.

/// Device paths and UDC binding for the HID gadgets.
///
/// # Examples
///
/// ```no_run
/// # use ikvm_input::HidConfig;
/// let config = HidConfig::builder()
///     .keyboard_path("/dev/hidg0")
///     .pointer_path("/dev/hidg1")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HidConfig {
    pub keyboard_path: String,
    pub pointer_path: String,
    pub udc_name: String,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            keyboard_path: "/dev/hidg0".to_string(),
            pointer_path: "/dev/hidg1".to_string(),
            udc_name: String::new(),
        }
    }
}

impl HidConfig {
    pub fn builder() -> HidConfigBuilder {
        HidConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct HidConfigBuilder {
    inner: HidConfig,
}

impl HidConfigBuilder {
    pub fn keyboard_path(mut self, path: impl Into<String>) -> Self {
        self.inner.keyboard_path = path.into();
        self
    }

    pub fn pointer_path(mut self, path: impl Into<String>) -> Self {
        self.inner.pointer_path = path.into();
        self
    }

    pub fn udc_name(mut self, name: impl Into<String>) -> Self {
        self.inner.udc_name = name.into();
        self
    }

    pub fn build(self) -> HidConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = HidConfig::default();
        assert_eq!(config.keyboard_path, "/dev/hidg0");
    }

    #[test]
    fn test_builder() {
        let config = HidConfig::builder().keyboard_path("/dev/hidg3").build();
        assert_eq!(config.keyboard_path, "/dev/hidg3");
        assert_eq!(config.pointer_path, "/dev/hidg1");
    }
}
