//! Error types for the property-bus monitor.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("failed to connect to D-Bus: {0}")]
    DbusConnection(#[from] zbus::Error),

    #[error("failed to export object at {0}")]
    ObjectServerExport(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub(crate) fn object_server_export(path: impl Into<String>) -> Self {
        Self::ObjectServerExport(path.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MonitorError::object_server_export("/xyz/openbmc_project/ikvm/snapshot");
        assert!(err.to_string().contains("/xyz/openbmc_project/ikvm/snapshot"));
    }
}
