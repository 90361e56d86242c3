//! Error types for the manager coordinator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("failed to start the T_bus tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error(transparent)]
    Video(#[from] ikvm_video::VideoError),

    #[error(transparent)]
    Input(#[from] ikvm_input::InputError),

    #[error(transparent)]
    Rfb(#[from] ikvm_rfb::RfbError),

    #[error(transparent)]
    Monitor(#[from] ikvm_monitor::MonitorError),

    #[error("failed to write screenshot to {path}: {source}")]
    Screenshot { path: String, source: std::io::Error },

    #[error("T_{thread} panicked")]
    ThreadPanicked { thread: &'static str },
}

pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ManagerError::ThreadPanicked { thread: "video" };
        assert_eq!(err.to_string(), "T_video panicked");
    }
}
