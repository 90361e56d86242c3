//! Error types for the RFB server adapter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RfbError {
    #[error("I/O error on RFB socket: {0}")]
    Io(#[from] std::io::Error),

    #[error("session registry call failed: {0}")]
    SessionRegistry(String),

    #[error("capture engine error: {0}")]
    Capture(#[from] ikvm_video::VideoError),

    #[error("input relay error: {0}")]
    Input(#[from] ikvm_input::InputError),
}

pub type Result<T> = std::result::Result<T, RfbError>;

impl RfbError {
    pub(crate) fn session_registry(msg: impl Into<String>) -> Self {
        Self::SessionRegistry(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RfbError::session_registry("SessionRegister timed out");
        assert!(err.to_string().contains("SessionRegister timed out"));
    }
}
