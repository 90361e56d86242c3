//! Error types for input relay operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error on HID device: {0}")]
    Io(#[from] std::io::Error),

    /// A nix syscall wrapper (`open`, `write`, `poll`, ...) returned an errno.
    #[error("HID device syscall failed: {0}")]
    Errno(#[from] nix::errno::Errno),

    #[error("keyboard device not connected")]
    KeyboardNotConnected,

    #[error("pointer device not connected")]
    PointerNotConnected,

    #[error("USB power save control failed: {0}")]
    PowerSave(String),
}

pub type Result<T> = std::result::Result<T, InputError>;

impl InputError {
    pub(crate) fn power_save(msg: impl Into<String>) -> Self {
        Self::PowerSave(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InputError::power_save("SetUSBPowerSaveMode failed");
        assert!(err.to_string().contains("SetUSBPowerSaveMode failed"));
    }

    #[test]
    fn test_errno_converts_via_from() {
        let err: InputError = nix::errno::Errno::ENODEV.into();
        assert!(matches!(err, InputError::Errno(nix::errno::Errno::ENODEV)));
    }
}
