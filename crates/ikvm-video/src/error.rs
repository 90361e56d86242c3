//! Error types for capture engine operations
//!
//! Provides typed errors that library users can match and handle specifically.

use thiserror::Error;

/// Errors that can occur during capture engine operations.
///
/// Structural failures (open/format/mmap/streamon/resize) are meant to be
/// surfaced to the process top as fatal; transient per-call failures are
/// logged by the caller and otherwise ignored.
#[derive(Error, Debug)]
pub enum VideoError {
    /// Failed to open, read, or write the capture device node.
    #[error("I/O error on capture device: {0}")]
    Io(#[from] std::io::Error),

    /// A nix syscall wrapper (`open`, `close`, `poll`, ...) returned an errno
    /// outside an ioctl, which is reported through the `Ioctl` variant instead.
    #[error("capture device syscall failed: {0}")]
    Errno(#[from] nix::errno::Errno),

    /// A V4L2 ioctl returned an error.
    #[error("ioctl {op} failed: errno {errno}")]
    Ioctl { op: &'static str, errno: i32 },

    /// `QUERYCAP` reported a device lacking `VIDEO_CAPTURE` or `STREAMING`.
    #[error("device does not support streaming video capture")]
    UnsupportedCapability,

    /// The driver negotiated a pixel format neither RGB24 nor JPEG.
    #[error("unsupported pixel format: {0:#010x}")]
    UnsupportedPixelFormat(u32),

    /// `REQBUFS` yielded fewer buffers than the minimum of 2.
    #[error("insufficient buffers: requested {requested}, driver granted {got}")]
    InsufficientBuffers { requested: u32, got: u32 },

    /// DV-timings (or a direct format query) reported a zero-sized frame.
    #[error("capture device reported zero-sized frame dimensions")]
    InvalidResolution,

    /// mmap of a driver buffer failed.
    #[error("mmap of capture buffer {index} failed: {source}")]
    Mmap { index: u32, source: std::io::Error },
}

/// Result type for capture engine operations.
pub type Result<T> = std::result::Result<T, VideoError>;

impl VideoError {
    pub(crate) fn ioctl(op: &'static str, errno: i32) -> Self {
        Self::Ioctl { op, errno }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VideoError::ioctl("VIDIOC_STREAMON", 5);
        assert_eq!(err.to_string(), "ioctl VIDIOC_STREAMON failed: errno 5");

        let err = VideoError::InsufficientBuffers { requested: 3, got: 1 };
        assert!(err.to_string().contains("requested 3"));
    }

    #[test]
    fn test_errno_converts_via_from() {
        let err: VideoError = nix::errno::Errno::ENODEV.into();
        assert!(matches!(err, VideoError::Errno(nix::errno::Errno::ENODEV)));
    }
}
