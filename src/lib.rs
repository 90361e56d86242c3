//! # ikvm-core
//!
//! Core of a headless remote-console server for a baseboard management
//! controller (BMC): continuous V4L2 video capture distributed to RFB
//! clients, HID keyboard/pointer relay, and a platform event monitor that
//! reacts to host crashes, power transitions and session/service changes.
//!
//! This crate is a thin facade over the sub-crates:
//!
//! - **[`video`]** - V4L2 capture engine and buffer ring
//! - **[`input`]** - HID keyboard/pointer relay
//! - **[`rfb`]** - RFB server adapter (Tight, Keyboard-LED-State, LastRect, IVTP)
//! - **[`monitor`]** - asynchronous platform event monitor (D-Bus)
//! - **[`manager`]** - coordinator wiring the four above into the render loop
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ikvm_core::manager::{Manager, ManagerConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ManagerConfig::builder()
//!         .video_path("/dev/video0")
//!         .keyboard_path("/dev/hidg0")
//!         .pointer_path("/dev/hidg1")
//!         .frame_rate(30)
//!         .build()?;
//!
//!     Manager::new(config)?.run()
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            ikvm-core                             │
//! ├────────────┬────────────┬─────────────┬─────────────┬────────────┤
//! │ ikvm-video │ ikvm-input │   ikvm-rfb  │ ikvm-monitor│ikvm-manager│
//! │            │            │             │             │            │
//! │  Capture   │   Input    │   Server    │   Monitor   │  Manager   │
//! │  BufferRing│            │  ClientData │  CoreContext│  Rendezvous│
//! └─────┬──────┴─────┬──────┴──────┬──────┴──────┬──────┴──────┬─────┘
//!       │            │             │             │             │
//!       ▼            ▼             ▼             ▼             ▼
//!   V4L2 driver   HID gadgets   RFB clients   property bus  T_server/T_video/T_bus
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// V4L2 capture engine and buffer ring.
///
/// See [`ikvm_video`] documentation for details.
#[cfg(feature = "video")]
#[cfg_attr(docsrs, doc(cfg(feature = "video")))]
pub use ikvm_video as video;

/// HID keyboard/pointer relay and LED echo.
///
/// See [`ikvm_input`] documentation for details.
#[cfg(feature = "input")]
#[cfg_attr(docsrs, doc(cfg(feature = "input")))]
pub use ikvm_input as input;

/// RFB server adapter with the vendor Tight/LED-state/LastRect/IVTP extensions.
///
/// See [`ikvm_rfb`] documentation for details.
#[cfg(feature = "rfb")]
#[cfg_attr(docsrs, doc(cfg(feature = "rfb")))]
pub use ikvm_rfb as rfb;

/// Asynchronous platform event monitor.
///
/// See [`ikvm_monitor`] documentation for details.
#[cfg(feature = "monitor")]
#[cfg_attr(docsrs, doc(cfg(feature = "monitor")))]
pub use ikvm_monitor as monitor;

/// Manager coordinator: three-thread rendezvous and the status/render loop.
///
/// See [`ikvm_manager`] documentation for details.
#[cfg(feature = "manager")]
#[cfg_attr(docsrs, doc(cfg(feature = "manager")))]
pub use ikvm_manager as manager;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use ikvm_core::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "video")]
    pub use ikvm_video::{CaptureConfig, CaptureEngine, CaptureState, VideoError};

    #[cfg(feature = "input")]
    pub use ikvm_input::{HidConfig, Input, InputError};

    #[cfg(feature = "rfb")]
    pub use ikvm_rfb::{RfbError, Server, ServerConfig};

    #[cfg(feature = "monitor")]
    pub use ikvm_monitor::{CoreContext, Monitor, MonitorConfig, MonitorError};

    #[cfg(feature = "manager")]
    pub use ikvm_manager::{Manager, ManagerConfig, ManagerError};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    #[cfg(feature = "video")]
    fn test_video_reexport() {
        let _ = video::CaptureConfig::default();
    }

    #[test]
    #[cfg(feature = "monitor")]
    fn test_monitor_reexport() {
        let _ = monitor::MonitorConfig::default();
    }
}
