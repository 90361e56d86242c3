//! # ikvm-input
//!
//! HID keyboard/pointer relay: opens the gadget device nodes, forwards RFB
//! key/pointer events into HID reports, echoes the host's keyboard LED state
//! back by reading output reports, and sends a connection wake-up packet
//! before capture starts.
//!
//! The HID report wire format is out of scope here (delegated to the HID
//! layer per this crate's design) except for the one piece of translation
//! policy the core owns: the [`keysym`] module's `Intlbackslash` override.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
pub mod keysym;
mod power_save;

pub use config::{HidConfig, HidConfigBuilder};
pub use error::{InputError, Result};
pub use power_save::{NullPowerSaveControl, PowerSaveControl};

use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::unistd;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Length of a boot-protocol keyboard output report, including the
/// leading LED-state byte.
pub const KEY_REPORT_LENGTH: usize = 8;

/// Sentinel LED byte meaning "state not yet learned from host", which
/// triggers the server's NumLock probe sequence.
pub const INITIAL_LED_STATE: u8 = 0xFF;

const LED_NUM_LOCK_BIT: u8 = 1 << 0;
const LED_CAPS_LOCK_BIT: u8 = 1 << 1;
const LED_SCROLL_LOCK_BIT: u8 = 1 << 2;

/// Decoded keyboard LED indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    pub num_lock: bool,
    pub caps_lock: bool,
    pub scroll_lock: bool,
}

impl LedState {
    fn from_byte(byte: u8) -> Self {
        Self {
            num_lock: byte & LED_NUM_LOCK_BIT != 0,
            caps_lock: byte & LED_CAPS_LOCK_BIT != 0,
            scroll_lock: byte & LED_SCROLL_LOCK_BIT != 0,
        }
    }
}

/// Opaque handle identifying the RFB client a key/pointer event originated
/// from, used only for logging/attribution; no ownership is implied.
pub type ClientId = u32;

/// HID keyboard/pointer relay.
pub struct Input {
    config: HidConfig,
    keyboard_fd: Option<RawFd>,
    pointer_fd: Option<RawFd>,
    led_byte: u8,
    power_save: Arc<dyn PowerSaveControl>,
}

impl Input {
    pub fn new(config: HidConfig) -> Self {
        Self::with_power_save(config, Arc::new(NullPowerSaveControl))
    }

    pub fn with_power_save(config: HidConfig, power_save: Arc<dyn PowerSaveControl>) -> Self {
        Self { config, keyboard_fd: None, pointer_fd: None, led_byte: INITIAL_LED_STATE, power_save }
    }

    pub fn is_connected(&self) -> bool {
        self.keyboard_fd.is_some()
    }

    /// Opens the keyboard and pointer HID nodes read-write and disables
    /// host USB power save (mode 0), matching the 0→1 client transition.
    pub fn connect(&mut self) -> Result<()> {
        let keyboard = fcntl::open(Path::new(&self.config.keyboard_path), OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())?;
        let pointer = fcntl::open(Path::new(&self.config.pointer_path), OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())?;
        self.keyboard_fd = Some(keyboard);
        self.pointer_fd = Some(pointer);
        self.led_byte = INITIAL_LED_STATE;

        if let Err(e) = self.power_save.set_power_save(false) {
            warn!(error = %e, "failed to disable USB power save on connect");
        }
        Ok(())
    }

    /// Closes both HID nodes and re-enables host USB power save (mode 1),
    /// matching the 1→0 client transition.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(fd) = self.keyboard_fd.take() {
            let _ = unistd::close(fd);
        }
        if let Some(fd) = self.pointer_fd.take() {
            let _ = unistd::close(fd);
        }

        if let Err(e) = self.power_save.set_power_save(true) {
            warn!(error = %e, "failed to re-enable USB power save on disconnect");
        }
        Ok(())
    }

    /// Sends a wake-up packet to the pointer device before capture starts,
    /// nudging a host that went to sleep waiting on USB enumeration.
    pub fn send_wakeup_packet(&self) -> Result<()> {
        let fd = self.pointer_fd.ok_or(InputError::PointerNotConnected)?;
        let wakeup = [0u8; 1];
        unistd::write(fd, &wakeup)?;
        Ok(())
    }

    /// Forwards a key event. `client` is used for logging/attribution only;
    /// the reference design's `lastActivityTime` bookkeeping is owned by the
    /// RFB server adapter, which observes every call through this relay.
    pub fn key_event(&self, down: bool, keysym: u32, client: ClientId) -> Result<()> {
        let fd = self.keyboard_fd.ok_or(InputError::KeyboardNotConnected)?;
        let Some(usage) = keysym::keysym_to_hid_usage(keysym) else {
            debug!(keysym, client, "no HID usage mapping for keysym, dropping");
            return Ok(());
        };
        let mut report = [0u8; KEY_REPORT_LENGTH];
        if down {
            report[2] = usage;
        }
        unistd::write(fd, &report)?;
        Ok(())
    }

    /// Forwards a pointer event. Report layout is delegated to the HID
    /// layer; this writes a minimal absolute-position boot-mouse frame.
    pub fn pointer_event(&self, button_mask: u8, x: u16, y: u16, _client: ClientId) -> Result<()> {
        let fd = self.pointer_fd.ok_or(InputError::PointerNotConnected)?;
        let report =
            [button_mask, (x & 0xFF) as u8, (x >> 8) as u8, (y & 0xFF) as u8, (y >> 8) as u8, 0, 0];
        unistd::write(fd, &report)?;
        Ok(())
    }

    /// Opens the keyboard HID node non-blocking, selects until readable for
    /// up to `timeout`, and reads the output report. Byte 0 is the LED
    /// state.
    pub fn read_keyboard_out_report(&mut self, timeout: Duration) -> Result<()> {
        let fd = self.keyboard_fd.ok_or(InputError::KeyboardNotConnected)?;

        // SAFETY: fd is a valid, currently-open file descriptor for the
        // duration of this poll call.
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut poll_fd = [nix::poll::PollFd::new(borrowed_fd, nix::poll::PollFlags::POLLIN)];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match nix::poll::poll(&mut poll_fd, timeout_ms) {
            Ok(n) if n > 0 => {
                let mut buf = [0u8; KEY_REPORT_LENGTH - 1];
                match unistd::read(fd, &mut buf) {
                    Ok(read) if read > 0 => self.led_byte = buf[0],
                    Ok(_) => {}
                    Err(e) => warn!(errno = e as i32, "read of keyboard output report failed"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(errno = e as i32, "poll() on keyboard fd failed"),
        }
        Ok(())
    }

    /// The raw LED byte, as read by [`Input::read_keyboard_out_report`].
    pub fn keyboard_led_byte(&self) -> u8 {
        self.led_byte
    }

    /// Decoded LED state.
    pub fn get_keyboard_led_state(&self) -> LedState {
        LedState::from_byte(self.led_byte)
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_state_decode() {
        let state = LedState::from_byte(0b0000_0011);
        assert!(state.num_lock);
        assert!(state.caps_lock);
        assert!(!state.scroll_lock);
    }

    #[test]
    fn test_initial_led_state_is_not_a_valid_decode() {
        // INITIAL_LED_STATE (0xFF) is a sentinel, not a real LED byte; the
        // server is responsible for checking the raw byte before decoding.
        assert_eq!(INITIAL_LED_STATE, 0xFF);
    }

    #[test]
    fn test_input_not_connected_errors() {
        let input = Input::new(HidConfig::default());
        assert!(matches!(input.key_event(true, b'a' as u32, 1), Err(InputError::KeyboardNotConnected)));
        assert!(matches!(input.pointer_event(0, 0, 0, 1), Err(InputError::PointerNotConnected)));
    }
}
