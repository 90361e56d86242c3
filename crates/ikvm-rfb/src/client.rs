//! Per-client RFB state.

use std::time::Instant;

/// Capability negotiation results a real handshake would populate from the
/// client's `SetEncodings` message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCapabilities {
    pub tight: bool,
    pub keyboard_led_state: bool,
    pub last_rect: bool,
}

/// Per connected RFB client. Mirrors `Server::ClientData` verbatim.
pub struct ClientData {
    /// Initial resize grace: frames to skip, set to `frameRate` on connect
    /// (or on resize), rounded down to a multiple of 8.
    pub skip_frame: u32,
    /// True after the client requests an update, cleared once one is sent.
    pub need_update: bool,
    /// Sentinel -1 means "no frame sent yet".
    pub last_crc: i64,
    /// 8-bit session handle returned by the session registry.
    pub session_id: u8,
    pub last_activity_time: Instant,
    pub capabilities: ClientCapabilities,
    /// Last LED byte sent to this client, for the LED-state extension.
    pub last_led_byte: u8,
    pub frame_sent: bool,
}

impl ClientData {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            skip_frame: round_down_to_multiple_of_8(frame_rate),
            need_update: false,
            last_crc: -1,
            session_id: 0,
            last_activity_time: Instant::now(),
            capabilities: ClientCapabilities::default(),
            last_led_byte: ikvm_input::INITIAL_LED_STATE,
            frame_sent: false,
        }
    }

    pub fn touch_activity(&mut self) {
        self.last_activity_time = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity_time.elapsed()
    }

    /// Resize grace: re-arm `skip_frame` to the current frame rate and force
    /// a full-rect update once the new dimensions are in effect.
    pub fn reset_for_resize(&mut self, frame_rate: u32) {
        self.skip_frame = round_down_to_multiple_of_8(frame_rate);
        self.need_update = true;
    }
}

fn round_down_to_multiple_of_8(value: u32) -> u32 {
    value - (value % 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_frame_rounds_down_to_multiple_of_8() {
        let client = ClientData::new(30);
        assert_eq!(client.skip_frame, 24);
        let client = ClientData::new(32);
        assert_eq!(client.skip_frame, 32);
    }

    #[test]
    fn test_initial_last_crc_is_sentinel() {
        let client = ClientData::new(30);
        assert_eq!(client.last_crc, -1);
    }

    #[test]
    fn test_activity_is_monotonic() {
        let mut client = ClientData::new(30);
        let first = client.last_activity_time;
        client.touch_activity();
        assert!(client.last_activity_time >= first);
    }
}
