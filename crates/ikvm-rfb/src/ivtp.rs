//! IVTP control framing, tunneled inside RFB's `ServerCutText` message for
//! out-of-band session control.
//!
//! Wire layout (20 bytes total, network byte order):
//!
//! ```text
//! Off Sz Field
//!  0   1  msg-type  = 3 (ServerCutText)
//!  1   3  padding   = 0
//!  4   4  length    = htonl(payload-bytes)       // 12 for stop-session
//!  8   4  magic     = "IVTP"
//! 12   2  op-code   = htons(op_code)
//! 14   4  payload-length = htonl(0)
//! 18   2  status    = htons(status)
//! ```

const SERVER_CUT_TEXT_MSG_TYPE: u8 = 3;
const MAGIC: &[u8; 4] = b"IVTP";
const PAYLOAD_BYTES: u32 = 12;

/// `STOP_SESSION_IMMEDIATE`, the only op-code this core emits. Pinned to
/// `0x0008` (the later, more complete of two historical variants).
pub const OP_STOP_SESSION_IMMEDIATE: u16 = 0x0008;

pub const STATUS_SUCCESS: u16 = 0x0000;

/// Encodes an IVTP control frame as exactly 20 bytes.
pub fn encode(op_code: u16, status: u16) -> [u8; 20] {
    let mut frame = [0u8; 20];
    frame[0] = SERVER_CUT_TEXT_MSG_TYPE;
    // bytes 1..4 padding, already zero
    frame[4..8].copy_from_slice(&PAYLOAD_BYTES.to_be_bytes());
    frame[8..12].copy_from_slice(MAGIC);
    frame[12..14].copy_from_slice(&op_code.to_be_bytes());
    // bytes 14..18 payload-length = 0, already zero
    frame[18..20].copy_from_slice(&status.to_be_bytes());
    frame
}

/// The stop-session-immediate frame every mass-disconnect emits.
pub fn stop_session_immediate() -> [u8; 20] {
    encode(OP_STOP_SESSION_IMMEDIATE, STATUS_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_session_frame_is_exactly_20_bytes() {
        let frame = stop_session_immediate();
        assert_eq!(frame.len(), 20);
    }

    #[test]
    fn test_stop_session_frame_layout() {
        let frame = stop_session_immediate();
        assert_eq!(frame[0], 3);
        assert_eq!(&frame[1..4], &[0, 0, 0]);
        assert_eq!(u32::from_be_bytes(frame[4..8].try_into().unwrap()), 12);
        assert_eq!(&frame[8..12], b"IVTP");
        assert_eq!(u16::from_be_bytes(frame[12..14].try_into().unwrap()), 0x0008);
        assert_eq!(u32::from_be_bytes(frame[14..18].try_into().unwrap()), 0);
        assert_eq!(u16::from_be_bytes(frame[18..20].try_into().unwrap()), 0);
    }

    #[test]
    fn test_round_trip_exact_bytes() {
        let frame = encode(0x0008, 0x0000);
        let expected: [u8; 20] = [
            3, 0, 0, 0, // msg-type + padding
            0, 0, 0, 12, // length
            b'I', b'V', b'T', b'P', // magic
            0, 8, // op-code
            0, 0, 0, 0, // payload-length
            0, 0, // status
        ];
        assert_eq!(frame, expected);
    }
}
