//! Identical-frame CRC32, compatible with `boost::crc<32, 0x04C11DB7,
//! 0xFFFFFFFF, 0xFFFFFFFF, true, true>`: polynomial 0x04C11DB7, both
//! reflected, init and xorout `0xFFFFFFFF`. This is the standard
//! CRC-32/ISO-HDLC (a.k.a. CRC-32, the zip/Ethernet variant), so the `crc`
//! crate's `CRC_32_ISO_HDLC` algorithm is bit-for-bit equivalent.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// JFIF header region to skip before hashing, matching the reference
/// implementation's `data + 0x30`.
const JFIF_HEADER_SKIP: usize = 0x30;

/// Computes the frame-identity CRC over the bytes following the JFIF
/// header. Returns `None` if the frame is shorter than the skip offset.
pub fn frame_crc(data: &[u8]) -> Option<i64> {
    let body = data.get(JFIF_HEADER_SKIP..)?;
    Some(i64::from(CRC32.checksum(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_frames_same_crc() {
        let mut frame = vec![0u8; 0x30];
        frame.extend_from_slice(b"identical payload bytes");
        let a = frame_crc(&frame);
        let b = frame_crc(&frame);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_different_frames_different_crc() {
        let mut a = vec![0u8; 0x30];
        a.extend_from_slice(b"payload one");
        let mut b = vec![0u8; 0x30];
        b.extend_from_slice(b"payload two");
        assert_ne!(frame_crc(&a), frame_crc(&b));
    }

    #[test]
    fn test_short_frame_returns_none() {
        assert_eq!(frame_crc(&[0u8; 10]), None);
    }
}
