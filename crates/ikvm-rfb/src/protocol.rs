//! Hand-rolled RFB wire framing for the encodings this adapter needs.
//!
//! No published RFB/VNC crate implements the Tight-with-bounding-box path
//! alongside the Keyboard-LED-State and LastRect vendor pseudo-encodings, so
//! these are written directly against the wire protocol, in the spirit of a
//! plain message-enum/`write_to` library rather than a full client-pull VNC
//! stack (server push only; this core never negotiates the handshake's
//! security types itself, see [`crate::handshake`]).

use std::io::{self, Read, Write};

const FRAMEBUFFER_UPDATE_MSG_TYPE: u8 = 0;

const ENCODING_RAW: i32 = 0;
const ENCODING_TIGHT: i32 = 7;
/// Vendor pseudo-encoding carrying the keyboard LED state out of band,
/// mirrored from the well-known negative libvncserver extension range.
const ENCODING_KEYBOARD_LED_STATE: i32 = -261;
/// Vendor pseudo-encoding marking the final rectangle of an update.
const ENCODING_LAST_RECT: i32 = -224;

const TIGHT_JPEG_SUBENCODING: u8 = 0x09 << 4;

/// Rectangle count field per §4.2 step 10: `0xFFFF` when the client
/// negotiated either Keyboard-LED-State or LastRect, else the byte-swapped
/// value `1`.
pub fn rect_count_field(client_supports_extension: bool) -> u16 {
    if client_supports_extension {
        0xFFFF
    } else {
        1u16.swap_bytes()
    }
}

pub fn write_framebuffer_update_header<W: Write>(writer: &mut W, num_rects: u16) -> io::Result<()> {
    writer.write_all(&[FRAMEBUFFER_UPDATE_MSG_TYPE, 0])?;
    writer.write_all(&num_rects.to_be_bytes())
}

fn write_rect_header<W: Write>(
    writer: &mut W,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    encoding: i32,
) -> io::Result<()> {
    writer.write_all(&x.to_be_bytes())?;
    writer.write_all(&y.to_be_bytes())?;
    writer.write_all(&width.to_be_bytes())?;
    writer.write_all(&height.to_be_bytes())?;
    writer.write_all(&encoding.to_be_bytes())
}

/// Writes a raw (uncompressed) rectangle covering the whole framebuffer,
/// used for the RGB24 capture pixel format.
pub fn write_raw_rect<W: Write>(writer: &mut W, width: u16, height: u16, pixels: &[u8]) -> io::Result<()> {
    write_rect_header(writer, 0, 0, width, height, ENCODING_RAW)?;
    writer.write_all(pixels)
}

/// Writes a Tight-encoded JPEG rectangle. `x`/`y`/`width`/`height` describe
/// either the PartialJPEG bounding box or the full frame.
pub fn write_tight_jpeg_rect<W: Write>(
    writer: &mut W,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    jpeg_bytes: &[u8],
) -> io::Result<()> {
    write_rect_header(writer, x, y, width, height, ENCODING_TIGHT)?;
    writer.write_all(&[TIGHT_JPEG_SUBENCODING])?;
    write_tight_compact_length(writer, jpeg_bytes.len())?;
    writer.write_all(jpeg_bytes)
}

/// Tight's variable-length compact length encoding: 1-3 bytes, 7 bits of
/// length per byte, continuation bit set on all but the last byte.
fn write_tight_compact_length<W: Write>(writer: &mut W, mut len: usize) -> io::Result<()> {
    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
            writer.write_all(&[byte])?;
        } else {
            writer.write_all(&[byte])?;
            break;
        }
    }
    Ok(())
}

/// Writes the Keyboard-LED-State vendor message: a zero-size rectangle at
/// (0,0) whose pseudo-encoding carries the LED byte in its width field.
pub fn write_led_state_rect<W: Write>(writer: &mut W, led_byte: u8) -> io::Result<()> {
    write_rect_header(writer, 0, 0, u16::from(led_byte), 0, ENCODING_KEYBOARD_LED_STATE)
}

/// Writes the LastRect marker: a zero-size rectangle whose pseudo-encoding
/// tells the client no more rectangles follow this update.
pub fn write_last_rect_marker<W: Write>(writer: &mut W) -> io::Result<()> {
    write_rect_header(writer, 0, 0, 0, 0, ENCODING_LAST_RECT)
}

const C2S_SET_PIXEL_FORMAT: u8 = 0;
const C2S_SET_ENCODINGS: u8 = 2;
const C2S_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
const C2S_KEY_EVENT: u8 = 4;
const C2S_POINTER_EVENT: u8 = 5;
const C2S_CLIENT_CUT_TEXT: u8 = 6;

/// Client-to-server messages this adapter reacts to. Unknown encodings and
/// `SetPixelFormat` are read off the wire (to keep framing in sync) but
/// otherwise ignored, matching the reference server's fixed output format.
#[derive(Debug)]
pub enum Event {
    SetEncodings { tight: bool, keyboard_led_state: bool, last_rect: bool },
    FramebufferUpdateRequest { incremental: bool },
    KeyEvent { down: bool, keysym: u32 },
    PointerEvent { button_mask: u8, x: u16, y: u16 },
    ClientCutText,
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Reads one client-to-server message, blocking until the message type byte
/// and its full body are available.
pub fn read_event<R: Read>(reader: &mut R) -> io::Result<Event> {
    let mut msg_type = [0u8; 1];
    reader.read_exact(&mut msg_type)?;
    match msg_type[0] {
        C2S_SET_PIXEL_FORMAT => {
            let mut rest = [0u8; 19];
            reader.read_exact(&mut rest)?;
            read_event(reader)
        }
        C2S_SET_ENCODINGS => {
            let mut padding = [0u8; 1];
            reader.read_exact(&mut padding)?;
            let count = read_u16(reader)?;
            let (mut tight, mut keyboard_led_state, mut last_rect) = (false, false, false);
            for _ in 0..count {
                let encoding = i32::from_be_bytes({
                    let mut buf = [0u8; 4];
                    reader.read_exact(&mut buf)?;
                    buf
                });
                match encoding {
                    ENCODING_TIGHT => tight = true,
                    ENCODING_KEYBOARD_LED_STATE => keyboard_led_state = true,
                    ENCODING_LAST_RECT => last_rect = true,
                    _ => {}
                }
            }
            Ok(Event::SetEncodings { tight, keyboard_led_state, last_rect })
        }
        C2S_FRAMEBUFFER_UPDATE_REQUEST => {
            let mut incremental = [0u8; 1];
            reader.read_exact(&mut incremental)?;
            let _x = read_u16(reader)?;
            let _y = read_u16(reader)?;
            let _width = read_u16(reader)?;
            let _height = read_u16(reader)?;
            Ok(Event::FramebufferUpdateRequest { incremental: incremental[0] != 0 })
        }
        C2S_KEY_EVENT => {
            let mut down = [0u8; 1];
            reader.read_exact(&mut down)?;
            let mut padding = [0u8; 2];
            reader.read_exact(&mut padding)?;
            let keysym = read_u32(reader)?;
            Ok(Event::KeyEvent { down: down[0] != 0, keysym })
        }
        C2S_POINTER_EVENT => {
            let mut button_mask = [0u8; 1];
            reader.read_exact(&mut button_mask)?;
            let x = read_u16(reader)?;
            let y = read_u16(reader)?;
            Ok(Event::PointerEvent { button_mask: button_mask[0], x, y })
        }
        C2S_CLIENT_CUT_TEXT => {
            let mut padding = [0u8; 3];
            reader.read_exact(&mut padding)?;
            let length = read_u32(reader)?;
            let mut discard = vec![0u8; length as usize];
            reader.read_exact(&mut discard)?;
            Ok(Event::ClientCutText)
        }
        other => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown RFB message type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_event_pointer_event() {
        let mut buf: Vec<u8> = vec![C2S_POINTER_EVENT, 0b0000_0001];
        buf.extend_from_slice(&100u16.to_be_bytes());
        buf.extend_from_slice(&200u16.to_be_bytes());
        let mut cursor = io::Cursor::new(buf);
        let event = read_event(&mut cursor).unwrap();
        match event {
            Event::PointerEvent { button_mask, x, y } => {
                assert_eq!(button_mask, 1);
                assert_eq!(x, 100);
                assert_eq!(y, 200);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_read_event_set_encodings_detects_vendor_pseudo_encodings() {
        let mut buf: Vec<u8> = vec![C2S_SET_ENCODINGS, 0];
        buf.extend_from_slice(&3u16.to_be_bytes());
        buf.extend_from_slice(&ENCODING_TIGHT.to_be_bytes());
        buf.extend_from_slice(&ENCODING_KEYBOARD_LED_STATE.to_be_bytes());
        buf.extend_from_slice(&ENCODING_LAST_RECT.to_be_bytes());
        let mut cursor = io::Cursor::new(buf);
        let event = read_event(&mut cursor).unwrap();
        match event {
            Event::SetEncodings { tight, keyboard_led_state, last_rect } => {
                assert!(tight);
                assert!(keyboard_led_state);
                assert!(last_rect);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_read_event_key_event() {
        let mut buf: Vec<u8> = vec![C2S_KEY_EVENT, 1, 0, 0];
        buf.extend_from_slice(&0x0061u32.to_be_bytes());
        let mut cursor = io::Cursor::new(buf);
        let event = read_event(&mut cursor).unwrap();
        match event {
            Event::KeyEvent { down, keysym } => {
                assert!(down);
                assert_eq!(keysym, 0x0061);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_rect_count_field_extension_supported() {
        assert_eq!(rect_count_field(true), 0xFFFF);
    }

    #[test]
    fn test_rect_count_field_extension_unsupported_is_byte_swapped_one() {
        assert_eq!(rect_count_field(false), 0x0100);
    }

    #[test]
    fn test_tight_compact_length_small() {
        let mut buf = Vec::new();
        write_tight_compact_length(&mut buf, 42).unwrap();
        assert_eq!(buf, vec![42]);
    }

    #[test]
    fn test_tight_compact_length_multi_byte() {
        let mut buf = Vec::new();
        write_tight_compact_length(&mut buf, 300).unwrap();
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_framebuffer_update_header() {
        let mut buf = Vec::new();
        write_framebuffer_update_header(&mut buf, 0xFFFF).unwrap();
        assert_eq!(buf, vec![0, 0, 0xFF, 0xFF]);
    }
}
