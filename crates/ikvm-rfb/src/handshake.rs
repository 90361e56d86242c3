//! RFB 3.8 version/security/init handshake, server side only.
//!
//! Grounded on the whitequark `rust-vnc` server module's handshake sequence,
//! narrowed to the one security type this core ever offers (`None`) since
//! authentication is explicitly out of scope.

use std::io::{self, Read, Write};
use std::net::TcpStream;

const RFB_VERSION: &[u8; 12] = b"RFB 003.008\n";
const SECURITY_TYPE_NONE: u8 = 1;
const SECURITY_RESULT_OK: u32 = 0;

pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_color: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// 24-bit true-color RGB, matching the capture engine's RGB24 fallback
    /// format.
    pub fn rgb24() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_color: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[
            self.bits_per_pixel,
            self.depth,
            u8::from(self.big_endian),
            u8::from(self.true_color),
        ])?;
        writer.write_all(&self.red_max.to_be_bytes())?;
        writer.write_all(&self.green_max.to_be_bytes())?;
        writer.write_all(&self.blue_max.to_be_bytes())?;
        writer.write_all(&[self.red_shift, self.green_shift, self.blue_shift])?;
        writer.write_all(&[0u8; 3]) // padding
    }
}

pub struct ServerInit<'a> {
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
    pub name: &'a str,
}

impl ServerInit<'_> {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.width.to_be_bytes())?;
        writer.write_all(&self.height.to_be_bytes())?;
        self.pixel_format.write_to(writer)?;
        let name_bytes = self.name.as_bytes();
        writer.write_all(&(name_bytes.len() as u32).to_be_bytes())?;
        writer.write_all(name_bytes)
    }
}

/// Performs the version, security and init handshake over a freshly
/// accepted stream. Returns once `ServerInit` has been written; the caller
/// owns the stream for the rest of the connection's life.
pub fn perform(stream: &mut TcpStream, width: u16, height: u16, desktop_name: &str) -> io::Result<()> {
    stream.write_all(RFB_VERSION)?;
    let mut client_version = [0u8; 12];
    stream.read_exact(&mut client_version)?;

    // Single security type offered: None. RFB 3.7+ framing.
    stream.write_all(&[1, SECURITY_TYPE_NONE])?;
    let mut chosen = [0u8; 1];
    stream.read_exact(&mut chosen)?;

    stream.write_all(&SECURITY_RESULT_OK.to_be_bytes())?;

    let mut client_init = [0u8; 1];
    stream.read_exact(&mut client_init)?;

    ServerInit {
        width,
        height,
        pixel_format: PixelFormat::rgb24(),
        name: desktop_name,
    }
    .write_to(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_write_length() {
        let mut buf = Vec::new();
        PixelFormat::rgb24().write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_server_init_write_includes_name() {
        let mut buf = Vec::new();
        ServerInit {
            width: 1024,
            height: 768,
            pixel_format: PixelFormat::rgb24(),
            name: "OpenBMC IKVM",
        }
        .write_to(&mut buf)
        .unwrap();
        assert!(buf.ends_with(b"OpenBMC IKVM"));
    }
}
