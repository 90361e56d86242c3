//! Raw `<linux/videodev2.h>` struct mirrors and ioctl numbers.
//!
//! No safe, high-level V4L2 crate exposes `VIDIOC_G_SELECTION`,
//! `VIDIOC_QUERY_DV_TIMINGS`/`S_DV_TIMINGS`, or the vendor PARTIAL_JPG pixel
//! format flag this engine needs, so this module talks to the driver
//! directly the way the `v4l`/`v4l2r` crates do internally: `nix::ioctl_*!`
//! over plain `#[repr(C)]` structs.

#![allow(non_camel_case_types)]

use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};

pub const VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const STREAMING: u32 = 0x0400_0000;

pub const BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const MEMORY_MMAP: u32 = 1;

pub const BUF_FLAG_ERROR: u32 = 0x0040;

pub const PIX_FMT_JPEG: u32 = fourcc(b'J', b'P', b'E', b'G');
pub const PIX_FMT_RGB24: u32 = fourcc(b'R', b'G', b'B', b'3');

/// Vendor extension bit requesting tiled partial-JPEG updates. Not part of
/// upstream videodev2.h; OR'd into `v4l2_pix_format.flags` the same way the
/// reference driver's out-of-tree patch does.
pub const FMT_FLAG_PARTIAL_JPG: u32 = 0x0100;

pub const CID_JPEG_CHROMA_SUBSAMPLING: u32 = 0x0099_0907;

pub const SEL_TGT_CROP_DEFAULT: u32 = 1;

/// `v4l2_input.status` bit set when the input has no power (cable unplugged
/// at the source, or a disconnected sink).
pub const IN_ST_NO_POWER: u32 = 0x0000_0001;
/// `v4l2_input.status` bit set when the input has power but no signal (host
/// off, or a resolution the driver can't lock to).
pub const IN_ST_NO_SIGNAL: u32 = 0x0000_0002;

const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub flags: u32,
    pub priv_or_ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    // The kernel union is large (200 bytes); only `pix` is used for capture.
    pub pix: v4l2_pix_format,
    pub _union_pad: [u8; 200 - std::mem::size_of::<v4l2_pix_format>()],
}

impl Default for v4l2_format {
    fn default() -> Self {
        Self {
            type_: BUF_TYPE_VIDEO_CAPTURE,
            pix: v4l2_pix_format::default(),
            _union_pad: [0; 200 - std::mem::size_of::<v4l2_pix_format>()],
        }
    }
}

impl std::fmt::Debug for v4l2_format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("v4l2_format").field("type_", &self.type_).field("pix", &self.pix).finish()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_captureparm {
    pub capability: u32,
    pub capturemode: u32,
    pub timeperframe: v4l2_fract,
    pub extendedmode: u32,
    pub readbuffers: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_streamparm {
    pub type_: u32,
    pub capture: v4l2_captureparm,
    pub _union_pad: [u8; 200 - std::mem::size_of::<v4l2_captureparm>()],
}

impl Default for v4l2_streamparm {
    fn default() -> Self {
        Self {
            type_: BUF_TYPE_VIDEO_CAPTURE,
            capture: v4l2_captureparm::default(),
            _union_pad: [0; 200 - std::mem::size_of::<v4l2_captureparm>()],
        }
    }
}

impl std::fmt::Debug for v4l2_streamparm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("v4l2_streamparm")
            .field("type_", &self.type_)
            .field("capture", &self.capture)
            .finish()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_control {
    pub id: u32,
    pub value: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

impl Default for v4l2_timecode {
    fn default() -> Self {
        Self { type_: 0, flags: 0, frames: 0, seconds: 0, minutes: 0, hours: 0, userbits: [0; 4] }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp_sec: i64,
    pub timestamp_usec: i64,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m_offset: u32,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_selection {
    pub type_: u32,
    pub target: u32,
    pub flags: u32,
    pub r: v4l2_rect,
    pub reserved: [u32; 9],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_input {
    pub index: u32,
    pub name: [u8; 32],
    pub type_: u32,
    pub audioset: u32,
    pub tuner: u32,
    pub std: u64,
    pub status: u32,
    pub capabilities: u32,
    pub reserved: [u32; 3],
}

impl Default for v4l2_input {
    fn default() -> Self {
        Self {
            index: 0,
            name: [0; 32],
            type_: 0,
            audioset: 0,
            tuner: 0,
            std: 0,
            status: 0,
            capabilities: 0,
            reserved: [0; 3],
        }
    }
}

impl std::fmt::Debug for v4l2_input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("v4l2_input").field("index", &self.index).field("status", &self.status).finish()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct v4l2_bt_timings {
    pub width: u32,
    pub height: u32,
    pub interlaced: u32,
    pub polarities: u32,
    pub pixelclock: u64,
    pub hfrontporch: u32,
    pub hsync: u32,
    pub hbackporch: u32,
    pub vfrontporch: u32,
    pub vsync: u32,
    pub vbackporch: u32,
    pub il_vfrontporch: u32,
    pub il_vsync: u32,
    pub il_vbackporch: u32,
    pub standards: u32,
    pub flags: u32,
    pub reserved: [u32; 14],
}

/// Kernel union size is `reserved[32]` (128 bytes), matching `v4l2_bt_timings`
/// exactly, so no padding bytes remain.
const DV_TIMINGS_UNION_SIZE: usize = 128;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_dv_timings {
    pub type_: u32,
    pub bt: v4l2_bt_timings,
    pub _union_pad: [u8; DV_TIMINGS_UNION_SIZE - std::mem::size_of::<v4l2_bt_timings>()],
}

impl Default for v4l2_dv_timings {
    fn default() -> Self {
        Self {
            type_: 0,
            bt: v4l2_bt_timings::default(),
            _union_pad: [0; DV_TIMINGS_UNION_SIZE - std::mem::size_of::<v4l2_bt_timings>()],
        }
    }
}

impl std::fmt::Debug for v4l2_dv_timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("v4l2_dv_timings").field("type_", &self.type_).field("bt", &self.bt).finish()
    }
}

const V4L2_MAGIC: u8 = b'V';

ioctl_read!(querycap, V4L2_MAGIC, 0, v4l2_capability);
ioctl_readwrite!(g_fmt, V4L2_MAGIC, 4, v4l2_format);
ioctl_readwrite!(s_fmt, V4L2_MAGIC, 5, v4l2_format);
ioctl_readwrite!(reqbufs, V4L2_MAGIC, 8, v4l2_requestbuffers);
ioctl_readwrite!(querybuf, V4L2_MAGIC, 9, v4l2_buffer);
ioctl_readwrite!(qbuf, V4L2_MAGIC, 15, v4l2_buffer);
ioctl_readwrite!(dqbuf, V4L2_MAGIC, 17, v4l2_buffer);
ioctl_write_ptr!(streamon, V4L2_MAGIC, 18, u32);
ioctl_write_ptr!(streamoff, V4L2_MAGIC, 19, u32);
ioctl_readwrite!(g_parm, V4L2_MAGIC, 21, v4l2_streamparm);
ioctl_readwrite!(s_parm, V4L2_MAGIC, 22, v4l2_streamparm);
ioctl_readwrite!(s_ctrl, V4L2_MAGIC, 28, v4l2_control);
ioctl_readwrite!(g_selection, V4L2_MAGIC, 94, v4l2_selection);
ioctl_readwrite!(query_dv_timings, V4L2_MAGIC, 99, v4l2_dv_timings);
ioctl_readwrite!(s_dv_timings, V4L2_MAGIC, 87, v4l2_dv_timings);
ioctl_readwrite!(enuminput, V4L2_MAGIC, 26, v4l2_input);
ioctl_read!(g_input, V4L2_MAGIC, 38, i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_codes() {
        assert_eq!(PIX_FMT_JPEG, u32::from_le_bytes(*b"JPEG"));
        assert_eq!(PIX_FMT_RGB24, u32::from_le_bytes(*b"RGB3"));
    }

    #[test]
    fn test_format_struct_size_is_kernel_compatible() {
        assert_eq!(std::mem::size_of::<v4l2_format>(), 4 + 200);
        assert_eq!(std::mem::size_of::<v4l2_streamparm>(), 4 + 200);
    }

    #[test]
    fn test_dv_timings_struct_size_is_kernel_compatible() {
        assert_eq!(std::mem::size_of::<v4l2_bt_timings>(), DV_TIMINGS_UNION_SIZE);
        assert_eq!(std::mem::size_of::<v4l2_dv_timings>(), 8 + DV_TIMINGS_UNION_SIZE);
    }
}
