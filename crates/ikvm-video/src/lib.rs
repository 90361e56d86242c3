//! # ikvm-video
//!
//! V4L2 streaming capture engine and mmap buffer ring.
//!
//! [`CaptureEngine`] owns the V4L2 file descriptor: it negotiates format,
//! frame rate and chroma subsampling, maintains a [`BufferRing`] of 2-3
//! mmap'd driver buffers, and exposes non-blocking frame acquisition plus
//! DV-timings-driven resize. See [`CaptureEngine::start`] for the exact
//! negotiation sequence.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ikvm_video::{CaptureEngine, CaptureConfig};
//!
//! let mut engine = CaptureEngine::new(CaptureConfig::default());
//! engine.start()?;
//! engine.get_frame()?;
//! if let Some(data) = engine.data() {
//!     // forward `data` to RFB clients
//! }
//! engine.release_frames();
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod config;
mod error;
mod sys;

pub use buffer::{Buffer, BoundingBox, BufferRing};
pub use config::{CaptureConfig, CaptureConfigBuilder, FrameFormat, Subsampling};
pub use error::{Result, VideoError};

use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::unistd;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const MIN_BUFFERS: u32 = 2;
const REQUESTED_BUFFERS: u32 = 3;
const SELECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Signal status reported by [`CaptureEngine::signal_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    /// Signal present, frames can be captured normally.
    Present,
    /// Driver reports no-signal (cable unplugged, host off, resolution
    /// unsupported).
    NoSignal,
    /// The signal-status query itself failed at the I/O level.
    IoError,
}

/// Runtime state of the capture pipeline. Mirrors `CaptureState` verbatim.
#[derive(Debug)]
pub struct CaptureState {
    fd: Option<RawFd>,
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub subsampling: Subsampling,
    pub frame_format: FrameFormat,
    pub original_frame_format: FrameFormat,
    pub frame_rate: u32,
    resize_after_open: bool,
    timings_error: bool,
}

impl CaptureState {
    fn new(config: &CaptureConfig) -> Self {
        Self {
            fd: None,
            width: 0,
            height: 0,
            pixelformat: sys::PIX_FMT_JPEG,
            subsampling: config.subsampling,
            frame_format: config.frame_format,
            original_frame_format: config.frame_format,
            frame_rate: config.frame_rate,
            resize_after_open: false,
            timings_error: false,
        }
    }
}

/// Owns the V4L2 fd, the negotiated [`CaptureState`], and the [`BufferRing`].
pub struct CaptureEngine {
    config: CaptureConfig,
    state: CaptureState,
    ring: BufferRing,
}

impl CaptureEngine {
    pub fn new(config: CaptureConfig) -> Self {
        let state = CaptureState::new(&config);
        Self { config, state, ring: BufferRing::default() }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    fn fd(&self) -> Result<RawFd> {
        self.state.fd.ok_or_else(|| VideoError::Io(std::io::Error::from(std::io::ErrorKind::NotConnected)))
    }

    /// Start sequence: §4.1 of the design this engine implements.
    ///
    /// 1. open device read-write (blocking)
    /// 2. `QUERYCAP`, fail if `VIDEO_CAPTURE`/`STREAMING` absent
    /// 3. `G_FMT`/`S_FMT` (JPEG, PARTIAL_JPG flag when requested)
    /// 4. `S_PARM` frame rate, `S_CTRL` subsampling (both non-fatal)
    /// 5. record driver-reported dimensions/pixelformat
    /// 6. `resize()` to allocate and enqueue the buffer ring
    /// 7. set `resize_after_open` if dimensions changed across the open
    pub fn start(&mut self) -> Result<()> {
        let pre_width = self.state.width;
        let pre_height = self.state.height;

        let fd = fcntl::open(Path::new(&self.config.video_path), OFlag::O_RDWR, Mode::empty())?;
        self.state.fd = Some(fd);

        let mut cap = sys::v4l2_capability::default();
        // SAFETY: `fd` is a freshly opened, valid V4L2 character device; `cap`
        // is a correctly sized, zeroed buffer for the ioctl to fill.
        unsafe { sys::querycap(fd, &mut cap) }.map_err(|e| VideoError::ioctl("VIDIOC_QUERYCAP", e as i32))?;
        if cap.capabilities & sys::VIDEO_CAPTURE == 0 || cap.capabilities & sys::STREAMING == 0 {
            return Err(VideoError::UnsupportedCapability);
        }

        let mut fmt = sys::v4l2_format::default();
        // SAFETY: see above; `fmt` is correctly sized for VIDIOC_G_FMT.
        unsafe { sys::g_fmt(fd, &mut fmt) }.map_err(|e| VideoError::ioctl("VIDIOC_G_FMT", e as i32))?;

        fmt.pix.pixelformat = sys::PIX_FMT_JPEG;
        if self.state.frame_format == FrameFormat::PartialJpeg {
            fmt.pix.flags |= sys::FMT_FLAG_PARTIAL_JPG;
        }
        // SAFETY: see above.
        unsafe { sys::s_fmt(fd, &mut fmt) }.map_err(|e| VideoError::ioctl("VIDIOC_S_FMT", e as i32))?;

        let mut parm = sys::v4l2_streamparm::default();
        parm.capture.timeperframe = sys::v4l2_fract { numerator: 1, denominator: self.state.frame_rate };
        // SAFETY: see above.
        if let Err(e) = unsafe { sys::s_parm(fd, &mut parm) } {
            warn!(errno = e as i32, "VIDIOC_S_PARM failed, continuing with driver default frame rate");
        }

        let mut ctrl = sys::v4l2_control {
            id: sys::CID_JPEG_CHROMA_SUBSAMPLING,
            value: self.state.subsampling.as_ctrl_value(),
        };
        // SAFETY: see above.
        if let Err(e) = unsafe { sys::s_ctrl(fd, &mut ctrl) } {
            warn!(errno = e as i32, "VIDIOC_S_CTRL chroma subsampling failed, continuing");
        }

        self.state.width = fmt.pix.width;
        self.state.height = fmt.pix.height;
        self.state.pixelformat = fmt.pix.pixelformat;
        if fmt.pix.pixelformat != sys::PIX_FMT_JPEG && fmt.pix.pixelformat != sys::PIX_FMT_RGB24 {
            warn!(pixelformat = format!("{:#010x}", fmt.pix.pixelformat), "driver negotiated unexpected pixel format");
        }

        self.resize()?;

        if self.state.width != pre_width || self.state.height != pre_height {
            self.state.resize_after_open = true;
        }

        Ok(())
    }

    /// `STREAMOFF`, unmap all slots, close fd. Clears the done queue first.
    pub fn stop(&mut self) -> Result<()> {
        self.ring.clear_done();

        if let Ok(fd) = self.fd() {
            let buf_type = sys::BUF_TYPE_VIDEO_CAPTURE;
            // SAFETY: fd is a valid, currently-open V4L2 device.
            let _ = unsafe { sys::streamoff(fd, &buf_type) };

            for buffer in self.ring.buffers_mut() {
                // SAFETY: each buffer here was mapped by a prior `resize()`
                // call on this same fd and has not already been unmapped.
                let _ = unsafe { buffer.unmap() };
            }
            self.ring = BufferRing::default();

            let _ = unistd::close(fd);
        }
        self.state.fd = None;
        Ok(())
    }

    fn restart(&mut self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    /// Full requeue cycle: `STREAMOFF` → unmap → `REQBUFS(0)` →
    /// `QUERY_DV_TIMINGS` → `S_DV_TIMINGS` → `REQBUFS(3)` → per-buffer
    /// `QUERYBUF`+mmap+`QBUF` → `STREAMON`.
    ///
    /// Idempotent when `resize_after_open` is set: that flag is consumed and
    /// the driver is left untouched.
    pub fn resize(&mut self) -> Result<()> {
        if self.state.resize_after_open {
            self.state.resize_after_open = false;
            return Ok(());
        }

        let fd = self.fd()?;
        let buf_type = sys::BUF_TYPE_VIDEO_CAPTURE;
        // SAFETY: fd is the currently open device; this is a no-op if the
        // stream was never started.
        let _ = unsafe { sys::streamoff(fd, &buf_type) };

        for buffer in self.ring.buffers_mut() {
            // SAFETY: these mappings were created by a previous resize() on
            // this fd and are being torn down before re-requesting buffers.
            let _ = unsafe { buffer.unmap() };
        }
        self.ring = BufferRing::default();

        let mut zero_req = sys::v4l2_requestbuffers {
            count: 0,
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..Default::default()
        };
        // SAFETY: fd is valid and open.
        unsafe { sys::reqbufs(fd, &mut zero_req) }.map_err(|e| VideoError::ioctl("VIDIOC_REQBUFS(0)", e as i32))?;

        let mut timings = sys::v4l2_dv_timings::default();
        // SAFETY: fd is valid and open.
        unsafe { sys::query_dv_timings(fd, &mut timings) }
            .map_err(|e| VideoError::ioctl("VIDIOC_QUERY_DV_TIMINGS", e as i32))?;
        // SAFETY: fd is valid and open.
        unsafe { sys::s_dv_timings(fd, &mut timings) }
            .map_err(|e| VideoError::ioctl("VIDIOC_S_DV_TIMINGS", e as i32))?;

        let mut req = sys::v4l2_requestbuffers {
            count: REQUESTED_BUFFERS,
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..Default::default()
        };
        // SAFETY: fd is valid and open.
        unsafe { sys::reqbufs(fd, &mut req) }.map_err(|e| VideoError::ioctl("VIDIOC_REQBUFS(3)", e as i32))?;
        if req.count < MIN_BUFFERS {
            return Err(VideoError::InsufficientBuffers { requested: REQUESTED_BUFFERS, got: req.count });
        }

        let mut buffers = Vec::with_capacity(req.count as usize);
        for index in 0..req.count {
            let mut qb = sys::v4l2_buffer {
                index,
                type_: sys::BUF_TYPE_VIDEO_CAPTURE,
                memory: sys::MEMORY_MMAP,
                ..Default::default()
            };
            // SAFETY: fd is valid and open; `qb.index` is within the range
            // just granted by REQBUFS.
            unsafe { sys::querybuf(fd, &mut qb) }.map_err(|e| VideoError::ioctl("VIDIOC_QUERYBUF", e as i32))?;

            // SAFETY: `qb.m_offset`/`qb.length` come directly from a
            // successful QUERYBUF on this fd, which is the contract mmap
            // requires for V4L2 MMAP-memory buffers.
            // SAFETY: fd is a valid, currently-open file descriptor for the
            // duration of this mmap call.
            let borrowed_fd = unsafe { BorrowedFd::borrow_raw(fd) };
            let ptr = unsafe {
                nix::sys::mman::mmap(
                    None,
                    std::num::NonZeroUsize::new(qb.length as usize)
                        .ok_or(VideoError::InvalidResolution)?,
                    nix::sys::mman::ProtFlags::PROT_READ | nix::sys::mman::ProtFlags::PROT_WRITE,
                    nix::sys::mman::MapFlags::MAP_SHARED,
                    borrowed_fd,
                    qb.m_offset as i64,
                )
            }
            .map_err(|e| VideoError::Mmap { index, source: std::io::Error::from_raw_os_error(e as i32) })?;

            // SAFETY: `ptr` was just returned by a successful mmap of
            // `qb.length` bytes and is uniquely owned by this Buffer.
            let buffer = unsafe { Buffer::new(ptr, qb.length as usize) };
            buffers.push(buffer);

            let mut qbuf = sys::v4l2_buffer {
                index,
                type_: sys::BUF_TYPE_VIDEO_CAPTURE,
                memory: sys::MEMORY_MMAP,
                ..Default::default()
            };
            // SAFETY: fd is valid and open; index matches a just-mapped
            // buffer.
            unsafe { sys::qbuf(fd, &mut qbuf) }.map_err(|e| VideoError::ioctl("VIDIOC_QBUF", e as i32))?;
        }
        self.ring = BufferRing::new(buffers);

        // SAFETY: fd is valid and open; buffers are mapped and queued.
        unsafe { sys::streamon(fd, &buf_type) }.map_err(|e| VideoError::ioctl("VIDIOC_STREAMON", e as i32))?;

        Ok(())
    }

    /// Non-blocking dequeue-all-available. Returns immediately if the done
    /// queue is non-empty. Otherwise performs a 1-second `select` and
    /// dequeues every buffer that becomes available.
    pub fn get_frame(&mut self) -> Result<()> {
        if !self.ring.done_is_empty() {
            return Ok(());
        }

        let fd = self.fd()?;
        let flags = fcntl::fcntl(fd, fcntl::FcntlArg::F_GETFL).map_err(|e| VideoError::ioctl("fcntl(F_GETFL)", e as i32))?;
        let flags = OFlag::from_bits_truncate(flags);
        fcntl::fcntl(fd, fcntl::FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
            .map_err(|e| VideoError::ioctl("fcntl(F_SETFL nonblock)", e as i32))?;

        // SAFETY: fd is a valid, currently-open file descriptor for the
        // duration of this poll call.
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut poll_fd = [nix::poll::PollFd::new(borrowed_fd, nix::poll::PollFlags::POLLIN)];
        let timeout_ms = i32::try_from(SELECT_TIMEOUT.as_millis()).unwrap_or(i32::MAX);
        match nix::poll::poll(&mut poll_fd, timeout_ms) {
            Ok(n) if n > 0 => {
                while let Some(index) = self.try_dequeue_one(fd) {
                    debug!(index, "dequeued capture buffer");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(errno = e as i32, "poll() on capture fd failed"),
        }

        let _ = fcntl::fcntl(fd, fcntl::FcntlArg::F_SETFL(flags));
        Ok(())
    }

    fn try_dequeue_one(&mut self, fd: RawFd) -> Option<u32> {
        let mut buf = sys::v4l2_buffer {
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..Default::default()
        };
        // SAFETY: fd is valid, open, and non-blocking for this call.
        match unsafe { sys::dqbuf(fd, &mut buf) } {
            Ok(_) => {
                let index = buf.index;
                if buf.flags & sys::BUF_FLAG_ERROR != 0 {
                    self.requeue(fd, index);
                    return self.try_dequeue_one(fd);
                }

                let bbox = if self.state.frame_format == FrameFormat::PartialJpeg {
                    Some(self.query_bounding_box(fd).unwrap_or_else(|| BoundingBox {
                        left: 0,
                        top: 0,
                        width: self.state.width,
                        height: self.state.height,
                    }))
                } else {
                    None
                };

                let buffer = &mut self.ring.buffers_mut()[index as usize];
                buffer.bytesused = buf.bytesused as usize;
                buffer.sequence = buf.sequence;
                buffer.bbox = bbox;
                self.ring.mark_done(index);
                Some(index)
            }
            Err(_) => None,
        }
    }

    fn query_bounding_box(&self, fd: RawFd) -> Option<BoundingBox> {
        let mut sel = sys::v4l2_selection {
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            target: sys::SEL_TGT_CROP_DEFAULT,
            ..Default::default()
        };
        // SAFETY: fd is valid and open.
        unsafe { sys::g_selection(fd, &mut sel) }.ok()?;
        Some(BoundingBox { left: sel.r.left, top: sel.r.top, width: sel.r.width, height: sel.r.height })
    }

    fn requeue(&mut self, fd: RawFd, index: u32) {
        let mut qbuf = sys::v4l2_buffer {
            index,
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..Default::default()
        };
        // SAFETY: fd is valid and open; index is within the ring.
        if let Err(e) = unsafe { sys::qbuf(fd, &mut qbuf) } {
            warn!(errno = e as i32, index, "failed to re-queue errored buffer");
        }
    }

    /// Pop the front of the done queue and re-queue it. Idempotent on an
    /// empty queue.
    pub fn release_frames(&mut self) {
        let Some(index) = self.ring.release_front() else { return };
        if let Ok(fd) = self.fd() {
            self.requeue(fd, index);
        }
    }

    /// The most recently dequeued frame's bytes, if any.
    pub fn data(&self) -> Option<&[u8]> {
        let index = self.ring.front_done()?;
        Some(self.ring.get(index).data())
    }

    /// The most recently dequeued frame's bounding box (PartialJPEG only).
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let index = self.ring.front_done()?;
        self.ring.get(index).bounding_box()
    }

    /// If `resize_after_open` is set, return true immediately. Otherwise
    /// query DV-timings; on failure, mark `timings_error` once and `restart`.
    /// On success, compare dimensions and clear the done queue if they
    /// changed.
    pub fn needs_resize(&mut self) -> Result<bool> {
        if self.state.resize_after_open {
            return Ok(true);
        }

        let fd = self.fd()?;
        let mut timings = sys::v4l2_dv_timings::default();
        // SAFETY: fd is valid and open.
        if unsafe { sys::query_dv_timings(fd, &mut timings) }.is_err() {
            if !self.state.timings_error {
                self.state.timings_error = true;
                warn!("DV-timings query failed, restarting capture");
            }
            self.restart()?;
            return Ok(false);
        }
        self.state.timings_error = false;

        let width = timings.bt.width;
        let height = timings.bt.height;
        if width == 0 || height == 0 {
            return Err(VideoError::InvalidResolution);
        }

        if width != self.state.width || height != self.state.height {
            self.state.width = width;
            self.state.height = height;
            self.ring.clear_done();
            return Ok(true);
        }

        Ok(false)
    }

    /// `stop` → set `frame_format` → `start`.
    pub fn format_change(&mut self, format: FrameFormat) -> Result<()> {
        self.stop()?;
        self.state.frame_format = format;
        self.start()
    }

    /// Current signal status, used by [`CaptureEngine::screenshot`] to
    /// choose between a live frame and a fallback asset. Queries the active
    /// input's status bits via `VIDIOC_G_INPUT`/`VIDIOC_ENUMINPUT`; a device
    /// that isn't open, or either ioctl failing, degrades to `IoError`.
    pub fn signal_status(&self) -> SignalStatus {
        let Ok(fd) = self.fd() else { return SignalStatus::IoError };

        let mut index: i32 = 0;
        if let Err(e) = unsafe { sys::g_input(fd, &mut index) } {
            warn!(errno = e as i32, "VIDIOC_G_INPUT failed");
            return SignalStatus::IoError;
        }

        let mut input = sys::v4l2_input { index: index as u32, ..Default::default() };
        if let Err(e) = unsafe { sys::enuminput(fd, &mut input) } {
            warn!(errno = e as i32, "VIDIOC_ENUMINPUT failed");
            return SignalStatus::IoError;
        }

        if input.status & sys::IN_ST_NO_SIGNAL != 0 {
            SignalStatus::NoSignal
        } else {
            SignalStatus::Present
        }
    }

    /// Writes a JPEG to `path`, preferring the front done-buffer's bytes,
    /// falling back to `no_signal_path`/`power_off_path` per signal status
    /// and host power state. The caller (Manager) guarantees `frame_format`
    /// is not `PartialJpeg` when this is called.
    pub fn screenshot(
        &self,
        path: &Path,
        no_signal_path: &Path,
        power_off_path: &Path,
        host_power_is_off: bool,
    ) -> Result<()> {
        debug_assert_ne!(self.state.frame_format, FrameFormat::PartialJpeg);

        match self.signal_status() {
            SignalStatus::IoError => std::fs::copy(no_signal_path, path).map(|_| ())?,
            SignalStatus::NoSignal => {
                let source = if host_power_is_off { power_off_path } else { no_signal_path };
                std::fs::copy(source, path).map(|_| ())?
            }
            SignalStatus::Present => {
                let data = self.data().ok_or(VideoError::InvalidResolution)?;
                std::fs::write(path, data)?
            }
        }
        Ok(())
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Validates the JPEG EOI trailer per the frame-trailer testable property:
/// the last two bytes of a delivered frame must be `0xFF 0xD9`.
pub fn is_valid_jpeg_trailer(data: &[u8]) -> bool {
    data.len() >= 2 && data[data.len() - 2] == 0xFF && data[data.len() - 1] == 0xD9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_trailer_valid() {
        let mut data = vec![0xFF, 0xD8, 1, 2, 3];
        data.extend_from_slice(&[0xFF, 0xD9]);
        assert!(is_valid_jpeg_trailer(&data));
    }

    #[test]
    fn test_jpeg_trailer_invalid() {
        let data = vec![0xFF, 0xD8, 1, 2, 3];
        assert!(!is_valid_jpeg_trailer(&data));
    }

    #[test]
    fn test_jpeg_trailer_too_short() {
        assert!(!is_valid_jpeg_trailer(&[0xFF]));
        assert!(!is_valid_jpeg_trailer(&[]));
    }

    #[test]
    fn test_capture_state_defaults_from_config() {
        let config = CaptureConfig::default();
        let state = CaptureState::new(&config);
        assert_eq!(state.frame_rate, 30);
        assert_eq!(state.frame_format, FrameFormat::StandardJpeg);
        assert!(!state.resize_after_open);
    }

    #[test]
    fn test_signal_status_with_no_open_device_is_io_error() {
        let engine = CaptureEngine::new(CaptureConfig::default());
        assert_eq!(engine.signal_status(), SignalStatus::IoError);
    }

    #[test]
    fn test_screenshot_with_no_open_device_falls_back_to_no_signal_asset() {
        let engine = CaptureEngine::new(CaptureConfig::default());
        let dir = std::env::temp_dir();
        let no_signal = dir.join("ikvm-video-test-no-signal-asset.jpeg");
        std::fs::write(&no_signal, [0xFF, 0xD8, b'x', 0xFF, 0xD9]).unwrap();
        let out = dir.join("ikvm-video-test-screenshot-out.jpeg");

        engine.screenshot(&out, &no_signal, &no_signal, false).unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&no_signal).unwrap());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_screenshot_rejects_partial_jpeg_frame_format() {
        let mut engine = CaptureEngine::new(CaptureConfig::default());
        engine.state.frame_format = FrameFormat::PartialJpeg;
        let tmp = std::env::temp_dir().join("ikvm-video-test-screenshot-partial.jpeg");
        let _ = engine.screenshot(&tmp, &tmp, &tmp, false);
    }
}
