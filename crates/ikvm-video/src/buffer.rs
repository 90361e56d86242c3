//! The mmap'd buffer ring.
//!
//! Mirrors `ikvm::Video`'s internal buffer bookkeeping: a fixed vector of
//! driver-owned mmap regions plus a FIFO "done" queue of indices that have
//! been dequeued from the driver but not yet re-queued.

use std::collections::VecDeque;

/// A crop rectangle for partial-JPEG mode, taken from `VIDIOC_G_SELECTION`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// One entry per mmap'd driver buffer.
///
/// Invariant: at any instant a `Buffer` is either queued to the driver or
/// sitting in the ring's done queue (never both, enforced by `BufferRing`).
pub struct Buffer {
    ptr: *mut libc::c_void,
    len: usize,
    pub(crate) queued: bool,
    pub(crate) bytesused: usize,
    pub(crate) sequence: u32,
    pub(crate) bbox: Option<BoundingBox>,
}

// SAFETY: the mmap region is owned exclusively by this Buffer for its
// lifetime; access is always mediated by the owning BufferRing, which is not
// shared across threads without external synchronization.
unsafe impl Send for Buffer {}

impl Buffer {
    /// # Safety
    /// `ptr` must be a valid mmap mapping of `len` bytes that remains valid
    /// until [`Buffer::unmap`] is called.
    pub unsafe fn new(ptr: *mut libc::c_void, len: usize) -> Self {
        Self { ptr, len, queued: true, bytesused: 0, sequence: 0, bbox: None }
    }

    /// The mapped region, truncated to the driver-reported payload length.
    pub fn data(&self) -> &[u8] {
        // SAFETY: `ptr`/`len` describe a live mmap mapping for the buffer's
        // lifetime; `bytesused` is always <= `len` (the driver never reports
        // more bytes than the mapping it was given).
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.bytesused.min(self.len)) }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// # Safety
    /// Must only be called once, when the buffer is being torn down.
    pub unsafe fn unmap(&mut self) -> nix::Result<()> {
        // SAFETY: caller guarantees this mapping is being released and not
        // used again; `ptr`/`len` are the exact values passed to `mmap`.
        unsafe { nix::sys::mman::munmap(self.ptr, self.len) }
    }
}

/// Ordered sequence of [`Buffer`]s, sized 2-3 per the driver's `REQBUFS`
/// negotiation. Tracks which indices have been dequeued ("done") vs remain
/// queued to the driver.
#[derive(Default)]
pub struct BufferRing {
    buffers: Vec<Buffer>,
    done: VecDeque<u32>,
}

impl BufferRing {
    pub fn new(buffers: Vec<Buffer>) -> Self {
        Self { buffers, done: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, index: u32) -> &Buffer {
        &self.buffers[index as usize]
    }

    /// Mark `index` as dequeued from the driver and push it onto the done
    /// queue. The caller is responsible for the actual `DQBUF` ioctl and for
    /// populating `bytesused`/`sequence`/`bbox` on the buffer beforehand.
    pub fn mark_done(&mut self, index: u32) {
        self.buffers[index as usize].queued = false;
        self.done.push_back(index);
    }

    pub fn done_is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn front_done(&self) -> Option<u32> {
        self.done.front().copied()
    }

    /// Pop the front of the done queue and mark that buffer queued again.
    /// Idempotent on an empty queue: returns `None` without effect.
    pub fn release_front(&mut self) -> Option<u32> {
        let index = self.done.pop_front()?;
        self.buffers[index as usize].queued = true;
        Some(index)
    }

    pub fn clear_done(&mut self) {
        for index in self.done.drain(..) {
            self.buffers[index as usize].queued = true;
        }
    }

    pub fn buffers_mut(&mut self) -> &mut Vec<Buffer> {
        &mut self.buffers
    }

    /// Buffer conservation invariant: every buffer is queued or done,
    /// never both, never neither.
    #[cfg(test)]
    fn invariant_holds(&self) -> bool {
        let done_set: std::collections::HashSet<u32> = self.done.iter().copied().collect();
        for (index, buffer) in self.buffers.iter().enumerate() {
            let in_done = done_set.contains(&(index as u32));
            if buffer.queued == in_done {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_buffer() -> Buffer {
        // SAFETY: test-only placeholder mapping backed by a leaked Box; never
        // unmapped, which is fine since these buffers are never passed to
        // `unmap` in this test module.
        let boxed = Box::leak(Box::new([0u8; 4096]));
        unsafe { Buffer::new(boxed.as_mut_ptr().cast(), boxed.len()) }
    }

    #[test]
    fn test_conservation_invariant_initial() {
        let ring = BufferRing::new(vec![dummy_buffer(), dummy_buffer(), dummy_buffer()]);
        assert!(ring.invariant_holds());
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_mark_done_and_release_fifo() {
        let mut ring = BufferRing::new(vec![dummy_buffer(), dummy_buffer(), dummy_buffer()]);
        ring.mark_done(0);
        ring.mark_done(1);
        assert!(ring.invariant_holds());
        assert_eq!(ring.front_done(), Some(0));

        let released = ring.release_front();
        assert_eq!(released, Some(0));
        assert!(ring.invariant_holds());
        assert_eq!(ring.front_done(), Some(1));
    }

    #[test]
    fn test_release_on_empty_is_idempotent() {
        let mut ring = BufferRing::new(vec![dummy_buffer(), dummy_buffer()]);
        assert_eq!(ring.release_front(), None);
        assert!(ring.done_is_empty());
    }

    #[test]
    fn test_clear_done_requeues_everything() {
        let mut ring = BufferRing::new(vec![dummy_buffer(), dummy_buffer()]);
        ring.mark_done(0);
        ring.mark_done(1);
        ring.clear_done();
        assert!(ring.done_is_empty());
        assert!(ring.invariant_holds());
    }
}
