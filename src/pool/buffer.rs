//! Fixed-capacity byte buffer with cursor semantics
//!
//! A `Buffer` is a heap-backed region with a `position` cursor and a `limit`
//! bound, so callers can fill and drain it incrementally without tracking
//! offsets themselves.

use std::fmt;

/// A byte buffer handed out by the pool.
///
/// The backing allocation never grows or shrinks; `capacity` is fixed for
/// the buffer's lifetime. Cursors obey `position <= limit <= capacity`.
///
/// Ownership is exclusive: the pool owns a buffer while it sits in the slot
/// cache, the caller owns it from `allocate` until the matching `deallocate`.
pub struct Buffer {
    data: Box<[u8]>,
    position: usize,
    limit: usize,
}

impl Buffer {
    /// Create a zero-filled buffer of exactly `size` bytes.
    ///
    /// Only the pool constructs buffers; callers receive them from
    /// `BufferPool::allocate`.
    pub(crate) fn with_capacity(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            position: 0,
            limit: size,
        }
    }

    /// Total capacity in bytes. Fixed for the buffer's lifetime.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor.
    ///
    /// # Panics
    ///
    /// Panics if `position` exceeds the current limit.
    pub fn set_position(&mut self, position: usize) {
        assert!(
            position <= self.limit,
            "position {} exceeds limit {}",
            position,
            self.limit
        );
        self.position = position;
    }

    /// Current usable bound.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Set the usable bound. The position is clamped down if it would end
    /// up past the new limit.
    ///
    /// # Panics
    ///
    /// Panics if `limit` exceeds the capacity.
    pub fn set_limit(&mut self, limit: usize) {
        assert!(
            limit <= self.data.len(),
            "limit {} exceeds capacity {}",
            limit,
            self.data.len()
        );
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
    }

    /// Reset cursors: position 0, limit == capacity.
    ///
    /// Content is left untouched; a reused buffer may carry stale bytes
    /// from its previous holder.
    #[inline]
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.data.len();
    }

    /// Bytes between the position and the limit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Whether any bytes remain between position and limit.
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Copy `src` into the buffer at the current position and advance it.
    ///
    /// # Panics
    ///
    /// Panics if `src` does not fit in the remaining space.
    pub fn put_slice(&mut self, src: &[u8]) {
        assert!(
            src.len() <= self.remaining(),
            "put of {} bytes exceeds remaining {}",
            src.len(),
            self.remaining()
        );
        self.data[self.position..self.position + src.len()].copy_from_slice(src);
        self.position += src.len();
    }

    /// View of the bytes between position and limit.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.position..self.limit]
    }

    /// Mutable view of the bytes between position and limit.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.position..self.limit]
    }

    /// Pointer to the start of the backing allocation.
    ///
    /// Stable across moves of the `Buffer` value, so it identifies the
    /// underlying region even as the buffer cycles through the pool.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.data.len())
            .field("position", &self.position)
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_buffer_cursors() {
        let buf = Buffer::with_capacity(128);
        assert_eq!(buf.capacity(), 128);
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.limit(), 128);
        assert_eq!(buf.remaining(), 128);
        assert!(buf.has_remaining());
    }

    #[test]
    fn test_put_advances_position() {
        let mut buf = Buffer::with_capacity(16);
        buf.put_slice(b"hello");
        assert_eq!(buf.position(), 5);
        assert_eq!(buf.remaining(), 11);
    }

    #[test]
    fn test_clear_resets_cursors_not_bytes() {
        let mut buf = Buffer::with_capacity(16);
        buf.put_slice(b"stale");
        buf.set_limit(8);
        buf.clear();

        assert_eq!(buf.position(), 0);
        assert_eq!(buf.limit(), 16);
        // Content survives a clear
        assert_eq!(&buf.as_slice()[..5], b"stale");
    }

    #[test]
    fn test_set_limit_clamps_position() {
        let mut buf = Buffer::with_capacity(64);
        buf.set_position(50);
        buf.set_limit(40);
        assert_eq!(buf.position(), 40);
        assert_eq!(buf.limit(), 40);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds limit")]
    fn test_position_beyond_limit_panics() {
        let mut buf = Buffer::with_capacity(8);
        buf.set_position(9);
    }

    #[test]
    #[should_panic(expected = "exceeds remaining")]
    fn test_put_overflow_panics() {
        let mut buf = Buffer::with_capacity(4);
        buf.put_slice(b"too long");
    }

    #[test]
    fn test_mut_slice_roundtrip() {
        let mut buf = Buffer::with_capacity(8);
        buf.as_mut_slice().copy_from_slice(&[7u8; 8]);
        assert_eq!(buf.as_slice(), &[7u8; 8]);
        // Writing through the slice does not move the cursor
        assert_eq!(buf.position(), 0);
    }
}
