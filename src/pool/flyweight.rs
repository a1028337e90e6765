//! Fixed-capacity buffer pool with slot reuse
//!
//! Hands out buffers of arbitrary sizes from a bounded byte budget. Buffers
//! of one distinguished slot size are cached and recycled instead of being
//! reallocated; requests that cannot be satisfied immediately block until
//! capacity is returned or a deadline passes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::pool::buffer::Buffer;

/// Mutable pool state, all of it behind one lock.
struct State {
    /// Bytes available for new allocation, excluding cached slots.
    free: usize,
    /// Idle slot-sized buffers, front popped first.
    slots: VecDeque<Buffer>,
    /// One handle per blocked caller, in arrival order.
    waiters: VecDeque<Arc<Condvar>>,
    /// Set by `close`; blocked callers drain out with `Error::Cancelled`.
    closed: bool,
}

/// Thread-safe buffer pool with a fixed byte budget.
///
/// Allocation accounting invariant, holding whenever the lock is free:
/// `free + slots.len() * slot_size + outstanding capacities == capacity`.
///
/// Wake-ups are signalled to the longest-waiting caller first, but woken
/// threads re-validate under the lock, so service order is best-effort
/// FIFO rather than strict.
pub struct BufferPool {
    /// Total budget in bytes.
    capacity: usize,
    /// The one buffer size eligible for reuse.
    slot_size: usize,
    state: Mutex<State>,

    // Counters live outside the lock; they are observability, not accounting.
    slot_hits: AtomicU64,
    fresh_allocs: AtomicU64,
    slots_reclaimed: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
}

impl BufferPool {
    /// Create a pool with the given total budget and reusable slot size.
    ///
    /// The caller must ensure `0 < slot_size <= capacity`; a pool with a
    /// zero capacity can never satisfy any request.
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        debug_assert!(capacity > 0, "pool capacity must be non-zero");
        debug_assert!(
            slot_size > 0 && slot_size <= capacity,
            "slot size must be in 1..=capacity"
        );
        Self {
            capacity,
            slot_size,
            state: Mutex::new(State {
                free: capacity,
                slots: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: false,
            }),
            slot_hits: AtomicU64::new(0),
            fresh_allocs: AtomicU64::new(0),
            slots_reclaimed: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    /// Total budget in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The reusable slot size in bytes.
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Allocate a buffer of exactly `size` bytes, blocking up to `timeout`
    /// for capacity to become available.
    ///
    /// The returned buffer has position 0 and limit == capacity; content is
    /// undefined (a reused slot carries whatever its previous holder wrote).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSize`] if `size` is zero or exceeds the pool
    ///   capacity; returned without taking the lock or blocking.
    /// - [`Error::Timeout`] if no capacity became available in time.
    /// - [`Error::Cancelled`] if the pool was closed.
    pub fn allocate(&self, size: usize, timeout: Duration) -> Result<Buffer> {
        if size == 0 || size > self.capacity {
            return Err(Error::InvalidSize {
                requested: size,
                capacity: self.capacity,
            });
        }

        let mut state = self.state.lock();
        let result = self.allocate_locked(&mut state, size, timeout);

        // Pass availability on before unlocking, even when this call consumed
        // space itself: one signal per unlock keeps a queue of waiters
        // draining in roughly arrival order.
        if state.free > 0 || !state.slots.is_empty() {
            if let Some(waiter) = state.waiters.front() {
                waiter.notify_one();
            }
        }

        result
    }

    /// Allocation under the lock: fast paths, then the waiting loop.
    fn allocate_locked(
        &self,
        state: &mut MutexGuard<'_, State>,
        size: usize,
        timeout: Duration,
    ) -> Result<Buffer> {
        if state.closed {
            self.cancellations.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Cancelled);
        }

        if let Some(buffer) = self.try_allocate(state, size) {
            return Ok(buffer);
        }

        // Register before sleeping; the deadline is fixed once and never
        // re-extended across wake cycles.
        let waiter = Arc::new(Condvar::new());
        state.waiters.push_back(Arc::clone(&waiter));
        let deadline = Instant::now() + timeout;
        debug!(size, timeout_us = timeout.as_micros() as u64, "waiting for capacity");

        let outcome = loop {
            let timed_out = waiter.wait_until(state, deadline).timed_out();

            // Re-validate first: a wake-up is a hint, not a grant, and a
            // late wake can still win space that arrived near the deadline.
            if let Some(buffer) = self.try_allocate(state, size) {
                break Ok(buffer);
            }
            if state.closed {
                self.cancellations.fetch_add(1, Ordering::Relaxed);
                break Err(Error::Cancelled);
            }
            if timed_out {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(size, "allocation timed out");
                break Err(Error::Timeout { waited: timeout });
            }
        };

        // Deregister on every exit path; a departed waiter must never be
        // signalled instead of a live one.
        if let Some(idx) = state
            .waiters
            .iter()
            .position(|w| Arc::ptr_eq(w, &waiter))
        {
            state.waiters.remove(idx);
        }

        outcome
    }

    /// Try both fast paths. Returns `None` when the caller has to wait.
    fn try_allocate(&self, state: &mut State, size: usize) -> Option<Buffer> {
        // Slot reuse: no memory allocation on this path. Cached buffers were
        // cleared at deallocation time.
        if size == self.slot_size {
            if let Some(buffer) = state.slots.pop_front() {
                self.slot_hits.fetch_add(1, Ordering::Relaxed);
                trace!(size, "reusing cached slot");
                return Some(buffer);
            }
        }

        // Budget path: idle slots count as convertible capacity.
        let available = state.free + state.slots.len() * self.slot_size;
        if available >= size {
            self.reclaim(state, size);
            state.free -= size;
            self.fresh_allocs.fetch_add(1, Ordering::Relaxed);
            trace!(size, free = state.free, "allocated fresh buffer");
            return Some(Buffer::with_capacity(size));
        }

        None
    }

    /// Convert cached slots into free space until `size` fits or the cache
    /// is empty. Popped slots are dropped; their bytes become anonymous
    /// free capacity for the fresh buffer the caller creates next.
    fn reclaim(&self, state: &mut State, size: usize) {
        while size > state.free {
            match state.slots.pop_front() {
                Some(slot) => {
                    state.free += slot.capacity();
                    self.slots_reclaimed.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    /// Return a buffer to the pool.
    ///
    /// Slot-sized buffers are cleared and cached for reuse; any other size
    /// is dropped and its bytes returned to the free budget. Always wakes
    /// the longest-waiting caller, if any.
    ///
    /// Must be called at most once per allocated buffer; the move-based API
    /// makes a double return unrepresentable without cloning tricks.
    pub fn deallocate(&self, mut buffer: Buffer) {
        let mut state = self.state.lock();

        if buffer.capacity() == self.slot_size {
            buffer.clear();
            state.slots.push_back(buffer);
            trace!(slots = state.slots.len(), "slot returned to cache");
        } else {
            state.free += buffer.capacity();
            trace!(free = state.free, "buffer space returned");
        }

        if let Some(waiter) = state.waiters.front() {
            waiter.notify_one();
        }
    }

    /// Close the pool, cancelling every blocked caller.
    ///
    /// Blocked `allocate` calls fail with [`Error::Cancelled`] once they
    /// cannot be satisfied; later calls fail immediately. Outstanding
    /// buffers may still be returned via [`deallocate`](Self::deallocate).
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        debug!(waiters = state.waiters.len(), "closing pool");
        for waiter in &state.waiters {
            waiter.notify_one();
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Snapshot of the pool's accounting and counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.capacity,
            slot_size: self.slot_size,
            free: state.free,
            pooled_slots: state.slots.len(),
            waiters: state.waiters.len(),
            slot_hits: self.slot_hits.load(Ordering::Relaxed),
            fresh_allocs: self.fresh_allocs.load(Ordering::Relaxed),
            slots_reclaimed: self.slots_reclaimed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of pool accounting and counters.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    /// Total byte budget.
    pub capacity: usize,
    /// Reusable slot size.
    pub slot_size: usize,
    /// Bytes available for new allocation, excluding cached slots.
    pub free: usize,
    /// Idle slot buffers in the cache.
    pub pooled_slots: usize,
    /// Callers currently blocked in `allocate`.
    pub waiters: usize,
    /// Allocations served from the slot cache.
    pub slot_hits: u64,
    /// Allocations that created a fresh buffer.
    pub fresh_allocs: u64,
    /// Cached slots converted back to free space.
    pub slots_reclaimed: u64,
    /// Allocations that failed with a timeout.
    pub timeouts: u64,
    /// Allocations cancelled by `close`.
    pub cancellations: u64,
}

impl PoolStats {
    /// Fraction of successful allocations served from the slot cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.slot_hits + self.fresh_allocs;
        if total == 0 {
            0.0
        } else {
            self.slot_hits as f64 / total as f64
        }
    }
}

/// RAII guard that returns its buffer to the pool on drop.
pub struct PooledBuffer {
    buffer: Option<Buffer>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Allocate from `pool`, wrapping the buffer so it is returned
    /// automatically when the guard goes out of scope.
    pub fn allocate(pool: &Arc<BufferPool>, size: usize, timeout: Duration) -> Result<Self> {
        let buffer = pool.allocate(size, timeout)?;
        Ok(Self {
            buffer: Some(buffer),
            pool: Arc::clone(pool),
        })
    }

    /// Take the buffer out, opting out of the automatic return. The caller
    /// becomes responsible for calling `deallocate` itself.
    pub fn take(mut self) -> Buffer {
        self.buffer.take().expect("buffer already taken")
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        self.buffer.as_ref().expect("buffer already taken")
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_mut().expect("buffer already taken")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.deallocate(buffer);
        }
    }
}
