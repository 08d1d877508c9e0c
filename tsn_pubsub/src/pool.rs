//! Fixed-capacity packet buffer pool.
//!
//! All buffers are allocated once at startup; acquire/release on the RT
//! path move pre-allocated boxes in and out of their slots without
//! touching the allocator. The pool never blocks and never grows; the
//! linear free-slot scan is intentional (small, bounded N — no dynamic
//! structures in the real-time path).
//!
//! Each pool is owned by exactly one thread; there is no internal locking.

use tsn_common::consts::MAX_PACKET_SIZE;

use crate::error::PoolError;

/// A fixed-capacity Ethernet payload buffer with a logical length.
///
/// Owned exclusively by whoever currently holds it — the pool while free,
/// the acquiring cycle while in use.
#[derive(Debug)]
pub struct PacketBuffer {
    data: [u8; MAX_PACKET_SIZE],
    len: usize,
}

impl PacketBuffer {
    /// Allocate one buffer on the heap. Startup only.
    pub fn boxed() -> Box<Self> {
        Box::new(Self {
            data: [0u8; MAX_PACKET_SIZE],
            len: 0,
        })
    }

    /// Fixed capacity [bytes].
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_PACKET_SIZE
    }

    /// Current logical length [bytes].
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no frame.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the logical length after filling `data` externally
    /// (e.g. from a receive syscall). Clamped to capacity.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(MAX_PACKET_SIZE);
    }

    /// Drop the logical frame (the bytes are overwritten on next use).
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The frame bytes written so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The full backing storage, for fills by transport receive calls.
    #[inline]
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; MAX_PACKET_SIZE] {
        &mut self.data
    }
}

struct Slot {
    /// The buffer while it is free; `None` while a caller holds it.
    buf: Option<Box<PacketBuffer>>,
    /// Stable heap address of the allocation, for membership checks.
    addr: usize,
}

/// Fixed ordered set of packet buffers with in-use tracking.
///
/// Invariant: the in-use count never exceeds capacity; every successful
/// acquire yields exactly one buffer, and a buffer can be returned only
/// to the slot that owns its allocation.
pub struct PacketPool {
    slots: Vec<Slot>,
}

impl PacketPool {
    /// Preallocate `capacity` maximum-size buffers.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| {
                let buf = PacketBuffer::boxed();
                let addr = &*buf as *const PacketBuffer as usize;
                Slot {
                    buf: Some(buf),
                    addr,
                }
            })
            .collect();
        Self { slots }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of buffers currently held by callers.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.buf.is_none()).count()
    }

    /// Take a free buffer out of the pool. Never blocks, never grows.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if every buffer is in use.
    pub fn acquire(&mut self) -> Result<Box<PacketBuffer>, PoolError> {
        for slot in self.slots.iter_mut() {
            if let Some(mut buf) = slot.buf.take() {
                buf.clear();
                return Ok(buf);
            }
        }
        Err(PoolError::Exhausted)
    }

    /// Return a buffer to its slot.
    ///
    /// Double release cannot occur through this API: the box moved out on
    /// acquire is the only owner of its allocation. The membership check
    /// still rejects buffers of other pools (or loose allocations).
    ///
    /// # Errors
    ///
    /// `PoolError::NotPoolMember` if the buffer was not allocated by this
    /// pool; the buffer is dropped in that case.
    pub fn release(&mut self, buf: Box<PacketBuffer>) -> Result<(), PoolError> {
        let addr = &*buf as *const PacketBuffer as usize;
        for slot in self.slots.iter_mut() {
            if slot.addr == addr && slot.buf.is_none() {
                slot.buf = Some(buf);
                return Ok(());
            }
        }
        Err(PoolError::NotPoolMember)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_until_exhausted() {
        let mut pool = PacketPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.in_use(), 0);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();
        assert_eq!(pool.in_use(), 3);
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Exhausted);

        pool.release(a).unwrap();
        assert_eq!(pool.in_use(), 2);
        pool.release(b).unwrap();
        pool.release(c).unwrap();
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn in_use_never_exceeds_capacity() {
        let mut pool = PacketPool::new(2);
        let mut held = Vec::new();
        for round in 0..20 {
            match pool.acquire() {
                Ok(buf) => held.push(buf),
                Err(PoolError::Exhausted) => {
                    assert_eq!(pool.in_use(), pool.capacity());
                    pool.release(held.remove(0)).unwrap();
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert!(pool.in_use() <= pool.capacity(), "round {round}");
        }
    }

    #[test]
    fn foreign_buffer_rejected() {
        let mut pool = PacketPool::new(1);
        let mut other = PacketPool::new(1);

        let foreign = other.acquire().unwrap();
        assert_eq!(pool.release(foreign).unwrap_err(), PoolError::NotPoolMember);

        let loose = PacketBuffer::boxed();
        assert_eq!(pool.release(loose).unwrap_err(), PoolError::NotPoolMember);
    }

    #[test]
    fn acquired_buffer_is_cleared() {
        let mut pool = PacketPool::new(1);
        let mut buf = pool.acquire().unwrap();
        buf.set_len(100);
        pool.release(buf).unwrap();

        let buf = pool.acquire().unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_pool_is_always_exhausted() {
        let mut pool = PacketPool::new(0);
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Exhausted);
    }
}
