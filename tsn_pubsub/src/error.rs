//! Error types of the codec and packet pool.
//!
//! Codec errors are steady-state and local: a violating inbound frame is
//! discarded, an overflowing outbound value aborts that frame before any
//! byte is written. Neither may abort the cycle.

use thiserror::Error;

/// Wire codec failure.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CodecError {
    /// Inbound frame violates the fixed protocol subset. The frame is
    /// discarded; the reason names the first check that failed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A value does not survive the fixed-point scale conversion.
    #[error("fixed-point overflow: {0} outside ±(i64::MAX * 1e-9)")]
    Overflow(f64),

    /// The caller-supplied buffer cannot hold the frame.
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes the frame requires.
        need: usize,
        /// Bytes the buffer offers.
        have: usize,
    },

    /// Message count outside what the operation supports.
    #[error("unsupported message count {0}")]
    UnsupportedMessageCount(u8),
}

/// Packet pool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No free buffer. The caller skips this cycle's I/O and continues.
    #[error("packet pool exhausted")]
    Exhausted,

    /// The released buffer was not allocated by this pool.
    #[error("buffer is not a member of this pool")]
    NotPoolMember,
}
