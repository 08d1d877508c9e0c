//! # Cyclic Executor Library
//!
//! Everything between the wire codec and the operating system: the cycle
//! schedule derived from the synchronized network plan, bounded-wait
//! access to shared state, the per-role real-time loops, and the thin
//! POSIX layer (TAI clock, RT thread setup, demo UDP transport).
//!
//! The executors never open sockets or map memory themselves; transport,
//! clock and shared-state access arrive as trait objects so the loops are
//! testable without privileges or hardware.

pub mod clock;
pub mod exchange;
pub mod executor;
pub mod net;
pub mod rt;
pub mod schedule;

pub use clock::{Clock, TaiClock};
pub use exchange::{DeadlineMutex, ExchangeError};
pub use executor::{
    CycleCounters, FeedbackSink, RecvExecutor, SendExecutor, SetpointSource, Transport,
    TransportError,
};
pub use schedule::CycleSchedule;
