//! Clock abstraction and the CLOCK_TAI implementation.
//!
//! Cycle timing only ever sleeps to absolute instants; relative sleeps
//! would accumulate drift across cycles. The trait exists so executor
//! tests can drive a deterministic fake clock.

use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

use tsn_common::time::TaiTime;

/// Absolute time source and absolute-instant sleep.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> TaiTime;

    /// Block until the given absolute instant. Returns immediately if it
    /// already passed.
    fn sleep_until(&self, t: TaiTime);
}

/// The system TAI clock. TAI (no leap-second steps) is what the network
/// schedule of a synchronized TSN domain is expressed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaiClock;

impl Clock for TaiClock {
    fn now(&self) -> TaiTime {
        // clock_gettime only fails for an invalid clock id.
        let ts = clock_gettime(ClockId::CLOCK_TAI).unwrap_or(TimeSpec::new(0, 0));
        TaiTime::new(ts.tv_sec(), ts.tv_nsec() as u32)
    }

    fn sleep_until(&self, t: TaiTime) {
        let ts = TimeSpec::new(t.sec(), i64::from(t.nsec()));
        // Restart on signal interruption; any other error means the
        // instant lies in the past and the sleep is already over.
        while let Err(nix::errno::Errno::EINTR) =
            clock_nanosleep(ClockId::CLOCK_TAI, ClockNanosleepFlags::TIMER_ABSTIME, &ts)
        {}
    }
}
