//! Carry-safe absolute-time arithmetic on the TAI timescale.
//!
//! All cycle timing works on [`TaiTime`], a `{seconds, nanoseconds}` pair
//! normalized to `nanoseconds ∈ [0, 1e9)`. Keeping the split representation
//! (instead of a single i64 nanosecond count) matches the kernel timespec
//! the absolute sleeps are handed to, and the carry at the nanosecond
//! boundary is tested explicitly.
//!
//! Also hosts the OPC UA timestamp conversion: network message timestamps
//! travel as 100 ns ticks since 1601-01-01 UTC.

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Offset between the OPC UA epoch (1601-01-01) and the Unix epoch
/// (1970-01-01) [s].
pub const OPC_EPOCH_DIFF: u64 = 11_644_473_600;

/// OPC UA ticks per second (tick = 100 ns).
const UA_TICKS_PER_SEC: u64 = 10_000_000;

/// An absolute instant on the externally synchronized TAI clock.
///
/// Invariant: `nsec < 1_000_000_000`. All constructors and arithmetic
/// maintain it. Ordering is lexicographic (seconds, then nanoseconds),
/// which is total order on instants given the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TaiTime {
    sec: i64,
    nsec: u32,
}

impl TaiTime {
    /// The Unix/TAI epoch.
    pub const ZERO: TaiTime = TaiTime { sec: 0, nsec: 0 };

    /// Build an instant, normalizing a nanosecond part `>= 1e9`.
    pub const fn new(sec: i64, nsec: u32) -> Self {
        let mut sec = sec;
        let mut nsec = nsec;
        while nsec >= NANOS_PER_SEC as u32 {
            sec += 1;
            nsec -= NANOS_PER_SEC as u32;
        }
        Self { sec, nsec }
    }

    /// Seconds part.
    #[inline]
    pub const fn sec(&self) -> i64 {
        self.sec
    }

    /// Nanoseconds part, always `< 1e9`.
    #[inline]
    pub const fn nsec(&self) -> u32 {
        self.nsec
    }

    /// Add a nanosecond interval, carrying into seconds.
    #[must_use]
    pub const fn add_ns(self, ns: u64) -> Self {
        let sec = self.sec + (ns / NANOS_PER_SEC) as i64;
        let nsec = self.nsec + (ns % NANOS_PER_SEC) as u32;
        Self::new(sec, nsec)
    }

    /// Subtract a nanosecond interval, borrowing from seconds.
    #[must_use]
    pub const fn sub_ns(self, ns: u64) -> Self {
        let mut sec = self.sec - (ns / NANOS_PER_SEC) as i64;
        let part = (ns % NANOS_PER_SEC) as u32;
        let nsec = if part > self.nsec {
            sec -= 1;
            NANOS_PER_SEC as u32 + self.nsec - part
        } else {
            self.nsec - part
        };
        Self { sec, nsec }
    }

    /// Component-wise sum of two instants (used when one side is a span).
    #[must_use]
    pub const fn add(self, other: TaiTime) -> Self {
        Self::new(self.sec + other.sec, self.nsec + other.nsec)
    }

    /// Component-wise difference `self - other`, borrowing from seconds.
    #[must_use]
    pub const fn sub(self, other: TaiTime) -> Self {
        if self.nsec < other.nsec {
            Self {
                sec: self.sec - other.sec - 1,
                nsec: NANOS_PER_SEC as u32 + self.nsec - other.nsec,
            }
        } else {
            Self {
                sec: self.sec - other.sec,
                nsec: self.nsec - other.nsec,
            }
        }
    }

    /// Total nanoseconds since the epoch. i128 so the full i64-second
    /// range survives the multiply.
    #[inline]
    pub const fn as_nanos(&self) -> i128 {
        self.sec as i128 * NANOS_PER_SEC as i128 + self.nsec as i128
    }

    /// Instant from total nanoseconds since the epoch (non-negative).
    pub const fn from_nanos(ns: u64) -> Self {
        Self {
            sec: (ns / NANOS_PER_SEC) as i64,
            nsec: (ns % NANOS_PER_SEC) as u32,
        }
    }

    /// Instant from fractional seconds since the epoch. Entry point for
    /// CLI base times ("-b 1700000000.5").
    pub fn from_secs_f64(secs: f64) -> Self {
        let whole = secs.floor();
        let frac = secs - whole;
        Self::new(whole as i64, (frac * NANOS_PER_SEC as f64).round() as u32)
    }

    /// Convert to an OPC UA timestamp (100 ns ticks since 1601-01-01).
    pub fn to_ua_ticks(&self) -> u64 {
        (OPC_EPOCH_DIFF + self.sec as u64) * UA_TICKS_PER_SEC + self.nsec as u64 / 100
    }

    /// Convert an OPC UA timestamp back to an instant. Sub-tick precision
    /// (the two trailing decimal digits of the nanosecond part) is lost.
    pub fn from_ua_ticks(ticks: u64) -> Self {
        Self {
            sec: (ticks / UA_TICKS_PER_SEC - OPC_EPOCH_DIFF) as i64,
            nsec: (ticks % UA_TICKS_PER_SEC) as u32 * 100,
        }
    }
}

impl core::fmt::Display for TaiTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carries_at_nanosecond_boundary() {
        let t = TaiTime::new(0, 999_999_999).add(TaiTime::new(0, 1));
        assert_eq!(t, TaiTime::new(1, 0));
    }

    #[test]
    fn sub_borrows_at_nanosecond_boundary() {
        let t = TaiTime::new(1, 0).sub(TaiTime::new(0, 1));
        assert_eq!(t, TaiTime::new(0, 999_999_999));
    }

    #[test]
    fn nanos_stay_normalized() {
        let mut t = TaiTime::new(0, 900_000_000);
        for _ in 0..10 {
            t = t.add_ns(250_000_000);
            assert!(t.nsec() < NANOS_PER_SEC as u32);
        }
        assert_eq!(t, TaiTime::new(3, 400_000_000));
    }

    #[test]
    fn sub_ns_borrows() {
        let t = TaiTime::new(5, 100).sub_ns(200);
        assert_eq!(t, TaiTime::new(4, 999_999_900));
        let t = TaiTime::new(5, 100).sub_ns(2 * NANOS_PER_SEC + 200);
        assert_eq!(t, TaiTime::new(2, 999_999_900));
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(TaiTime::new(1, 0) > TaiTime::new(0, 999_999_999));
        assert!(TaiTime::new(3, 5) < TaiTime::new(3, 6));
        assert_eq!(TaiTime::new(3, 5), TaiTime::new(2, 1_000_000_005));
    }

    #[test]
    fn ua_ticks_roundtrip_at_tick_resolution() {
        let t = TaiTime::new(1_700_000_000, 123_456_700);
        let back = TaiTime::from_ua_ticks(t.to_ua_ticks());
        assert_eq!(back, t);

        // Sub-tick nanoseconds truncate toward the previous tick.
        let t = TaiTime::new(1_700_000_000, 123_456_789);
        let back = TaiTime::from_ua_ticks(t.to_ua_ticks());
        assert_eq!(back, TaiTime::new(1_700_000_000, 123_456_700));
    }

    #[test]
    fn ua_epoch_offset() {
        // Unix epoch expressed in OPC UA ticks.
        assert_eq!(TaiTime::ZERO.to_ua_ticks(), OPC_EPOCH_DIFF * 10_000_000);
    }

    #[test]
    fn from_secs_f64_splits_fraction() {
        let t = TaiTime::from_secs_f64(2.5);
        assert_eq!(t, TaiTime::new(2, 500_000_000));
        assert_eq!(TaiTime::from_secs_f64(0.0), TaiTime::ZERO);
    }

    #[test]
    fn from_nanos_splits() {
        let t = TaiTime::from_nanos(3 * NANOS_PER_SEC + 7);
        assert_eq!(t, TaiTime::new(3, 7));
        assert_eq!(t.as_nanos(), 3_000_000_007);
    }
}
