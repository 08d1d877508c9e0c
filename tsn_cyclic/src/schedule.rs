//! Cycle schedule derived from the network plan.
//!
//! All instants of one cycle hang off its epoch start `est`, a point on
//! the grid `base + k * interval`. Wire deadlines subtract the modeled
//! stack latency; thread wakeups additionally subtract the application
//! budget and the worst-case scheduler jitter:
//!
//! ```text
//!  est                 tx_time        est + interval
//!   |---- send_offset ----|                 |
//!   |            ^ wakeup |                 |
//!   |-- recv_offset + recv_stack --|        |
//!                     recv_wakeup ^         |
//! ```
//!
//! The schedule is immutable; every instant is recomputed from `est` each
//! cycle so a degraded cycle can never shift the grid.

use tsn_common::axis::AxisId;
use tsn_common::config::CycleConfig;
use tsn_common::time::TaiTime;

/// Immutable per-role timing plan, built once from validated config.
#[derive(Debug, Clone, Copy)]
pub struct CycleSchedule {
    base_time: TaiTime,
    interval_ns: u64,
    send_offset_ns: u64,
    send_window_ns: u64,
    send_stack_ns: u64,
    recv_offset_ns: u64,
    recv_stack_ns: u64,
    recv_window_ns: u64,
    app_wakeup_ns: u64,
    max_jitter_ns: u64,
}

impl CycleSchedule {
    /// Build the schedule. The config must have passed
    /// [`CycleConfig::validate`].
    pub fn new(cfg: &CycleConfig) -> Self {
        Self {
            base_time: cfg.base_time(),
            interval_ns: cfg.interval_ns,
            send_offset_ns: cfg.send_offset_ns,
            send_window_ns: cfg.send_window_ns,
            send_stack_ns: cfg.send_stack_ns,
            recv_offset_ns: cfg.recv_offset_ns,
            recv_stack_ns: cfg.recv_stack_ns,
            recv_window_ns: cfg.recv_window_ns,
            app_wakeup_ns: cfg.app_wakeup_ns,
            max_jitter_ns: cfg.max_jitter_ns,
        }
    }

    /// Cycle interval [ns].
    #[inline]
    pub const fn interval_ns(&self) -> u64 {
        self.interval_ns
    }

    /// First epoch start strictly after `now`.
    ///
    /// A base time in the future is taken exactly (start-of-shift
    /// schedules); a base in the past is advanced onto the grid by the
    /// minimal whole number of intervals.
    pub fn epoch_start(&self, now: TaiTime) -> TaiTime {
        if self.base_time > now {
            return self.base_time;
        }
        let elapsed = (now.as_nanos() - self.base_time.as_nanos()) as u64;
        let k = elapsed / self.interval_ns + 1;
        self.base_time.add_ns(k * self.interval_ns)
    }

    /// Wire transmit instant of the cycle starting at `est`.
    pub fn tx_time(&self, est: TaiTime) -> TaiTime {
        est.add_ns(self.send_offset_ns).sub_ns(self.send_stack_ns)
    }

    /// Thread wakeup for a transmit at `tx`.
    pub fn send_wakeup(&self, tx: TaiTime) -> TaiTime {
        tx.sub_ns(self.app_wakeup_ns + self.max_jitter_ns)
    }

    /// Thread wakeup for the receive slot of the cycle starting at `est`.
    pub fn recv_wakeup(&self, est: TaiTime) -> TaiTime {
        est.add_ns(self.recv_offset_ns + self.recv_stack_ns + self.max_jitter_ns)
            .sub_ns(self.app_wakeup_ns)
    }

    /// Instant the expected arrival window of that cycle closes.
    pub fn recv_deadline(&self, est: TaiTime) -> TaiTime {
        self.recv_wakeup(est)
            .add_ns(self.app_wakeup_ns + self.recv_window_ns)
    }

    /// Staggered transmit slot of one axis: slot k lies k send windows
    /// after the cycle's first transmit instant.
    pub fn axis_slot(&self, tx: TaiTime, axis: AxisId) -> TaiTime {
        tx.add_ns(axis.index() as u64 * self.send_window_ns)
    }

    /// The same instant one cycle later.
    #[inline]
    pub fn advance(&self, t: TaiTime) -> TaiTime {
        t.add_ns(self.interval_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_config() -> CycleConfig {
        CycleConfig {
            base_time_s: 1_700_000_000.0,
            interval_ns: 1_000_000,
            send_offset_ns: 500_000,
            send_window_ns: 50_000,
            recv_offset_ns: 800_000,
            recv_window_ns: 100_000,
            ..Default::default()
        }
    }

    fn schedule() -> CycleSchedule {
        let cfg = demo_config();
        cfg.validate().unwrap();
        CycleSchedule::new(&cfg)
    }

    #[test]
    fn future_base_is_taken_exactly() {
        let s = schedule();
        let now = TaiTime::new(1_699_999_999, 0);
        assert_eq!(s.epoch_start(now), TaiTime::new(1_700_000_000, 0));

        // Base less than one interval ahead, the historical underflow case.
        let now = TaiTime::new(1_699_999_999, 999_999_500);
        assert_eq!(s.epoch_start(now), TaiTime::new(1_700_000_000, 0));
    }

    #[test]
    fn past_base_lands_on_grid_strictly_after_now() {
        let s = schedule();
        let base = TaiTime::new(1_700_000_000, 0);
        for now in [
            TaiTime::new(1_700_000_000, 0),
            TaiTime::new(1_700_000_000, 1),
            TaiTime::new(1_700_000_000, 999_999),
            TaiTime::new(1_700_000_123, 456_789_012),
        ] {
            let est = s.epoch_start(now);
            assert!(est > now, "est {est} not after now {now}");
            assert!(est.as_nanos() - now.as_nanos() <= 1_000_000);
            assert_eq!((est.as_nanos() - base.as_nanos()) % 1_000_000, 0);
        }
    }

    #[test]
    fn epoch_at_exact_grid_point_advances_one_interval() {
        let s = schedule();
        let now = TaiTime::new(1_700_000_100, 0); // exactly on the grid
        assert_eq!(s.epoch_start(now), TaiTime::new(1_700_000_100, 1_000_000));
    }

    #[test]
    fn send_wakeup_precedes_tx_by_budget_plus_jitter() {
        let s = schedule();
        let est = TaiTime::new(1_700_000_000, 0);
        let tx = s.tx_time(est);
        // send_offset 500000 - send_stack 100000
        assert_eq!(tx, TaiTime::new(1_700_000_000, 400_000));
        // app_wakeup 100000 + max_jitter 40000
        assert_eq!(s.send_wakeup(tx), TaiTime::new(1_700_000_000, 260_000));
    }

    #[test]
    fn recv_instants_match_demo_budgets() {
        let s = schedule();
        let est = TaiTime::new(1_700_000_000, 0);
        // recv_offset 800000 + recv_stack 100000 + jitter 40000 - wakeup 100000
        assert_eq!(s.recv_wakeup(est), TaiTime::new(1_700_000_000, 840_000));
        // + app_wakeup 100000 + recv_window 100000
        assert_eq!(s.recv_deadline(est), TaiTime::new(1_700_000_001, 40_000));
    }

    #[test]
    fn axis_slots_are_staggered_by_send_window() {
        let s = schedule();
        let tx = TaiTime::new(1_700_000_000, 400_000);
        assert_eq!(s.axis_slot(tx, AxisId::X), tx);
        assert_eq!(s.axis_slot(tx, AxisId::Y), tx.add_ns(50_000));
        assert_eq!(s.axis_slot(tx, AxisId::Z), tx.add_ns(100_000));
        assert_eq!(s.axis_slot(tx, AxisId::Spindle), tx.add_ns(150_000));
    }

    #[test]
    fn advance_carries_across_second_boundary() {
        let s = schedule();
        let t = TaiTime::new(1_700_000_000, 999_500_000);
        assert_eq!(s.advance(t), TaiTime::new(1_700_000_001, 500_000));
    }

    #[test]
    fn wakeups_stay_inside_one_cycle() {
        let s = schedule();
        let est = TaiTime::new(1_700_000_042, 0);
        let next = s.advance(est);
        let tx = s.tx_time(est);
        assert!(s.send_wakeup(tx) > est.sub_ns(s.interval_ns()));
        assert!(tx < next);
        assert!(s.recv_wakeup(est) > est);
    }
}
