//! PT2 axis simulation.
//!
//! Each axis is a critically damped second-order lag from velocity
//! setpoint to velocity, integrated into a position that is clamped to
//! the travel range [0, max_pos]. One cycle is computed in several fine
//! sub-steps to keep the discretization stable at millisecond intervals.

use tsn_common::axis::{AxisId, AxisInfo, ControlInfo};

const K_FACTOR: f64 = 1.0;
const TIME_FACTOR: f64 = 0.0001; // [s]
const DAMPING: f64 = 1.0;

/// Sub-steps per cycle.
pub const FINE_ITERATIONS: u32 = 10;

/// Travel range of the linear axes [mm].
const LINEAR_MAX_POS: f64 = 300.0;
/// Velocity limit of the linear axes [mm/s].
const LINEAR_MAX_VEL: f64 = 60.0;
const SPINDLE_MAX_POS: f64 = 300.0;
const SPINDLE_MAX_VEL: f64 = 10.0;

/// One simulated axis.
#[derive(Debug, Clone)]
pub struct AxisSim {
    axis: AxisId,
    max_pos: f64,
    min_vel: f64,
    max_vel: f64,
    pos: f64,
    vel: f64,
    set_vel: f64,
    enabled: bool,
    fault: bool,
}

impl AxisSim {
    /// An axis at rest with its type-specific limits. Linear axes jog in
    /// both directions; the spindle only spins forward.
    pub fn new(axis: AxisId) -> Self {
        let (max_pos, max_vel, min_vel) = match axis {
            AxisId::Spindle => (SPINDLE_MAX_POS, SPINDLE_MAX_VEL, 0.0),
            _ => (LINEAR_MAX_POS, LINEAR_MAX_VEL, -LINEAR_MAX_VEL),
        };
        Self {
            axis,
            max_pos,
            min_vel,
            max_vel,
            pos: 0.0,
            vel: 0.0,
            set_vel: 0.0,
            enabled: false,
            fault: false,
        }
    }

    pub fn axis(&self) -> AxisId {
        self.axis
    }

    pub fn position(&self) -> f64 {
        self.pos
    }

    pub fn velocity(&self) -> f64 {
        self.vel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feedback datum published for this axis.
    pub fn feedback(&self) -> AxisInfo {
        AxisInfo {
            axis: self.axis,
            value: self.pos,
            switch: self.fault,
        }
    }

    /// Enable the axis, clearing a pending fault first.
    pub fn enable(&mut self) {
        self.clear_fault();
        self.enabled = true;
    }

    /// Disable the axis: the fault is reset and the velocity drops to
    /// zero immediately.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.fault = false;
        self.vel = 0.0;
    }

    /// Faults may only be cleared while the axis is disabled.
    pub fn clear_fault(&mut self) {
        if !self.enabled {
            self.fault = false;
        }
    }

    /// Latch the velocity setpoint applied from the next step on.
    pub fn set_setpoint(&mut self, set_vel: f64) {
        self.set_vel = set_vel;
    }

    /// Apply the enable switch from a control snapshot.
    pub fn apply_enable(&mut self, info: &ControlInfo) {
        if info.setpoint(self.axis).switch {
            if !self.enabled {
                self.enable();
            }
        } else if self.enabled {
            self.disable();
        }
    }

    /// Apply the velocity setpoint from a control snapshot.
    pub fn apply_setpoint(&mut self, info: &ControlInfo) {
        self.set_setpoint(info.setpoint(self.axis).value);
    }

    /// Advance one sub-step of `dt` seconds. A disabled axis holds.
    fn step(&mut self, dt: f64) {
        if !self.enabled {
            return;
        }

        let lag = TIME_FACTOR * TIME_FACTOR / (dt * dt) + 2.0 * DAMPING * TIME_FACTOR / dt + 1.0;
        let mut new_vel = (K_FACTOR * self.set_vel - self.vel) / lag + self.vel;
        new_vel = new_vel.clamp(self.min_vel, self.max_vel);

        // Trapezoid-ish integration: old velocity plus half the new one.
        let mut new_pos = self.pos + self.vel * dt + 0.5 * new_vel * dt * dt;
        new_pos = new_pos.clamp(0.0, self.max_pos);

        self.pos = new_pos;
        self.vel = new_vel;
    }

    /// Advance one full cycle of `cycle_dt` seconds in fine sub-steps.
    pub fn fine_step(&mut self, cycle_dt: f64) {
        let dt = cycle_dt / f64::from(FINE_ITERATIONS);
        for _ in 0..FINE_ITERATIONS {
            self.step(dt);
        }
    }
}

/// The simulated axes of one drive, `count` consecutive axes starting at
/// `first`.
pub fn build_axes(first: AxisId, count: usize) -> Vec<AxisSim> {
    AxisId::ALL
        .into_iter()
        .skip(first.index())
        .take(count)
        .map(AxisSim::new)
        .collect()
}
