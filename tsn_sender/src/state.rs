//! Shared plant state between the cyclic threads and the operator side.
//!
//! One [`DeadlineMutex`] guards both directions: the setpoints the send
//! loop publishes and the feedback positions the receive loop stores.
//! The cyclic threads only ever touch it through the deadline-bound
//! source/sink adapters.

use std::sync::Arc;

use tsn_common::axis::{AxisId, AxisInfo, ControlInfo};
use tsn_common::consts::NUM_AXES;
use tsn_common::time::TaiTime;
use tsn_cyclic::executor::{FeedbackSink, SetpointSource};
use tsn_cyclic::{DeadlineMutex, ExchangeError, TaiClock};

/// Everything the controller shares across threads.
#[derive(Debug)]
pub struct PlantState {
    /// Setpoints published on the next send cycle.
    pub control: ControlInfo,
    /// Most recent feedback per axis.
    pub feedback: [AxisInfo; NUM_AXES],
}

impl Default for PlantState {
    fn default() -> Self {
        Self {
            control: ControlInfo::default(),
            feedback: [
                AxisInfo::zero(AxisId::X),
                AxisInfo::zero(AxisId::Y),
                AxisInfo::zero(AxisId::Z),
                AxisInfo::zero(AxisId::Spindle),
            ],
        }
    }
}

pub type SharedPlant = Arc<DeadlineMutex<PlantState>>;

pub fn shared_plant() -> SharedPlant {
    Arc::new(DeadlineMutex::new(PlantState::default()))
}

/// Send-loop view: snapshots the current setpoints.
pub struct PlantSource {
    plant: SharedPlant,
    clock: TaiClock,
}

impl PlantSource {
    pub fn new(plant: SharedPlant) -> Self {
        Self {
            plant,
            clock: TaiClock,
        }
    }
}

impl SetpointSource for PlantSource {
    fn read(&mut self, deadline: TaiTime) -> Result<ControlInfo, ExchangeError> {
        self.plant.try_exchange(&self.clock, deadline, |s| s.control)
    }
}

/// Receive-loop view: stores one axis' feedback.
pub struct PlantSink {
    plant: SharedPlant,
    clock: TaiClock,
}

impl PlantSink {
    pub fn new(plant: SharedPlant) -> Self {
        Self {
            plant,
            clock: TaiClock,
        }
    }
}

impl FeedbackSink for PlantSink {
    fn write(&mut self, info: &AxisInfo, deadline: TaiTime) -> Result<(), ExchangeError> {
        self.plant.try_exchange(&self.clock, deadline, |s| {
            s.feedback[info.axis.index()] = *info;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_and_sink_share_one_state() {
        let plant = shared_plant();
        let mut source = PlantSource::new(Arc::clone(&plant));
        let mut sink = PlantSink::new(Arc::clone(&plant));
        let far = TaiTime::new(i64::MAX, 0);

        plant.lock().unwrap().control.x_set.value = 12.0;
        let info = source.read(far).unwrap();
        assert!((info.x_set.value - 12.0).abs() < 1e-9);

        let fb = AxisInfo {
            axis: AxisId::Z,
            value: 77.5,
            switch: true,
        };
        sink.write(&fb, far).unwrap();
        assert_eq!(plant.lock().unwrap().feedback[AxisId::Z.index()], fb);
    }
}
