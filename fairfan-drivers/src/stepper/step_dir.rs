//! STEP/DIR stepper driver outputs
//!
//! Drives the pins of a generic step/direction driver (A4988, DRV8825,
//! TMC in standalone mode) from the state published by an [`Axis`].
//! Pin polarity is the HAL's business: `set_high` here means "asserted".

use fairfan_core::motion::{Axis, StepOutcome};
use fairfan_core::traits::Direction;
use fairfan_hal::OutputPin;

/// Output pins of one stepper driver
pub struct StepDirPins<P> {
    step: P,
    dir: P,
    enable: Option<P>,
}

impl<P: OutputPin> StepDirPins<P> {
    pub fn new(step: P, dir: P, enable: Option<P>) -> Self {
        let mut pins = Self { step, dir, enable };
        pins.step.set_low();
        pins
    }

    /// Apply the line change requested by [`Axis::tick`]
    pub fn apply(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::High => self.step.set_high(),
            StepOutcome::Low => self.step.set_low(),
            StepOutcome::Idle => {}
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.dir.set_level(direction.is_high());
    }

    /// Assert or release the driver enable line, if there is one
    pub fn set_enabled(&mut self, enabled: bool) {
        if let Some(enable) = self.enable.as_mut() {
            enable.set_level(enabled);
        }
    }

    /// Copy a pending direction change from the axis to the DIR line
    ///
    /// Returns true if the line changed; the caller must give the driver
    /// its setup time before the next step pulse.
    pub fn sync_direction(&mut self, axis: &Axis) -> bool {
        if axis.take_direction_change() {
            self.set_direction(axis.direction());
            true
        } else {
            false
        }
    }

    /// Step line currently high
    pub fn is_pulse_high(&self) -> bool {
        self.step.is_set_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairfan_core::motion::{AxisConfig, AxisId};

    #[derive(Default)]
    struct Latch {
        high: bool,
        edges: u32,
    }

    impl OutputPin for Latch {
        fn set_high(&mut self) {
            if !self.high {
                self.edges += 1;
            }
            self.high = true;
        }

        fn set_low(&mut self) {
            self.high = false;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    fn pins() -> StepDirPins<Latch> {
        StepDirPins::new(Latch::default(), Latch::default(), Some(Latch::default()))
    }

    #[test]
    fn test_one_pulse_per_step() {
        let axis = Axis::new(AxisId::Main, AxisConfig::MAIN);
        axis.begin_move(Direction::Clockwise, 3);
        let mut pins = pins();

        for _ in 0..10 {
            pins.apply(axis.tick());
        }
        assert_eq!(pins.step.edges, 3);
        assert!(!pins.is_pulse_high());
        assert_eq!(axis.position(), 3);
    }

    #[test]
    fn test_direction_follows_axis() {
        let axis = Axis::new(AxisId::Oscillation, AxisConfig::OSCILLATION);
        let mut pins = pins();

        axis.begin_move(Direction::CounterClockwise, 1);
        assert!(pins.sync_direction(&axis));
        assert!(!pins.dir.high);
        assert!(!pins.sync_direction(&axis));

        axis.begin_move(Direction::Clockwise, 1);
        assert!(pins.sync_direction(&axis));
        assert!(pins.dir.high);
    }

    #[test]
    fn test_enable_line() {
        let mut pins = pins();
        pins.set_enabled(true);
        assert!(pins.enable.as_ref().is_some_and(|p| p.high));

        let mut bare = StepDirPins::new(Latch::default(), Latch::default(), None);
        bare.set_enabled(true);
        assert!(bare.enable.is_none());
    }
}
