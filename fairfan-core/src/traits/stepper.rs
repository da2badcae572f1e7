//! Stepper direction

/// Motor rotation direction
///
/// Clockwise pulses add to an axis position, counter-clockwise pulses
/// subtract from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise rotation (direction line high)
    Clockwise,
    /// Counter-clockwise rotation (direction line low)
    CounterClockwise,
}

impl Direction {
    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }

    /// Position change caused by one completed pulse
    pub fn sign(self) -> i32 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }

    /// Direction that moves a signed position back toward zero
    pub fn toward_zero(position: i32) -> Self {
        if position > 0 {
            Direction::CounterClockwise
        } else {
            Direction::Clockwise
        }
    }

    /// Level of the driver's direction line
    pub fn is_high(self) -> bool {
        matches!(self, Direction::Clockwise)
    }
}
