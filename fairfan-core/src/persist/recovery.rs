//! Boot-time position recovery
//!
//! Decides what to do with the position read from the store. Acting on the
//! decision (restoring the axis, scheduling the return move) is up to the
//! caller.

use super::store::LoadOutcome;

/// Recommended action after loading the stored position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    /// Store was empty; start at zero
    Fresh,
    /// Axis was at zero when power was lost
    AtHome,
    /// Axis stopped away from zero; restore the position and return home
    Resume { position: i32 },
    /// Stored value is outside the physical travel; reset to zero and clear
    Corrupt { position: i32 },
}

impl RecoveryAction {
    /// Position the axis should hold after recovery
    pub fn position(&self) -> i32 {
        match *self {
            RecoveryAction::Resume { position } => position,
            _ => 0,
        }
    }
}

/// Classify a load result against the largest plausible travel
pub fn recover(outcome: &LoadOutcome, max_travel_steps: u32) -> RecoveryAction {
    if matches!(outcome, LoadOutcome::NoPriorData) {
        return RecoveryAction::Fresh;
    }
    let position = outcome.position();
    if position.unsigned_abs() > max_travel_steps {
        RecoveryAction::Corrupt { position }
    } else if position == 0 {
        RecoveryAction::AtHome
    } else {
        RecoveryAction::Resume { position }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u32 = 64_000;

    #[test]
    fn test_fresh() {
        assert_eq!(recover(&LoadOutcome::NoPriorData, MAX), RecoveryAction::Fresh);
    }

    #[test]
    fn test_at_home() {
        assert_eq!(recover(&LoadOutcome::Agreed(0), MAX), RecoveryAction::AtHome);
    }

    #[test]
    fn test_resume_within_travel() {
        assert_eq!(
            recover(&LoadOutcome::PrimaryOnly(-64_000), MAX),
            RecoveryAction::Resume { position: -64_000 }
        );
        assert_eq!(
            recover(
                &LoadOutcome::Diverged {
                    primary: 1000,
                    backup: 1044
                },
                MAX
            ),
            RecoveryAction::Resume { position: 1000 }
        );
    }

    #[test]
    fn test_corrupt_beyond_travel() {
        let action = recover(&LoadOutcome::Agreed(i32::MIN), MAX);
        assert_eq!(action, RecoveryAction::Corrupt { position: i32::MIN });
        assert_eq!(action.position(), 0);
        assert_eq!(
            recover(&LoadOutcome::BackupOnly(64_001), MAX),
            RecoveryAction::Corrupt { position: 64_001 }
        );
    }
}
