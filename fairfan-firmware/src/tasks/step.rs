//! Step pulse task
//!
//! One instance per axis. Ticks the axis at its current pulse rate and
//! mirrors the result onto the STEP/DIR pins. While the axis is idle the
//! task sleeps on its wake signal.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;

use fairfan_core::motion::{Axis, StepOutcome};
use fairfan_drivers::stepper::StepDirPins;
use fairfan_hal_rp2040::RpOutput;

/// Driver timing around direction changes
#[derive(Debug, Clone, Copy)]
pub struct StepTiming {
    /// Pause after a direction change before the first pulse
    pub dir_change_delay_ms: u32,
    /// DIR-to-STEP setup time of the driver
    pub dir_setup_us: u32,
}

#[embassy_executor::task(pool_size = 2)]
pub async fn step_task(
    axis: &'static Axis,
    mut pins: StepDirPins<RpOutput<'static>>,
    wake: &'static Signal<CriticalSectionRawMutex, ()>,
    timing: StepTiming,
) {
    info!("Step task started for {} axis", axis.id());

    pins.set_enabled(true);

    loop {
        // Only touch DIR between pulses
        if !pins.is_pulse_high() && pins.sync_direction(axis) {
            trace!("{} direction -> {}", axis.id(), axis.direction());
            Timer::after_millis(timing.dir_change_delay_ms as u64).await;
            Timer::after_micros(timing.dir_setup_us as u64).await;
        }

        let outcome = axis.tick();
        pins.apply(outcome);

        if outcome == StepOutcome::Idle {
            wake.wait().await;
            continue;
        }

        Timer::after_micros(axis.pulse_period_us() as u64).await;
    }
}
