//! Top-level controller
//!
//! The controller owns the position store, the speed profiles and the
//! three state machines, and borrows the two axes it drives. Once per
//! control cycle [`Controller::poll`] feeds the machines fresh axis
//! snapshots and executes the commands they return, in order.
//!
//! The pulse timers only ever see the axes; everything else in here runs
//! on the control loop.

pub mod events;

pub use events::{BootReport, ControllerEvent, Events, MoveOutcome, PositionInfo, MAX_EVENTS};

use crate::config::MachineConfig;
use crate::motion::{Axis, AxisId, LimitCheck, MoveError, SpeedProfile};
use crate::persist::{recover, PositionStore, RecoveryAction, StoreError, StoreInfo};
use crate::state::command::commands;
use crate::state::{
    sync_speed_multiplier, Command, Commands, HomingInputs, HomingMachine, HomingState,
    MoveRequest, SequenceError, SequenceInputs, SequenceMachine, SoftStopInputs,
    SoftStopMachine,
};
use crate::traits::{Direction, NvMemory};

/// Inputs sampled by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlInputs {
    /// Debounced state of the first limit switch
    pub first_pressed: bool,
    pub second_pressed: bool,
    /// Monotonic time in milliseconds
    pub now_ms: u32,
}

/// Controller for both axes
pub struct Controller<'a, M> {
    config: MachineConfig,
    main: &'a Axis,
    oscillation: &'a Axis,
    main_profile: SpeedProfile,
    oscillation_profile: SpeedProfile,
    store: PositionStore<M>,
    homing: HomingMachine,
    sequence: SequenceMachine,
    softstop: SoftStopMachine,
    custom_distance_deg: Option<f32>,
    /// Boot homing waits for the recovery move
    homing_pending: bool,
    recovery_active: bool,
    /// Start the sequence once boot homing completes
    sequence_pending: bool,
    unsaved: bool,
    save_failing: bool,
}

impl<'a, M: NvMemory> Controller<'a, M> {
    pub fn new(config: MachineConfig, main: &'a Axis, oscillation: &'a Axis, memory: M) -> Self {
        let main_profile =
            SpeedProfile::new(&config.main.profile, config.main.axis.steps_per_output_rev());
        let oscillation_profile = SpeedProfile::new(
            &config.oscillation.profile,
            config.oscillation.axis.steps_per_output_rev(),
        );
        Self {
            homing: HomingMachine::new(config.homing_config()),
            sequence: SequenceMachine::new(config.sequence_config()),
            softstop: SoftStopMachine::new(config.home_tolerance_steps()),
            main_profile,
            oscillation_profile,
            store: PositionStore::new(memory),
            main,
            oscillation,
            config,
            custom_distance_deg: None,
            homing_pending: false,
            recovery_active: false,
            sequence_pending: false,
            unsaved: false,
            save_failing: false,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn homing(&self) -> &HomingMachine {
        &self.homing
    }

    pub fn sequence(&self) -> &SequenceMachine {
        &self.sequence
    }

    pub fn softstop(&self) -> &SoftStopMachine {
        &self.softstop
    }

    pub fn store(&self) -> &PositionStore<M> {
        &self.store
    }

    fn axis(&self, id: AxisId) -> &'a Axis {
        match id {
            AxisId::Main => self.main,
            AxisId::Oscillation => self.oscillation,
        }
    }

    /// Restore the main-axis position and schedule boot motion
    ///
    /// Must run once before the first [`poll`](Self::poll).
    pub fn boot(&mut self) -> BootReport {
        self.main.init();
        self.oscillation.init();

        let load = self.store.init().and_then(|_| self.store.load());
        let mut recovery = None;
        let mut recovery_steps = None;
        let mut repair = None;

        if let Ok(outcome) = load {
            let action = recover(&outcome, self.config.max_travel_steps());
            match action {
                RecoveryAction::Fresh | RecoveryAction::AtHome => self.main.set_position(0),
                RecoveryAction::Corrupt { .. } => {
                    self.main.set_position(0);
                    repair = self.store_fix().err();
                }
                RecoveryAction::Resume { position } => {
                    self.main.set_position(position);
                    if self.config.store.auto_recovery {
                        let request = MoveRequest::ramped(
                            Direction::toward_zero(position),
                            position.unsigned_abs(),
                        );
                        if self.start_move(AxisId::Main, request).is_ok() {
                            recovery_steps = Some(request.steps);
                            self.recovery_active = true;
                        }
                    }
                }
            }
            recovery = Some(action);
        } else {
            self.main.set_position(0);
        }
        // The restored position needs no save
        self.main.take_position_changed();

        self.homing_pending = self.config.homing.auto_start;
        self.sequence_pending = self.config.homing.auto_start && self.config.sequence.auto_start;

        BootReport {
            load,
            recovery,
            recovery_steps,
            repair,
            homing_scheduled: self.homing_pending,
        }
    }

    /// Run one control cycle
    pub fn poll(&mut self, inputs: ControlInputs) -> Events {
        let mut events = Events::new();

        self.update_profiles();

        // Recovery finishes before boot homing may start
        if self.recovery_active && !self.main.is_enabled() {
            self.recovery_active = false;
            let _ = events.push(ControllerEvent::RecoveryComplete);
        }
        if self.homing_pending
            && !(self.recovery_active && self.config.store.recovery_before_homing)
        {
            self.homing_pending = false;
            self.run(commands([Command::StartHoming]), &mut events);
        }

        let before = self.homing.state();
        let cmds = self.homing.poll(HomingInputs {
            axis: self.oscillation.snapshot(),
            first_pressed: inputs.first_pressed,
            second_pressed: inputs.second_pressed,
            now_ms: inputs.now_ms,
        });
        self.run(cmds, &mut events);
        if before != HomingState::Complete && self.homing.state() == HomingState::Complete {
            if let (Some(measured), Some(usable)) =
                (self.homing.measured_range(), self.homing.usable_range())
            {
                let _ = events.push(ControllerEvent::HomingComplete { measured, usable });
            }
        }

        if self.sequence_pending
            && self.homing.is_idle()
            && self.homing.is_homing_complete()
            && !self.main.is_enabled()
        {
            self.sequence_pending = false;
            match self.start_sequence() {
                Ok(multiplier) => {
                    let _ = events.push(ControllerEvent::SequenceStarted { multiplier });
                }
                Err(e) => {
                    let _ = events.push(ControllerEvent::SequenceRejected(e));
                }
            }
        }

        let cmds = self.sequence.poll(SequenceInputs {
            main: self.main.snapshot(),
            oscillation: self.oscillation.snapshot(),
        });
        self.run(cmds, &mut events);

        let was_active = self.softstop.is_active();
        let cmds = self.softstop.poll(SoftStopInputs {
            main: self.main.snapshot(),
            oscillation: self.oscillation.snapshot(),
            homing_idle: self.homing.is_idle(),
        });
        self.run(cmds, &mut events);
        if was_active && !self.softstop.is_active() {
            let _ = events.push(ControllerEvent::SoftStopComplete);
        }

        self.persist(&mut events);
        events
    }

    /// Feed the ramp factor of each running move to its axis
    fn update_profiles(&mut self) {
        if self.main.is_enabled() {
            let factor = self.main_profile.evaluate(self.main.step_count());
            self.main.set_profile_factor(factor);
        }
        if self.oscillation.is_enabled() {
            let factor = self.oscillation_profile.evaluate(self.oscillation.step_count());
            self.oscillation.set_profile_factor(factor);
        }
    }

    /// Save the main-axis position when it drifted far enough or came to
    /// rest
    fn persist(&mut self, events: &mut Events) {
        if self.main.take_position_changed() {
            self.unsaved = true;
        }
        if !self.unsaved || !self.store.is_loaded() {
            return;
        }

        let position = self.main.position();
        let drift = position.abs_diff(self.store.last_saved());
        let at_rest = !self.main.is_enabled();
        if drift < self.config.travel.save_interval_steps && !at_rest {
            return;
        }
        if drift == 0 {
            self.unsaved = false;
            return;
        }

        match self.store.save(position) {
            Ok(slot) => {
                self.unsaved = false;
                self.save_failing = false;
                if at_rest {
                    let _ = events.push(ControllerEvent::PositionSaved { position, slot });
                }
            }
            Err(e) => {
                if !self.save_failing {
                    let _ = events.push(ControllerEvent::SaveFailed(e));
                }
                self.save_failing = true;
            }
        }
    }

    fn run(&mut self, cmds: Commands, events: &mut Events) {
        for cmd in cmds {
            self.execute(cmd, events);
        }
    }

    /// Apply one machine command
    fn execute(&mut self, cmd: Command, events: &mut Events) {
        match cmd {
            Command::Move { axis, request } => match self.start_move(axis, request) {
                Ok(check) => {
                    if check == LimitCheck::SoftLimitWarning {
                        let end_position = self.axis(axis).position();
                        let _ = events.push(ControllerEvent::SoftLimitWarning { end_position });
                    }
                    let _ = events.push(ControllerEvent::MoveStarted {
                        axis,
                        direction: request.direction,
                        steps: request.steps,
                    });
                }
                Err(e) => {
                    let _ = events.push(ControllerEvent::MoveRejected(e));
                }
            },
            Command::Stop(axis) => self.axis(axis).disable(),
            Command::SetPosition { axis, position } => self.axis(axis).set_position(position),
            Command::SetSpeedMultiplier { axis, multiplier } => {
                self.axis(axis).set_speed_multiplier(multiplier)
            }
            Command::StartHoming => {
                // Strokes assume a homed range
                self.sequence.stop_without_motors();
                self.oscillation.set_speed_multiplier(1.0);
                let cmds = self.homing.start();
                self.run(cmds, events);
                let _ = events.push(ControllerEvent::HomingStarted);
            }
        }
    }

    /// Publish a move: limit check, ramp, then the axis itself
    fn start_move(&mut self, id: AxisId, request: MoveRequest) -> Result<LimitCheck, MoveError> {
        if request.needs_homing && !self.homing.is_homing_complete() {
            return Err(MoveError::NotHomed);
        }
        let axis = self.axis(id);
        let check = if request.check_limits && id == AxisId::Main {
            self.config.travel.limits.check(
                axis.config(),
                axis.position(),
                request.direction,
                request.steps,
            )?
        } else {
            LimitCheck::Unchecked
        };

        let profile = match id {
            AxisId::Main => &mut self.main_profile,
            AxisId::Oscillation => &mut self.oscillation_profile,
        };
        if request.ramped {
            profile.begin_move(request.steps);
        } else {
            profile.bypass();
        }
        axis.set_profile_factor(profile.evaluate(0));
        axis.begin_move(request.direction, request.steps);
        Ok(check)
    }

    fn main_move(&mut self, direction: Direction, degrees: f32) -> Result<MoveOutcome, MoveError> {
        let degrees = self.config.travel.limits.clamp_distance(degrees)?;
        let steps = self.config.main.axis.degrees_to_steps(degrees);
        let request = MoveRequest::checked(direction, steps);
        let check = self.start_move(AxisId::Main, request)?;
        Ok(MoveOutcome {
            direction,
            steps,
            check,
        })
    }

    /// Move the main axis clockwise by the custom or default distance
    pub fn go_main(&mut self) -> Result<MoveOutcome, MoveError> {
        let degrees = self
            .custom_distance_deg
            .unwrap_or(self.config.travel.default_move_deg);
        self.main_move(Direction::Clockwise, degrees)
    }

    /// Move the main axis by `degrees` in `direction`
    pub fn move_main(&mut self, direction: Direction, degrees: f32) -> Result<MoveOutcome, MoveError> {
        self.main_move(direction, degrees)
    }

    /// Set the distance used by [`go_main`](Self::go_main)
    pub fn set_custom_distance(&mut self, degrees: f32) -> Result<f32, MoveError> {
        let degrees = self.config.travel.limits.clamp_distance(degrees)?;
        self.custom_distance_deg = Some(degrees);
        Ok(degrees)
    }

    pub fn stop_main(&mut self) {
        self.main.disable();
    }

    /// Declare the current main-axis position as zero and persist it
    pub fn set_zero(&mut self) -> Result<(), StoreError> {
        self.main.disable();
        self.main.set_position(0);
        self.main.take_position_changed();
        self.unsaved = false;
        self.store.save(0).map(|_| ())
    }

    /// Drive the main axis back to zero, skipping the limit check
    ///
    /// Returns `None` if it is already there.
    pub fn return_home(&mut self) -> Option<MoveOutcome> {
        let position = self.main.position();
        if position == 0 {
            return None;
        }
        let request = MoveRequest::ramped(Direction::toward_zero(position), position.unsigned_abs());
        let check = self.start_move(AxisId::Main, request).ok()?;
        Some(MoveOutcome {
            direction: request.direction,
            steps: request.steps,
            check,
        })
    }

    pub fn position(&self) -> PositionInfo {
        let limits = &self.config.travel.limits;
        PositionInfo {
            steps: self.main.position(),
            degrees: self.main.position_degrees(),
            soft_limit_deg: limits.soft_limit_deg,
            hard_limit_deg: limits.hard_limit_deg,
            moving: self.main.is_enabled(),
        }
    }

    pub fn store_info(&mut self) -> Result<StoreInfo, StoreError> {
        self.store.inspect()
    }

    /// Wipe both slots and reset the main axis to zero
    pub fn store_clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.main.set_position(0);
        self.main.take_position_changed();
        self.unsaved = false;
        Ok(())
    }

    /// Wipe the store and write zero into both slots
    pub fn store_fix(&mut self) -> Result<(), StoreError> {
        self.store_clear()?;
        self.store.save(0)?;
        self.store.save(0)?;
        Ok(())
    }

    pub fn store_write_raw(&mut self, address: u16, value: u8) -> Result<(), StoreError> {
        self.store.write_raw(address, value)
    }

    pub fn store_read_raw(&mut self, address: u16) -> Result<u8, StoreError> {
        self.store.read_raw(address)
    }

    /// Read up to 256 bytes
    pub fn store_read_range(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StoreError> {
        self.store.read_range(address, buf)
    }

    /// Start an oscillation homing cycle
    pub fn start_homing(&mut self) -> Events {
        let mut events = Events::new();
        self.execute(Command::StartHoming, &mut events);
        events
    }

    /// Cancel homing and stop the oscillation axis
    pub fn stop_oscillation(&mut self) {
        let cmds = self.homing.cancel();
        let mut events = Events::new();
        self.run(cmds, &mut events);
        self.oscillation.disable();
    }

    /// Start the synchronized sequence
    ///
    /// Returns the oscillation speed multiplier in use.
    pub fn start_sequence(&mut self) -> Result<f32, SequenceError> {
        let usable = self.homing.usable_range().ok_or(SequenceError::NotHomed)?;
        let half_stroke = self.sequence.config().half_stroke(usable);
        let half_stroke_deg = self
            .config
            .oscillation
            .axis
            .steps_to_degrees(half_stroke.min(i32::MAX as u32) as i32);
        let multiplier = sync_speed_multiplier(
            &self.config.main.axis,
            &self.config.main.profile,
            self.config.sequence.trigger_offset_deg,
            &self.config.oscillation.axis,
            &self.config.oscillation.profile,
            half_stroke_deg,
        );

        self.softstop.stop();
        let cmds = self
            .sequence
            .start(Some(usable), self.main.snapshot(), multiplier)?;
        let mut events = Events::new();
        self.run(cmds, &mut events);
        Ok(self.oscillation.speed_multiplier())
    }

    /// Stop the sequence and both axes immediately
    ///
    /// Returns false if no sequence was running.
    pub fn stop_sequence(&mut self) -> bool {
        let cmds = self.sequence.stop();
        let was_running = !cmds.is_empty();
        let mut events = Events::new();
        self.run(cmds, &mut events);
        was_running
    }

    /// Let both axes finish their moves, return home and re-home
    pub fn soft_stop(&mut self) {
        self.sequence_pending = false;
        self.sequence.stop_without_motors();
        self.softstop.start();
    }

    /// Stop everything now
    pub fn stop_all(&mut self) {
        self.sequence_pending = false;
        self.homing_pending = false;
        self.sequence.stop_without_motors();
        self.softstop.stop();
        let cmds = self.homing.cancel();
        let mut events = Events::new();
        self.run(cmds, &mut events);
        self.main.disable();
        self.oscillation.disable();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{AxisConfig, StepOutcome};
    use crate::persist::store::tests::RamMemory;
    use crate::persist::{encode_slot, LoadOutcome, SlotStatus, SLOT_A_ADDR, SLOT_B_ADDR};
    use crate::traits::NvError;

    fn axes() -> (Axis, Axis) {
        (
            Axis::new(AxisId::Main, AxisConfig::MAIN),
            Axis::new(AxisId::Oscillation, AxisConfig::OSCILLATION),
        )
    }

    fn quiet_config() -> MachineConfig {
        let mut config = MachineConfig::default();
        config.homing.auto_start = false;
        config.sequence.auto_start = false;
        config
    }

    fn memory_with(position: i32) -> RamMemory {
        let mut memory = RamMemory::new();
        let record = encode_slot(position);
        memory.bytes[SLOT_A_ADDR as usize..SLOT_A_ADDR as usize + 8].copy_from_slice(&record);
        memory.bytes[SLOT_B_ADDR as usize..SLOT_B_ADDR as usize + 8].copy_from_slice(&record);
        memory
    }

    fn idle_inputs(now_ms: u32) -> ControlInputs {
        ControlInputs {
            first_pressed: false,
            second_pressed: false,
            now_ms,
        }
    }

    fn run_ticks(axis: &Axis, ticks: usize) {
        for _ in 0..ticks {
            let _: StepOutcome = axis.tick();
        }
    }

    #[test]
    fn test_boot_reports_failed_store_reset() {
        let (main, osc) = axes();
        let mut memory = memory_with(900_000);
        memory.fail_writes = true;
        let mut controller = Controller::new(quiet_config(), &main, &osc, memory);

        let report = controller.boot();
        assert_eq!(
            report.recovery,
            Some(RecoveryAction::Corrupt { position: 900_000 })
        );
        assert_eq!(report.repair, Some(StoreError::Memory(NvError::Bus)));
        assert_eq!(main.position(), 0);
        assert!(!main.is_enabled());

        // Nothing was rewritten
        let info = controller.store_info().unwrap();
        assert_eq!(info.slot_a, SlotStatus::Valid(900_000));
    }

    #[test]
    fn test_boot_corrupt_position_resets() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, memory_with(900_000));

        let report = controller.boot();
        assert_eq!(report.load, Ok(LoadOutcome::Agreed(900_000)));
        assert_eq!(
            report.recovery,
            Some(RecoveryAction::Corrupt { position: 900_000 })
        );
        assert_eq!(report.recovery_steps, None);
        assert_eq!(report.repair, None);
        assert_eq!(main.position(), 0);
        assert!(!main.is_enabled());

        let info = controller.store_info().unwrap();
        assert_eq!(info.slot_a, SlotStatus::Valid(0));
        assert_eq!(info.slot_b, SlotStatus::Valid(0));
    }

    #[test]
    fn test_boot_resume_schedules_return() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, memory_with(1000));

        let report = controller.boot();
        assert_eq!(report.recovery, Some(RecoveryAction::Resume { position: 1000 }));
        assert_eq!(report.recovery_steps, Some(1000));
        assert_eq!(main.position(), 1000);
        assert!(main.is_enabled());
        assert_eq!(main.direction(), Direction::CounterClockwise);

        run_ticks(&main, 2000);
        let events = controller.poll(idle_inputs(0));
        assert!(events.contains(&ControllerEvent::RecoveryComplete));
        assert_eq!(main.position(), 0);
        assert_eq!(controller.store().last_saved(), 0);
    }

    #[test]
    fn test_boot_without_memory() {
        let (main, osc) = axes();
        let mut memory = RamMemory::new();
        memory.present = false;
        let mut controller = Controller::new(quiet_config(), &main, &osc, memory);

        let report = controller.boot();
        assert_eq!(report.load, Err(StoreError::Memory(crate::traits::NvError::NotPresent)));
        assert_eq!(report.recovery, None);
        assert_eq!(controller.set_zero(), Err(StoreError::Uninitialized));
    }

    #[test]
    fn test_periodic_save() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();

        controller.move_main(Direction::Clockwise, 10.0).unwrap();
        // 40 steps: below the save interval
        run_ticks(&main, 80);
        controller.poll(idle_inputs(0));
        assert_eq!(controller.store().last_saved(), 0);

        // 50 steps total
        run_ticks(&main, 20);
        controller.poll(idle_inputs(10));
        assert_eq!(controller.store().last_saved(), 50);

        // Completion save at rest
        run_ticks(&main, 2000);
        let events = controller.poll(idle_inputs(20));
        let end = AxisConfig::MAIN.degrees_to_steps(10.0) as i32;
        assert_eq!(controller.store().last_saved(), end);
        assert!(events
            .iter()
            .any(|e| matches!(e, ControllerEvent::PositionSaved { position, .. } if *position == end)));
    }

    #[test]
    fn test_save_failure_reported_once() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();

        controller.store.memory_mut().fail_writes = true;
        controller.move_main(Direction::Clockwise, 1.0).unwrap();
        run_ticks(&main, 1000);

        let first = controller.poll(idle_inputs(0));
        assert!(first
            .iter()
            .any(|e| matches!(e, ControllerEvent::SaveFailed(_))));
        let second = controller.poll(idle_inputs(10));
        assert!(second.is_empty());

        controller.store.memory_mut().fail_writes = false;
        controller.poll(idle_inputs(20));
        assert_eq!(controller.store().last_saved(), main.position());
    }

    #[test]
    fn test_hard_limit_rejects_move() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();
        main.set_position(AxisConfig::MAIN.degrees_to_steps(700.0) as i32);

        assert_eq!(
            controller.move_main(Direction::Clockwise, 30.0),
            Err(MoveError::HardLimit)
        );
        assert!(!main.is_enabled());

        let outcome = controller.move_main(Direction::CounterClockwise, 30.0).unwrap();
        assert_eq!(outcome.check, LimitCheck::SoftLimitWarning);
        assert!(main.is_enabled());
    }

    #[test]
    fn test_custom_distance() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();

        assert_eq!(controller.set_custom_distance(-5.0), Err(MoveError::InvalidDistance));
        assert_eq!(controller.set_custom_distance(90.0), Ok(90.0));
        let outcome = controller.go_main().unwrap();
        assert_eq!(outcome.steps, 8000);
        assert_eq!(outcome.direction, Direction::Clockwise);
    }

    #[test]
    fn test_return_home() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();
        assert_eq!(controller.return_home(), None);

        main.set_position(-500);
        let outcome = controller.return_home().unwrap();
        assert_eq!(outcome.direction, Direction::Clockwise);
        assert_eq!(outcome.steps, 500);
        assert_eq!(outcome.check, LimitCheck::Unchecked);
    }

    #[test]
    fn test_sequence_requires_homing() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();
        assert_eq!(controller.start_sequence(), Err(SequenceError::NotHomed));
        assert!(!main.is_enabled());
    }

    #[test]
    fn test_store_raw_access() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();

        controller.store_write_raw(0x20, 0xAB).unwrap();
        assert_eq!(controller.store_read_raw(0x20), Ok(0xAB));
        assert_eq!(
            controller.store_write_raw(0x8000, 1),
            Err(StoreError::AddressOutOfRange)
        );
        let mut buf = [0u8; 257];
        assert_eq!(
            controller.store_read_range(0, &mut buf),
            Err(StoreError::AddressOutOfRange)
        );
    }

    /// Simulated rig: first switch at +300 oscillation steps, second at -4700
    fn switches(osc: &Axis, now_ms: u32) -> ControlInputs {
        ControlInputs {
            first_pressed: osc.position() >= 300,
            second_pressed: osc.position() <= -4700,
            now_ms,
        }
    }

    #[test]
    fn test_auto_home_then_sequence() {
        let (main, osc) = axes();
        let mut config = MachineConfig::default();
        config.homing.settle_ms = 20;
        let mut controller = Controller::new(config, &main, &osc, RamMemory::new());

        let report = controller.boot();
        assert!(report.homing_scheduled);

        let mut now = 0;
        let mut started = None;
        for _ in 0..20_000 {
            let events = controller.poll(switches(&osc, now));
            for event in &events {
                if let ControllerEvent::SequenceStarted { multiplier } = event {
                    started = Some(*multiplier);
                }
            }
            if started.is_some() {
                break;
            }
            run_ticks(&osc, 2);
            now += 10;
        }

        let multiplier = started.expect("sequence never started");
        assert!(controller.homing().is_homing_complete());
        assert!(controller.sequence().is_active());
        assert!(multiplier > 1.0);
        assert!(main.is_enabled());
        assert_eq!(main.direction(), Direction::Clockwise);
    }

    #[test]
    fn test_homing_stops_running_sequence() {
        let (main, osc) = axes();
        let mut config = MachineConfig::default();
        config.homing.settle_ms = 20;
        let mut controller = Controller::new(config, &main, &osc, RamMemory::new());
        controller.boot();

        let mut now = 0;
        while !controller.sequence().is_active() {
            assert!(now < 200_000, "sequence never started");
            controller.poll(switches(&osc, now));
            run_ticks(&osc, 2);
            now += 10;
        }
        let half_stroke = controller.sequence().half_stroke();
        assert_eq!(half_stroke, 2364);

        let events = controller.start_homing();
        assert!(events.contains(&ControllerEvent::HomingStarted));
        assert!(!controller.sequence().is_active());
        assert!(!controller.homing().is_homing_complete());

        let mut complete = false;
        for _ in 0..20_000 {
            let events = controller.poll(switches(&osc, now));
            for event in &events {
                if let ControllerEvent::MoveStarted {
                    axis: AxisId::Oscillation,
                    steps,
                    ..
                } = *event
                {
                    assert_ne!(steps, half_stroke, "stroke during homing");
                }
                if let ControllerEvent::HomingComplete { measured, .. } = *event {
                    assert_eq!(measured, 5000);
                    complete = true;
                }
            }
            assert!(!controller.sequence().is_active());
            if complete {
                break;
            }
            run_ticks(&main, 2);
            run_ticks(&osc, 2);
            now += 10;
        }
        assert!(complete);
    }

    #[test]
    fn test_stroke_refused_until_homed() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();

        let stroke = MoveRequest::stroke(Direction::Clockwise, 100);
        assert!(matches!(
            controller.start_move(AxisId::Oscillation, stroke),
            Err(MoveError::NotHomed)
        ));
        assert!(!osc.is_enabled());

        let mut events = Events::new();
        controller.execute(
            Command::Move {
                axis: AxisId::Oscillation,
                request: stroke,
            },
            &mut events,
        );
        assert!(events.contains(&ControllerEvent::MoveRejected(MoveError::NotHomed)));
        assert!(!osc.is_enabled());

        // Homing seeks are plain moves
        let seek = MoveRequest::constant(Direction::Clockwise, 100);
        assert!(controller.start_move(AxisId::Oscillation, seek).is_ok());
        assert!(osc.is_enabled());
    }

    #[test]
    fn test_soft_stop_ends_homed_at_zero() {
        let (main, osc) = axes();
        let mut config = quiet_config();
        config.homing.settle_ms = 20;
        let mut controller = Controller::new(config, &main, &osc, RamMemory::new());
        controller.boot();

        controller.move_main(Direction::Clockwise, 5.0).unwrap();
        controller.soft_stop();
        assert!(controller.softstop().is_active());

        let mut now = 0;
        let mut complete = false;
        for _ in 0..20_000 {
            let events = controller.poll(switches(&osc, now));
            if events.contains(&ControllerEvent::SoftStopComplete) {
                complete = true;
                break;
            }
            run_ticks(&main, 2);
            run_ticks(&osc, 2);
            now += 10;
        }

        assert!(complete);
        assert_eq!(main.position(), 0);
        assert!(controller.homing().is_homing_complete());
    }

    #[test]
    fn test_stop_all() {
        let (main, osc) = axes();
        let mut controller = Controller::new(quiet_config(), &main, &osc, RamMemory::new());
        controller.boot();
        controller.start_homing();
        controller.move_main(Direction::Clockwise, 5.0).unwrap();

        controller.stop_all();
        assert!(!main.is_enabled());
        assert!(!osc.is_enabled());
        assert!(controller.homing().is_idle());
    }
}
