//! Control task
//!
//! Owns the controller. Every control interval it samples the limit
//! switches and polls the controller; in between it executes operator
//! commands. After either it wakes the step tasks so newly published
//! moves start pulsing.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::peripherals::I2C0;
use embassy_time::{Duration, Instant, Ticker};

use fairfan_core::config::MachineConfig;
use fairfan_core::controller::{BootReport, ControlInputs, Controller, ControllerEvent};
use fairfan_core::motion::Axis;
use fairfan_core::persist::RecoveryAction;
use fairfan_drivers::fram::Mb85rc;
use fairfan_drivers::switch::LimitSwitch;
use fairfan_hal_rp2040::{RpI2c, RpInput};

use crate::channels::{OperatorCommand, COMMAND_CHANNEL, MAIN_WAKE, OSCILLATION_WAKE};

/// Position FRAM on the board's I2C0
pub type Fram = Mb85rc<RpI2c<'static, I2C0>>;

type FanController = Controller<'static, Fram>;

/// Largest raw store dump per command
const DUMP_MAX: usize = 256;

/// Everything the control task takes ownership of
pub struct ControlParts {
    pub config: MachineConfig,
    pub main: &'static Axis,
    pub oscillation: &'static Axis,
    pub fram: Fram,
    pub first_switch: LimitSwitch<RpInput<'static>>,
    pub second_switch: LimitSwitch<RpInput<'static>>,
}

#[embassy_executor::task]
pub async fn control_task(parts: ControlParts) {
    info!("Control task started");

    let ControlParts {
        config,
        main,
        oscillation,
        fram,
        mut first_switch,
        mut second_switch,
    } = parts;

    let interval_ms = config.timing.control_interval_ms.max(1);
    let mut controller = Controller::new(config, main, oscillation, fram);

    let report = controller.boot();
    log_boot(&report);
    wake_axes(main, oscillation);

    let mut ticker = Ticker::every(Duration::from_millis(interval_ms as u64));
    let start = Instant::now();

    loop {
        match select(ticker.next(), COMMAND_CHANNEL.receive()).await {
            Either::First(()) => {
                let now_ms = start.elapsed().as_millis() as u32;
                let inputs = ControlInputs {
                    first_pressed: first_switch.poll(now_ms),
                    second_pressed: second_switch.poll(now_ms),
                    now_ms,
                };
                for event in controller.poll(inputs) {
                    log_event(&event);
                }
            }
            Either::Second(cmd) => {
                debug!("Command: {}", cmd);
                dispatch(&mut controller, cmd);
            }
        }
        wake_axes(main, oscillation);
    }
}

fn wake_axes(main: &Axis, oscillation: &Axis) {
    if main.is_enabled() {
        MAIN_WAKE.signal(());
    }
    if oscillation.is_enabled() {
        OSCILLATION_WAKE.signal(());
    }
}

fn log_boot(report: &BootReport) {
    match report.load {
        Ok(outcome) => {
            info!("Stored position: {}", outcome);
            if outcome.is_ambiguous() {
                warn!("Position slots disagree");
            }
        }
        Err(e) => error!("FRAM unavailable, running without persistence: {}", e),
    }

    match report.recovery {
        Some(RecoveryAction::Corrupt { position }) => {
            warn!("Stored position {} is out of range, reset to zero", position)
        }
        Some(RecoveryAction::Resume { position }) => match report.recovery_steps {
            Some(steps) => info!("Resuming at {}, returning {} steps to zero", position, steps),
            None => info!("Resuming at {}", position),
        },
        Some(action) => debug!("Recovery: {}", action),
        None => {}
    }
    if let Some(e) = report.repair {
        error!("Store reset failed, corrupt position remains: {}", e);
    }

    if report.homing_scheduled {
        info!("Oscillation homing scheduled");
    }
}

fn log_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::SoftLimitWarning { end_position } => {
            warn!("Move ends past the soft limit at {}", end_position)
        }
        ControllerEvent::MoveRejected(e) => warn!("Move rejected: {}", e),
        ControllerEvent::SequenceRejected(e) => warn!("Sequence not started: {}", e),
        ControllerEvent::SaveFailed(e) => error!("Position save failed: {}", e),
        ControllerEvent::PositionSaved { .. } | ControllerEvent::MoveStarted { .. } => {
            debug!("{}", event)
        }
        _ => info!("{}", event),
    }
}

fn dispatch(controller: &mut FanController, cmd: OperatorCommand) {
    match cmd {
        OperatorCommand::GoMain => match controller.go_main() {
            Ok(outcome) => info!("Main axis: {}", outcome),
            Err(e) => warn!("Move rejected: {}", e),
        },
        OperatorCommand::MoveMain { direction, degrees } => {
            match controller.move_main(direction, degrees) {
                Ok(outcome) => info!("Main axis: {}", outcome),
                Err(e) => warn!("Move rejected: {}", e),
            }
        }
        OperatorCommand::SetDistance(degrees) => match controller.set_custom_distance(degrees) {
            Ok(degrees) => info!("Move distance set to {} deg", degrees),
            Err(e) => warn!("Distance rejected: {}", e),
        },
        OperatorCommand::StopMain => {
            controller.stop_main();
            info!("Main axis stopped");
        }
        OperatorCommand::SetZero => match controller.set_zero() {
            Ok(()) => info!("Main axis zeroed"),
            Err(e) => error!("Zeroed, but the save failed: {}", e),
        },
        OperatorCommand::ReturnHome => match controller.return_home() {
            Some(outcome) => info!("Returning home: {}", outcome),
            None => info!("Already at home"),
        },
        OperatorCommand::ReportPosition => info!("{}", controller.position()),
        OperatorCommand::StartHoming => {
            for event in controller.start_homing() {
                log_event(&event);
            }
        }
        OperatorCommand::StopOscillation => {
            controller.stop_oscillation();
            info!("Oscillation stopped");
        }
        OperatorCommand::StartSequence => match controller.start_sequence() {
            Ok(multiplier) => info!("Sequence started, oscillation at {}x", multiplier),
            Err(e) => warn!("Sequence not started: {}", e),
        },
        OperatorCommand::StopSequence => {
            if controller.stop_sequence() {
                info!("Sequence stopped");
            } else {
                info!("No sequence running");
            }
        }
        OperatorCommand::SoftStop => {
            controller.soft_stop();
            info!("Soft stop: finishing moves, then homing");
        }
        OperatorCommand::StopAll => {
            controller.stop_all();
            info!("All motion stopped");
        }
        OperatorCommand::StoreInfo => match controller.store_info() {
            Ok(store) => info!("{}", store),
            Err(e) => error!("Store: {}", e),
        },
        OperatorCommand::StoreClear => match controller.store_clear() {
            Ok(()) => info!("Store cleared"),
            Err(e) => error!("Store: {}", e),
        },
        OperatorCommand::StoreFix => match controller.store_fix() {
            Ok(()) => info!("Store reset to zero"),
            Err(e) => error!("Store: {}", e),
        },
        OperatorCommand::StoreWrite { address, value } => {
            match controller.store_write_raw(address, value) {
                Ok(()) => info!("0x{:04x} <- 0x{:02x}", address, value),
                Err(e) => error!("Store: {}", e),
            }
        }
        OperatorCommand::StoreRead { address } => match controller.store_read_raw(address) {
            Ok(value) => info!("0x{:04x} = 0x{:02x}", address, value),
            Err(e) => error!("Store: {}", e),
        },
        OperatorCommand::StoreDump { address, len } => {
            let mut buf = [0u8; DUMP_MAX];
            let len = (len as usize).min(DUMP_MAX);
            match controller.store_read_range(address, &mut buf[..len]) {
                Ok(()) => info!("0x{:04x}: {=[u8]:02x}", address, &buf[..len]),
                Err(e) => error!("Store: {}", e),
            }
        }
    }
}
