//! Velocity-limited stepper axis (yaw).
//!
//! Converts an angle target into bounded bursts of step pulses.  Each tick
//! either polls the single in-flight pulse train or issues a new one:
//!
//! ```text
//!            error < deadband                        error ≥ deadband
//!   ┌──────┐ ◀──────────────── ┌────────┐ ◀──────────────────────────┐
//!   │ Idle │                   │ Moving │ ──issue N pulses──▶ ┌──────┴────────┐
//!   └──────┘ ─error ≥ deadband▶└────────┘ ◀──train done────── │ PulseInFlight │
//!    driver off                 driver on    (commit angle)   └───────────────┘
//! ```
//!
//! Per tick with elapsed `dt`:
//!
//! ```text
//!   budget   = max_speed_dps × steps_per_degree × dt
//!   desired  = min(budget, |error| × steps_per_degree) + residual
//!   issue    = ⌊desired⌋
//!   residual = desired − issue            (0 ≤ residual < 1)
//! ```
//!
//! Velocity is limited by bounding steps per tick; the pulse on/off time is
//! a fixed driver characteristic.  Fractional steps are carried in the
//! residual instead of being truncated, so there is no long-run drift.
//! The angle is only committed when a train finishes, by exactly the
//! number of pulses it carried.  There is no cancellation: a new target
//! takes effect once the in-flight train completes.

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::{PinConfig, StepperConfig};
use crate::error::{Error, Result};
use crate::hal::{DigitalOutput, HardwareProvider, PulseTrain};

use super::{Phase, Subsystem, TickTimer, clamp_setpoint, release};

const NAME: &str = "yaw";

/// Rotation sense of the most recent pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increasing angle, DIR high.
    Positive,
    /// Decreasing angle, DIR low.
    Negative,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

struct StepperOutputs {
    dir: Box<dyn DigitalOutput>,
    enable: Box<dyn DigitalOutput>,
    step: Box<dyn PulseTrain>,
}

pub struct StepperAxis {
    config: StepperConfig,
    dir_pin: u8,
    step_pin: u8,
    enable_pin: u8,
    steps_per_degree: f32,
    pulse_high: Duration,
    pulse_low: Duration,

    io: Option<StepperOutputs>,
    phase: Phase,
    timer: TickTimer,

    current_angle: f32,
    target_angle: f32,
    step_residual: f32,
    busy: bool,
    pending_steps: u32,
    last_direction: Direction,
    driver_enabled: bool,
    steps_issued_total: u64,
}

impl StepperAxis {
    pub fn new(pins: &PinConfig, config: &StepperConfig) -> Self {
        let home = 0.0_f32.max(config.min_deg).min(config.max_deg);
        Self {
            config: config.clone(),
            dir_pin: pins.stepper_dir,
            step_pin: pins.stepper_step,
            enable_pin: pins.stepper_enable,
            steps_per_degree: config.steps_per_degree(),
            pulse_high: Duration::from_secs_f32(config.pulse_high_s.max(0.0)),
            pulse_low: Duration::from_secs_f32(config.pulse_low_s.max(0.0)),
            io: None,
            phase: Phase::Uninitialized,
            timer: TickTimer::new(),
            current_angle: home,
            target_angle: home,
            step_residual: 0.0,
            busy: false,
            pending_steps: 0,
            last_direction: Direction::Positive,
            driver_enabled: false,
            steps_issued_total: 0,
        }
    }

    // ── Setters ───────────────────────────────────────────────

    /// Clamp `deg` into the travel range and store it as the target.
    pub fn set_target_angle(&mut self, deg: f32) {
        match clamp_setpoint(deg, self.config.min_deg, self.config.max_deg) {
            Some(deg) => self.target_angle = deg,
            None => warn!("{}: ignoring NaN target", NAME),
        }
    }

    /// Energise or release the driver directly.  Motion ticks re-assert the
    /// line on their next run (on while moving, off inside the deadband).
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let io = self.io.as_mut().ok_or(Error::NotRunning(NAME))?;
        write_enable(io, &self.config, enabled)?;
        self.driver_enabled = enabled;
        info!("{}: driver {}", NAME, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn current_angle(&self) -> f32 {
        self.current_angle
    }

    pub fn target_angle(&self) -> f32 {
        self.target_angle
    }

    pub fn step_residual(&self) -> f32 {
        self.step_residual
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending_steps(&self) -> u32 {
        self.pending_steps
    }

    pub fn last_direction(&self) -> Direction {
        self.last_direction
    }

    pub fn is_driver_enabled(&self) -> bool {
        self.driver_enabled
    }

    /// Every pulse ever requested, across all trains.
    pub fn steps_issued_total(&self) -> u64 {
        self.steps_issued_total
    }

    pub fn steps_per_degree(&self) -> f32 {
        self.steps_per_degree
    }

    pub fn range(&self) -> (f32, f32) {
        (self.config.min_deg, self.config.max_deg)
    }

    // ── Internals ─────────────────────────────────────────────

    /// Apply `steps` pulses of the last train to the angle.
    fn commit(&mut self, steps: u32) {
        let delta = steps as f32 / self.steps_per_degree * self.last_direction.sign();
        self.current_angle = (self.current_angle + delta)
            .max(self.config.min_deg)
            .min(self.config.max_deg);
        self.busy = false;
        self.pending_steps = 0;
    }

    fn drive_enable(&mut self, enabled: bool) -> Result<()> {
        let io = self.io.as_mut().ok_or(Error::NotRunning(NAME))?;
        write_enable(io, &self.config, enabled)?;
        if self.driver_enabled != enabled {
            debug!("{}: driver {}", NAME, if enabled { "on" } else { "off" });
        }
        self.driver_enabled = enabled;
        Ok(())
    }
}

/// Enable line level for the logical state (`enabled` XOR active-low).
fn write_enable(
    io: &mut StepperOutputs,
    config: &StepperConfig,
    enabled: bool,
) -> core::result::Result<(), crate::error::HwError> {
    io.enable.set(enabled != config.enable_active_low)
}

impl Subsystem for StepperAxis {
    fn name(&self) -> &'static str {
        NAME
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn initialize(&mut self, hw: &mut dyn HardwareProvider) -> Result<()> {
        if self.phase == Phase::Running {
            return Ok(());
        }
        // Driver starts de-energised.
        let disabled_level = self.config.enable_active_low;
        let dir = hw.digital_output(self.dir_pin, false)?;
        let enable = hw.digital_output(self.enable_pin, disabled_level)?;
        let step = hw.pulse_train(self.step_pin)?;

        self.io = Some(StepperOutputs { dir, enable, step });
        self.step_residual = 0.0;
        self.busy = false;
        self.pending_steps = 0;
        self.driver_enabled = false;
        self.timer.reset();
        self.phase = Phase::Running;
        info!(
            "{}: stepper DIR={} STEP={} EN={} ({:.3} steps/°, ≤{:.0}°/s)",
            NAME,
            self.dir_pin,
            self.step_pin,
            self.enable_pin,
            self.steps_per_degree,
            self.config.max_speed_dps
        );
        Ok(())
    }

    fn periodic(&mut self, dt: f32) -> Result<()> {
        if self.io.is_none() {
            return Err(Error::NotRunning(NAME));
        }
        let error = self.target_angle - self.current_angle;

        if error.abs() < self.config.deadband_deg && !self.busy {
            return self.drive_enable(false);
        }
        self.drive_enable(true)?;

        let Some(io) = self.io.as_mut() else {
            return Err(Error::NotRunning(NAME));
        };

        if self.busy {
            if io.step.is_done() {
                let steps = self.pending_steps;
                self.commit(steps);
            }
            return Ok(());
        }

        let max_step_rate = self.config.max_speed_dps * self.steps_per_degree;
        let step_budget = max_step_rate * dt.max(0.0);
        let error_steps = error.abs() * self.steps_per_degree;
        let desired_steps = step_budget.min(error_steps) + self.step_residual;
        let steps_to_issue = desired_steps.floor();
        self.step_residual = desired_steps - steps_to_issue;

        if steps_to_issue < 1.0 {
            return Ok(());
        }

        let direction = if error > 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        };
        let count = steps_to_issue as u32;

        io.dir.set(direction == Direction::Positive)?;
        io.step.start(count, self.pulse_high, self.pulse_low)?;

        self.last_direction = direction;
        self.busy = true;
        self.pending_steps = count;
        self.steps_issued_total += u64::from(count);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.phase = Phase::ShutDown;
        info!("{}: shutting down", NAME);

        let io = self.io.take();
        let config = self.config.clone();
        let mut emitted = None;
        let busy = self.busy;
        let res = release(io, NAME, |io| {
            if busy {
                emitted = Some(io.step.halt());
            }
            write_enable(io, &config, false)
        });

        if let Some(steps) = emitted {
            debug!("{}: halted train after {} of {} pulses", NAME, steps, self.pending_steps);
            self.commit(steps);
        }
        self.driver_enabled = false;
        res
    }

    fn tick_timer(&mut self) -> &mut TickTimer {
        &mut self.timer
    }
}

impl Drop for StepperAxis {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
