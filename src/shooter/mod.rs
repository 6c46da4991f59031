//! Dual-flywheel shooter with a servo reload pusher.
//!
//! Setters change only the logical state (target power, state, pusher
//! target).  `periodic` advances the timed transitions and then writes
//! every output, so flywheel power and pusher position are refreshed on
//! each tick regardless of state.
//!
//! Pusher travel is open-loop: the move durations are estimates, not
//! measurements.  A jammed or slow pusher desynchronises the sequence.

pub mod states;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{PinConfig, ShooterConfig};
use crate::error::{Error, HwError, Result};
use crate::hal::motor::FlywheelMotor;
use crate::hal::{HardwareProvider, ServoOutput};
use crate::subsystem::{Phase, Subsystem, TickTimer, clamp_setpoint, release};

pub use states::{PusherPosition, ShooterEvent, ShooterState, ShooterTiming};

use states::{PowerAction, entry_action, on_event, on_timeout};

const NAME: &str = "shooter";

struct ShooterOutputs {
    motor_a: FlywheelMotor,
    motor_b: FlywheelMotor,
    pusher: Box<dyn ServoOutput>,
}

/// Read-only snapshot for status replies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShooterStatus {
    pub state: ShooterState,
    pub flywheel_power: f32,
    pub pusher: PusherPosition,
}

pub struct Shooter {
    config: ShooterConfig,
    timing: ShooterTiming,
    motor_a_pins: (u8, u8),
    motor_b_pins: (u8, u8),
    reload_pin: u8,

    io: Option<ShooterOutputs>,
    phase: Phase,
    timer: TickTimer,

    state: ShooterState,
    elapsed_in_state: f32,
    /// Set when a request changed state between ticks; the next tick's
    /// `dt` predates the entry and is not counted.
    entered_between_ticks: bool,
    target_flywheel_power: f32,
    pusher: PusherPosition,
}

impl Shooter {
    pub fn new(pins: &PinConfig, config: &ShooterConfig) -> Self {
        Self {
            config: config.clone(),
            timing: ShooterTiming::from(config),
            motor_a_pins: (pins.motor_a_forward, pins.motor_a_backward),
            motor_b_pins: (pins.motor_b_forward, pins.motor_b_backward),
            reload_pin: pins.reload_servo,
            io: None,
            phase: Phase::Uninitialized,
            timer: TickTimer::new(),
            state: ShooterState::Idle,
            elapsed_in_state: 0.0,
            entered_between_ticks: false,
            target_flywheel_power: 0.0,
            pusher: PusherPosition::Idle,
        }
    }

    // ── Setters ───────────────────────────────────────────────

    /// Start a full shoot cycle at `speed` (clamped to `[0, 1]`).
    ///
    /// Accepted only from `Idle`.  Anything else is rejected, not queued,
    /// and leaves the state and target power untouched.
    pub fn shoot(&mut self, speed: f32) -> bool {
        if on_event(self.state, ShooterEvent::Shoot).is_none() {
            debug!("{}: shoot rejected in {}", NAME, self.state);
            return false;
        }
        let Some(speed) = clamp_setpoint(speed, 0.0, 1.0) else {
            warn!("{}: shoot rejected, NaN speed", NAME);
            return false;
        };
        self.target_flywheel_power = speed;
        self.fire(ShooterEvent::Shoot)
    }

    /// Manual flywheel override.  Always accepted; never changes state.
    pub fn set_flywheel_power(&mut self, power: f32) {
        match clamp_setpoint(power, 0.0, 1.0) {
            Some(p) => self.target_flywheel_power = p,
            None => warn!("{}: ignoring NaN flywheel power", NAME),
        }
    }

    /// Pusher-only cycle from `Idle` (feed, hold, retract).
    pub fn push(&mut self) -> bool {
        self.fire(ShooterEvent::Push)
    }

    /// Retract early from `Pushing` or `AtPosition`.
    pub fn retract(&mut self) -> bool {
        self.fire(ShooterEvent::Retract)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> ShooterState {
        self.state
    }

    pub fn target_flywheel_power(&self) -> f32 {
        self.target_flywheel_power
    }

    pub fn pusher_position(&self) -> PusherPosition {
        self.pusher
    }

    /// Seconds spent in the current state.
    pub fn elapsed_in_state(&self) -> f32 {
        self.elapsed_in_state
    }

    pub fn status(&self) -> ShooterStatus {
        ShooterStatus {
            state: self.state,
            flywheel_power: self.target_flywheel_power,
            pusher: self.pusher,
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn fire(&mut self, event: ShooterEvent) -> bool {
        match on_event(self.state, event) {
            Some(next) => {
                self.enter(next);
                self.entered_between_ticks = true;
                true
            }
            None => {
                debug!("{}: {:?} rejected in {}", NAME, event, self.state);
                false
            }
        }
    }

    fn enter(&mut self, next: ShooterState) {
        info!("{}: {} -> {}", NAME, self.state, next);
        self.state = next;
        // Overshoot past a timed limit is dropped, not carried into `next`.
        self.elapsed_in_state = 0.0;

        let action = entry_action(next);
        if action.power == PowerAction::Zero {
            self.target_flywheel_power = 0.0;
        }
        if let Some(pos) = action.pusher {
            self.pusher = pos;
        }
    }

    fn pusher_angle(&self, pos: PusherPosition) -> f32 {
        match pos {
            PusherPosition::Idle => self.config.reload_idle_deg,
            PusherPosition::Load => self.config.reload_load_deg,
        }
    }

    fn reset_logical_state(&mut self) {
        self.state = ShooterState::Idle;
        self.elapsed_in_state = 0.0;
        self.entered_between_ticks = false;
        self.target_flywheel_power = 0.0;
        self.pusher = PusherPosition::Idle;
    }
}

impl Subsystem for Shooter {
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
        let hz = self.config.motor_pwm_hz;
        let motor_a = FlywheelMotor::acquire(hw, self.motor_a_pins.0, self.motor_a_pins.1, hz)?;
        let motor_b = FlywheelMotor::acquire(hw, self.motor_b_pins.0, self.motor_b_pins.1, hz)?;
        let mut pusher = hw.servo_output(self.reload_pin, &self.config.reload_servo)?;
        pusher.set_angle(self.config.reload_idle_deg)?;

        self.io = Some(ShooterOutputs {
            motor_a,
            motor_b,
            pusher,
        });
        self.reset_logical_state();
        self.timer.reset();
        self.phase = Phase::Running;
        info!(
            "{}: flywheels {:?}/{:?}, pusher GPIO {}",
            NAME, self.motor_a_pins, self.motor_b_pins, self.reload_pin
        );
        Ok(())
    }

    fn periodic(&mut self, dt: f32) -> Result<()> {
        if self.io.is_none() {
            return Err(Error::NotRunning(NAME));
        }

        if std::mem::take(&mut self.entered_between_ticks) {
            debug!("{}: {} entered since last tick, {:.3} s not counted", NAME, self.state, dt);
        } else {
            self.elapsed_in_state += dt.max(0.0);
        }
        if let Some(next) = on_timeout(self.state, self.elapsed_in_state, &self.timing) {
            self.enter(next);
        }

        let power = self.target_flywheel_power;
        let angle = self.pusher_angle(self.pusher);
        let io = self.io.as_mut().ok_or(Error::NotRunning(NAME))?;
        io.motor_a.set_power(power)?;
        io.motor_b.set_power(power)?;
        io.pusher.set_angle(angle)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.phase = Phase::ShutDown;
        info!("{}: shutting down from {}", NAME, self.state);
        let idle = self.config.reload_idle_deg;
        self.reset_logical_state();

        // Every output gets its safe write even if an earlier one fails.
        release(self.io.take(), NAME, |io| {
            let results: [core::result::Result<(), HwError>; 3] = [
                io.motor_a.stop(),
                io.motor_b.stop(),
                io.pusher.set_angle(idle),
            ];
            results.into_iter().find(|r| r.is_err()).unwrap_or(Ok(()))
        })
    }

    fn tick_timer(&mut self) -> &mut TickTimer {
        &mut self.timer
    }
}

impl Drop for Shooter {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
