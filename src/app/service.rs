//! Turret service: owns every subsystem and applies operator commands.
//!
//! ```text
//!  Command ──▶ ┌──────────────────────────────┐
//!              │           Turret             │ ──tick(now)──▶ yaw → pitch → shooter
//!  reply   ◀── │  yaw axis · pitch · shooter  │
//!              └──────────────────────────────┘
//! ```
//!
//! Commands only write setpoints; outputs move on the next tick.  The
//! service never ticks from inside `apply`, so a command can never overlap
//! a `periodic` call.

use std::time::Instant;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::{TurretConfig, YawDrive};
use crate::error::Result;
use crate::hal::HardwareProvider;
use crate::shooter::{PusherPosition, Shooter, ShooterState};
use crate::subsystem::{AngularActuator, StepperAxis, Subsystem};

use super::commands::Command;

// ───────────────────────────────────────────────────────────────
// Yaw axis variants
// ───────────────────────────────────────────────────────────────

/// The yaw axis is either the velocity-limited stepper or a direct-drive
/// servo, selected by [`YawDrive`].
pub enum YawAxis {
    Stepper(StepperAxis),
    Servo(AngularActuator),
}

impl YawAxis {
    fn from_config(config: &TurretConfig) -> Self {
        match config.control.yaw_drive {
            YawDrive::Stepper => Self::Stepper(StepperAxis::new(&config.pins, &config.stepper)),
            YawDrive::Servo => {
                Self::Servo(AngularActuator::new("yaw", config.pins.yaw_servo, &config.yaw_servo))
            }
        }
    }

    pub fn set_target_angle(&mut self, deg: f32) {
        match self {
            Self::Stepper(s) => s.set_target_angle(deg),
            Self::Servo(s) => s.set_target_angle(deg),
        }
    }

    pub fn target_angle(&self) -> f32 {
        match self {
            Self::Stepper(s) => s.target_angle(),
            Self::Servo(s) => s.target_angle(),
        }
    }

    pub fn current_angle(&self) -> f32 {
        match self {
            Self::Stepper(s) => s.current_angle(),
            Self::Servo(s) => s.current_angle(),
        }
    }

    fn drive(&self) -> YawDrive {
        match self {
            Self::Stepper(_) => YawDrive::Stepper,
            Self::Servo(_) => YawDrive::Servo,
        }
    }

    fn subsystem(&mut self) -> &mut dyn Subsystem {
        match self {
            Self::Stepper(s) => s,
            Self::Servo(s) => s,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TurretStatus {
    pub ok: bool,
    pub state: ShooterState,
    pub flywheel_power: f32,
    pub pusher: PusherPosition,
    pub yaw_drive: YawDrive,
    pub yaw: f32,
    pub yaw_target: f32,
    pub pitch: f32,
    pub pitch_target: f32,
}

// ───────────────────────────────────────────────────────────────
// Turret
// ───────────────────────────────────────────────────────────────

pub struct Turret {
    yaw: YawAxis,
    pitch: AngularActuator,
    shooter: Shooter,
    ticks: u64,
}

impl Turret {
    /// Build every subsystem from configuration.  Nothing touches hardware
    /// until [`initialize`](Self::initialize).
    pub fn new(config: &TurretConfig) -> Self {
        Self {
            yaw: YawAxis::from_config(config),
            pitch: AngularActuator::new("pitch", config.pins.pitch_servo, &config.pitch),
            shooter: Shooter::new(&config.pins, &config.shooter),
            ticks: 0,
        }
    }

    /// Subsystems in tick order.
    fn subsystems(&mut self) -> [&mut dyn Subsystem; 3] {
        [self.yaw.subsystem(), &mut self.pitch, &mut self.shooter]
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise every subsystem.  All or nothing: if one fails, those
    /// already running are shut down again before the error is returned.
    pub fn initialize(&mut self, hw: &mut dyn HardwareProvider) -> Result<()> {
        let mut failure = None;
        for sub in self.subsystems() {
            if let Err(e) = sub.initialize(hw) {
                error!("{}: initialisation failed: {}", sub.name(), e);
                failure = Some(e);
                break;
            }
        }
        if let Some(e) = failure {
            self.shutdown();
            return Err(e);
        }
        info!("turret ready ({:?} yaw)", self.yaw.drive());
        Ok(())
    }

    /// One control step for every subsystem, in order yaw → pitch → shooter.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        self.ticks = self.ticks.wrapping_add(1);
        for sub in self.subsystems() {
            sub.tick(now)?;
        }
        Ok(())
    }

    /// Shut every subsystem down.  Each one is attempted even if an earlier
    /// one failed; failures are logged and counted.
    pub fn shutdown(&mut self) -> usize {
        let mut failures = 0;
        for sub in self.subsystems() {
            if let Err(e) = sub.shutdown() {
                error!("{}: shutdown failed: {}", sub.name(), e);
                failures += 1;
            }
        }
        if failures == 0 {
            info!("turret shut down");
        } else {
            warn!("turret shut down with {} failure(s)", failures);
        }
        failures
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn yaw(&self) -> &YawAxis {
        &self.yaw
    }

    pub fn yaw_mut(&mut self) -> &mut YawAxis {
        &mut self.yaw
    }

    pub fn pitch(&self) -> &AngularActuator {
        &self.pitch
    }

    pub fn shooter(&self) -> &Shooter {
        &self.shooter
    }

    pub fn shooter_mut(&mut self) -> &mut Shooter {
        &mut self.shooter
    }

    /// Control ticks run since construction.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn status(&self) -> TurretStatus {
        let shooter = self.shooter.status();
        TurretStatus {
            ok: true,
            state: shooter.state,
            flywheel_power: shooter.flywheel_power,
            pusher: shooter.pusher,
            yaw_drive: self.yaw.drive(),
            yaw: self.yaw.current_angle(),
            yaw_target: self.yaw.target_angle(),
            pitch: self.pitch.current_angle(),
            pitch_target: self.pitch.target_angle(),
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Parse and apply one command line, returning the reply line.
    pub fn handle_line(&mut self, line: &str) -> String {
        match Command::parse(line) {
            Ok(cmd) => self.apply(cmd),
            Err(e) => {
                warn!("cmd: rejected {:?}: {}", line.trim(), e);
                e.to_string()
            }
        }
    }

    /// Apply a parsed command.  Only setpoints change here.
    pub fn apply(&mut self, cmd: Command) -> String {
        debug!("cmd: {:?}", cmd);
        match cmd {
            Command::Yaw(deg) => {
                self.yaw.set_target_angle(deg);
                format!("OK: yaw={:.2}", self.yaw.target_angle())
            }
            Command::Tilt(deg) => {
                self.pitch.set_target_angle(deg);
                format!("OK: tilt={:.2}", self.pitch.target_angle())
            }
            Command::Shoot(power) => {
                if self.shooter.shoot(power) {
                    format!("OK: shoot power={:.2}", self.shooter.target_flywheel_power())
                } else {
                    format!("ERR: shooter busy ({})", self.shooter.state())
                }
            }
            Command::Flywheel(power) => {
                self.shooter.set_flywheel_power(power);
                format!("OK: flywheel power={:.2}", self.shooter.target_flywheel_power())
            }
            Command::Reload => {
                if self.shooter.push() {
                    "OK: reload".to_string()
                } else {
                    format!("ERR: cannot reload ({})", self.shooter.state())
                }
            }
            Command::Retract => {
                if self.shooter.retract() {
                    "OK: retract".to_string()
                } else {
                    format!("ERR: cannot retract ({})", self.shooter.state())
                }
            }
            Command::Enable(on) => match &mut self.yaw {
                YawAxis::Stepper(s) => match s.set_enabled(on) {
                    Ok(()) => format!("OK: enable={}", u8::from(on)),
                    Err(e) => format!("ERR: {e}"),
                },
                YawAxis::Servo(_) => "ERR: servo yaw has no enable line".to_string(),
            },
            Command::Status => match serde_json::to_string(&self.status()) {
                Ok(json) => json,
                Err(e) => format!("ERR: {e}"),
            },
        }
    }
}
