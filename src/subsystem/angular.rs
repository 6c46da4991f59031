//! Direct-drive angular actuator (pitch, and the servo yaw variant).
//!
//! No velocity limiting: the servo has its own positioning loop, so every
//! tick simply writes the target.  The write is repeated even when the
//! target is unchanged to keep the output refreshed.

use log::{info, warn};

use crate::config::ServoConfig;
use crate::error::{Error, Result};
use crate::hal::{HardwareProvider, ServoOutput};

use super::{Phase, Subsystem, TickTimer, clamp_setpoint, release};

pub struct AngularActuator {
    name: &'static str,
    pin: u8,
    config: ServoConfig,
    servo: Option<Box<dyn ServoOutput>>,
    phase: Phase,
    timer: TickTimer,
    current_angle: f32,
    target_angle: f32,
}

impl AngularActuator {
    pub fn new(name: &'static str, pin: u8, config: &ServoConfig) -> Self {
        let neutral = neutral_of(config);
        Self {
            name,
            pin,
            config: config.clone(),
            servo: None,
            phase: Phase::Uninitialized,
            timer: TickTimer::new(),
            current_angle: neutral,
            target_angle: neutral,
        }
    }

    /// Clamp `deg` into range and store it as the target.  Takes effect on
    /// the next tick.
    pub fn set_target_angle(&mut self, deg: f32) {
        match clamp_setpoint(deg, self.config.min_deg, self.config.max_deg) {
            Some(deg) => self.target_angle = deg,
            None => warn!("{}: ignoring NaN target", self.name),
        }
    }

    pub fn target_angle(&self) -> f32 {
        self.target_angle
    }

    pub fn current_angle(&self) -> f32 {
        self.current_angle
    }

    /// Angle held at startup and shutdown: 0° pulled into range.
    pub fn neutral_angle(&self) -> f32 {
        neutral_of(&self.config)
    }

    pub fn range(&self) -> (f32, f32) {
        (self.config.min_deg, self.config.max_deg)
    }
}

fn neutral_of(config: &ServoConfig) -> f32 {
    0.0_f32.max(config.min_deg).min(config.max_deg)
}

impl Subsystem for AngularActuator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn initialize(&mut self, hw: &mut dyn HardwareProvider) -> Result<()> {
        if self.phase == Phase::Running {
            return Ok(());
        }
        let neutral = self.neutral_angle();
        let mut servo = hw.servo_output(self.pin, &self.config)?;
        servo.set_angle(neutral)?;

        self.servo = Some(servo);
        self.current_angle = neutral;
        self.target_angle = neutral;
        self.timer.reset();
        self.phase = Phase::Running;
        info!("{}: servo on GPIO {} at {:.1}°", self.name, self.pin, neutral);
        Ok(())
    }

    fn periodic(&mut self, _dt: f32) -> Result<()> {
        let servo = self.servo.as_mut().ok_or(Error::NotRunning(self.name))?;
        self.current_angle = self.target_angle;
        servo.set_angle(self.current_angle)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.phase = Phase::ShutDown;
        let neutral = self.neutral_angle();
        self.current_angle = neutral;
        self.target_angle = neutral;
        info!("{}: shutting down", self.name);
        release(self.servo.take(), self.name, |servo| servo.set_angle(neutral))
    }

    fn tick_timer(&mut self) -> &mut TickTimer {
        &mut self.timer
    }
}

impl Drop for AngularActuator {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
