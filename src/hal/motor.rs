//! Flywheel motor driver (L298N-style H-bridge).
//!
//! Forward-only speed control: PWM on the forward input, backward input
//! held low.  The flywheels never run in reverse.

use crate::error::HwError;

use super::{DigitalOutput, HardwareProvider, PwmOutput};

pub struct FlywheelMotor {
    forward: Box<dyn PwmOutput>,
    backward: Box<dyn DigitalOutput>,
    power: f32,
}

impl FlywheelMotor {
    /// Claim both bridge inputs.  The motor starts stopped.
    pub fn acquire(
        hw: &mut dyn HardwareProvider,
        forward_pin: u8,
        backward_pin: u8,
        pwm_hz: u32,
    ) -> Result<Self, HwError> {
        let forward = hw.pwm_output(forward_pin, pwm_hz)?;
        let backward = hw.digital_output(backward_pin, false)?;
        let mut motor = Self {
            forward,
            backward,
            power: 0.0,
        };
        motor.stop()?;
        Ok(motor)
    }

    /// Drive at `power` in `[0, 1]` (clamped).
    pub fn set_power(&mut self, power: f32) -> Result<(), HwError> {
        let power = if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) };
        self.backward.set(false)?;
        self.forward.set_duty(power)?;
        self.power = power;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), HwError> {
        self.set_power(0.0)
    }

    pub fn power(&self) -> f32 {
        self.power
    }
}
