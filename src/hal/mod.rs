//! Hardware capability layer.
//!
//! Subsystems never name a concrete pin driver.  They ask a
//! [`HardwareProvider`] for *capabilities* at `initialize` time and keep
//! the boxed handles until `shutdown`:
//!
//! ```text
//!   Subsystem ──▶ HardwareProvider ──▶ Box<dyn DigitalOutput>
//!                                 ├──▶ Box<dyn PwmOutput>
//!                                 ├──▶ Box<dyn ServoOutput>
//!                                 └──▶ Box<dyn PulseTrain>
//! ```
//!
//! Any `embedded_hal` output pin or PWM channel is already a capability via
//! the blanket impls below, so a board backend only has to implement
//! [`HardwareProvider`] over its own embedded-hal types.  [`sim`] provides
//! the in-memory backend used by the binary's simulation mode and by tests.

pub mod motor;
pub mod pulse;
pub mod servo;
pub mod sim;

use core::time::Duration;

use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::pwm::{Error as _, SetDutyCycle};

use crate::config::ServoConfig;
use crate::error::HwError;

pub use servo::{PwmServo, ServoOutput};

// ───────────────────────────────────────────────────────────────
// Output capabilities
// ───────────────────────────────────────────────────────────────

/// A single push-pull digital output.
pub trait DigitalOutput: Send {
    fn set(&mut self, high: bool) -> Result<(), HwError>;
}

impl<T> DigitalOutput for T
where
    T: OutputPin + Send,
{
    fn set(&mut self, high: bool) -> Result<(), HwError> {
        let res = if high { self.set_high() } else { self.set_low() };
        res.map_err(|e| {
            log::debug!("digital write failed: {:?}", e.kind());
            HwError::DigitalWrite
        })
    }
}

/// A PWM channel driven by duty fraction.
pub trait PwmOutput: Send {
    /// Set the duty cycle as a fraction in `[0, 1]`.  Out-of-range and
    /// non-finite values are clamped (NaN → 0).
    fn set_duty(&mut self, fraction: f32) -> Result<(), HwError>;
}

impl<T> PwmOutput for T
where
    T: SetDutyCycle + Send,
{
    fn set_duty(&mut self, fraction: f32) -> Result<(), HwError> {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let duty = (fraction * f32::from(self.max_duty_cycle())).round() as u16;
        self.set_duty_cycle(duty).map_err(|e| {
            log::debug!("PWM write failed: {:?}", e.kind());
            HwError::PwmWrite
        })
    }
}

/// Asynchronous step pulse generator.
///
/// `start` returns immediately; the pulses are produced by hardware or a
/// background worker.  The owner polls [`is_done`](Self::is_done) on later
/// ticks instead of waiting.  At most one train may be in flight.
pub trait PulseTrain: Send {
    /// Begin emitting `count` pulses of `high` on-time and `low` off-time.
    /// Fails if a previous train is still running.
    fn start(&mut self, count: u32, high: Duration, low: Duration) -> Result<(), HwError>;

    /// `true` once the most recent train has emitted every pulse (or when
    /// no train was ever started).
    fn is_done(&mut self) -> bool;

    /// Stop the current train as soon as possible and return how many
    /// pulses of it were actually emitted.
    fn halt(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Provider (dependency-injected pin factory)
// ───────────────────────────────────────────────────────────────

/// Hands out output capabilities by pin number.
///
/// Implementations must refuse to hand out the same pin twice
/// ([`HwError::PinInUse`]).  Dropping a capability releases its pin.
pub trait HardwareProvider {
    fn digital_output(
        &mut self,
        pin: u8,
        initial_high: bool,
    ) -> Result<Box<dyn DigitalOutput>, HwError>;

    fn pwm_output(&mut self, pin: u8, frequency_hz: u32) -> Result<Box<dyn PwmOutput>, HwError>;

    fn pulse_train(&mut self, pin: u8) -> Result<Box<dyn PulseTrain>, HwError>;

    /// Servo on a PWM pin.  Backends with a native servo driver may
    /// override this.
    fn servo_output(
        &mut self,
        pin: u8,
        config: &ServoConfig,
    ) -> Result<Box<dyn ServoOutput>, HwError> {
        let pwm = self.pwm_output(pin, config.frame_hz)?;
        Ok(Box::new(PwmServo::new(pwm, config)))
    }
}
