//! Call-recording hardware backend built from plain embedded-hal pins.
//!
//! Unlike `SimHardware` this lives outside the crate, so it only reaches
//! the turret through the public `HardwareProvider` trait and the blanket
//! embedded-hal impls.  Every write and release is appended to one shared
//! log so tests can check ordering across outputs.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use turret::error::HwError;
use turret::hal::{DigitalOutput, HardwareProvider, PulseTrain, PwmOutput};

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Level(u8, bool),
    Duty(u8, u16),
    Pulses(u8, u32),
    Release(u8),
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<HwCall>>>);

impl CallLog {
    fn push(&self, call: HwCall) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Last duty written to `pin`.
    pub fn last_duty(&self, pin: u8) -> Option<u16> {
        self.calls().iter().rev().find_map(|c| match c {
            HwCall::Duty(p, d) if *p == pin => Some(*d),
            _ => None,
        })
    }

    /// Last level written to `pin`.
    pub fn last_level(&self, pin: u8) -> Option<bool> {
        self.calls().iter().rev().find_map(|c| match c {
            HwCall::Level(p, l) if *p == pin => Some(*l),
            _ => None,
        })
    }

    pub fn released(&self, pin: u8) -> bool {
        self.calls().contains(&HwCall::Release(pin))
    }
}

// ── embedded-hal pins ─────────────────────────────────────────

pub struct MockPin {
    pin: u8,
    log: CallLog,
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.push(HwCall::Level(self.pin, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.push(HwCall::Level(self.pin, true));
        Ok(())
    }
}

impl Drop for MockPin {
    fn drop(&mut self) {
        self.log.push(HwCall::Release(self.pin));
    }
}

pub struct MockPwm {
    pin: u8,
    log: CallLog,
}

pub const PWM_MAX: u16 = 1_000;

impl pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        PWM_MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.log.push(HwCall::Duty(self.pin, duty));
        Ok(())
    }
}

impl Drop for MockPwm {
    fn drop(&mut self) {
        self.log.push(HwCall::Release(self.pin));
    }
}

/// Pulse train that finishes instantly.
struct MockPulses {
    pin: u8,
    log: CallLog,
    last: u32,
}

impl PulseTrain for MockPulses {
    fn start(&mut self, count: u32, _high: Duration, _low: Duration) -> Result<(), HwError> {
        self.log.push(HwCall::Pulses(self.pin, count));
        self.last = count;
        Ok(())
    }

    fn is_done(&mut self) -> bool {
        true
    }

    fn halt(&mut self) -> u32 {
        self.last
    }
}

impl Drop for MockPulses {
    fn drop(&mut self) {
        self.log.push(HwCall::Release(self.pin));
    }
}

// ── Provider ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub log: CallLog,
    claimed: HashSet<u8>,
    /// Pins whose acquisition fails with `Unavailable`.
    pub broken: HashSet<u8>,
}

impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, pin: u8) -> Result<(), HwError> {
        if self.broken.contains(&pin) {
            return Err(HwError::Unavailable("mock pin"));
        }
        if !self.claimed.insert(pin) {
            return Err(HwError::PinInUse(pin));
        }
        Ok(())
    }
}

impl HardwareProvider for MockHardware {
    fn digital_output(
        &mut self,
        pin: u8,
        initial_high: bool,
    ) -> Result<Box<dyn DigitalOutput>, HwError> {
        self.claim(pin)?;
        let mut out = MockPin {
            pin,
            log: self.log.clone(),
        };
        out.set(initial_high)?;
        Ok(Box::new(out))
    }

    fn pwm_output(&mut self, pin: u8, _frequency_hz: u32) -> Result<Box<dyn PwmOutput>, HwError> {
        self.claim(pin)?;
        Ok(Box::new(MockPwm {
            pin,
            log: self.log.clone(),
        }))
    }

    fn pulse_train(&mut self, pin: u8) -> Result<Box<dyn PulseTrain>, HwError> {
        self.claim(pin)?;
        Ok(Box::new(MockPulses {
            pin,
            log: self.log.clone(),
            last: 0,
        }))
    }
}
