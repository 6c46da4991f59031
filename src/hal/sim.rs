//! In-memory hardware backend.
//!
//! Every output handed out by [`SimHardware`] records what was written to it
//! in a shared [`SimProbe`], so tests (and the simulation binary's logs) can
//! observe pin levels, duty cycles, emitted step pulses and whether the
//! output has been released.  Dropping an output marks its probe released
//! and frees the pin for re-acquisition.
//!
//! Step pulse trains come in three flavours ([`PulseMode`]):
//!
//! | Mode       | Completion                                    |
//! |------------|-----------------------------------------------|
//! | `Threaded` | real [`ThreadPulseTrain`] on a simulated pin   |
//! | `Instant`  | on the first `is_done` poll after `start`     |
//! | `Manual`   | only after [`SimProbe::complete_train`]        |

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::debug;

use crate::error::HwError;

use super::pulse::ThreadPulseTrain;
use super::{DigitalOutput, HardwareProvider, PulseTrain, PwmOutput};

/// Resolution of the simulated PWM counter.
const SIM_PWM_MAX: u16 = 10_000;

// ───────────────────────────────────────────────────────────────
// Probe
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ProbeState {
    level: bool,
    duty: f32,
    writes: u64,
    rising_edges: u64,
    released: bool,
    fail_writes: bool,
    trains_started: u32,
    train_complete: bool,
}

/// Observation handle shared with one simulated output.
#[derive(Debug, Clone, Default)]
pub struct SimProbe(Arc<Mutex<ProbeState>>);

impl SimProbe {
    fn state(&self) -> MutexGuard<'_, ProbeState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current digital level (`true` = high).
    pub fn level(&self) -> bool {
        self.state().level
    }

    /// Current PWM duty fraction.
    pub fn duty(&self) -> f32 {
        self.state().duty
    }

    /// Total number of writes (digital or PWM).
    pub fn writes(&self) -> u64 {
        self.state().writes
    }

    /// Low→high transitions seen on a digital output; for pulse trains,
    /// the number of step pulses emitted.
    pub fn rising_edges(&self) -> u64 {
        self.state().rising_edges
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    /// Number of pulse trains started on this pin.
    pub fn trains_started(&self) -> u32 {
        self.state().trains_started
    }

    /// Make every subsequent write on this output fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Let the in-flight manual pulse train finish.
    pub fn complete_train(&self) {
        self.state().train_complete = true;
    }

    fn release(&self) {
        self.state().released = true;
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated embedded-hal outputs
// ───────────────────────────────────────────────────────────────

/// Injected write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFault;

impl digital::Error for SimFault {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl pwm::Error for SimFault {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// Simulated GPIO output.
#[derive(Debug)]
pub struct SimPin {
    pin: u8,
    probe: SimProbe,
}

impl SimPin {
    fn write(&mut self, high: bool) -> Result<(), SimFault> {
        let mut s = self.probe.state();
        if s.fail_writes {
            return Err(SimFault);
        }
        if high && !s.level {
            s.rising_edges += 1;
        }
        s.level = high;
        s.writes += 1;
        Ok(())
    }
}

impl digital::ErrorType for SimPin {
    type Error = SimFault;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

impl Drop for SimPin {
    fn drop(&mut self) {
        debug!("sim: GPIO {} released", self.pin);
        self.probe.release();
    }
}

/// Simulated PWM channel.
#[derive(Debug)]
pub struct SimPwm {
    pin: u8,
    probe: SimProbe,
}

impl pwm::ErrorType for SimPwm {
    type Error = SimFault;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        SIM_PWM_MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let mut s = self.probe.state();
        if s.fail_writes {
            return Err(SimFault);
        }
        s.duty = f32::from(duty.min(SIM_PWM_MAX)) / f32::from(SIM_PWM_MAX);
        s.writes += 1;
        Ok(())
    }
}

impl Drop for SimPwm {
    fn drop(&mut self) {
        debug!("sim: PWM {} released", self.pin);
        self.probe.release();
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated pulse trains
// ───────────────────────────────────────────────────────────────

/// How simulated pulse trains complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseMode {
    Threaded,
    Instant,
    Manual,
}

struct SimPulseTrain {
    pin: u8,
    probe: SimProbe,
    manual: bool,
    pending: Option<u32>,
    last_emitted: u32,
}

impl PulseTrain for SimPulseTrain {
    fn start(&mut self, count: u32, _high: Duration, _low: Duration) -> Result<(), HwError> {
        if self.pending.is_some() && !self.is_done() {
            return Err(HwError::PulseTrain);
        }
        let mut s = self.probe.state();
        if s.fail_writes {
            return Err(HwError::PulseTrain);
        }
        s.trains_started += 1;
        s.train_complete = false;
        drop(s);
        self.pending = Some(count);
        Ok(())
    }

    fn is_done(&mut self) -> bool {
        let Some(count) = self.pending else {
            return true;
        };
        let mut s = self.probe.state();
        if self.manual && !s.train_complete {
            return false;
        }
        s.train_complete = false;
        s.rising_edges += u64::from(count);
        s.writes += 2 * u64::from(count);
        drop(s);
        self.pending = None;
        self.last_emitted = count;
        true
    }

    fn halt(&mut self) -> u32 {
        if self.is_done() {
            return self.last_emitted;
        }
        // A manual train that was never completed emitted nothing.
        self.pending = None;
        self.last_emitted = 0;
        0
    }
}

impl Drop for SimPulseTrain {
    fn drop(&mut self) {
        debug!("sim: step pin {} released", self.pin);
        self.probe.release();
    }
}

// ───────────────────────────────────────────────────────────────
// Provider
// ───────────────────────────────────────────────────────────────

/// In-memory [`HardwareProvider`].
pub struct SimHardware {
    probes: HashMap<u8, SimProbe>,
    pulses: PulseMode,
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHardware {
    /// Threaded pulse trains (real timing).  Used by the binary.
    pub fn new() -> Self {
        Self::with_pulse_mode(PulseMode::Threaded)
    }

    /// Pulse trains finish on the first poll.
    pub fn instant() -> Self {
        Self::with_pulse_mode(PulseMode::Instant)
    }

    /// Pulse trains finish only when the test says so.
    pub fn manual() -> Self {
        Self::with_pulse_mode(PulseMode::Manual)
    }

    pub fn with_pulse_mode(pulses: PulseMode) -> Self {
        Self {
            probes: HashMap::new(),
            pulses,
        }
    }

    /// Probe of the most recent output claimed on `pin`.
    pub fn probe(&self, pin: u8) -> Option<SimProbe> {
        self.probes.get(&pin).cloned()
    }

    /// Mark `pin` as owned by something outside the turret.
    pub fn reserve(&mut self, pin: u8) {
        self.probes.insert(pin, SimProbe::default());
    }

    /// A simulated pin that is not tracked by any provider.
    pub fn detached_pin(pin: u8) -> (SimPin, SimProbe) {
        let probe = SimProbe::default();
        (
            SimPin {
                pin,
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn claim(&mut self, pin: u8, kind: &str) -> Result<SimProbe, HwError> {
        if self.probes.get(&pin).is_some_and(|p| !p.is_released()) {
            return Err(HwError::PinInUse(pin));
        }
        let probe = SimProbe::default();
        self.probes.insert(pin, probe.clone());
        debug!("sim: GPIO {} claimed as {}", pin, kind);
        Ok(probe)
    }
}

impl HardwareProvider for SimHardware {
    fn digital_output(
        &mut self,
        pin: u8,
        initial_high: bool,
    ) -> Result<Box<dyn DigitalOutput>, HwError> {
        let probe = self.claim(pin, "digital output")?;
        let mut out = SimPin { pin, probe };
        DigitalOutput::set(&mut out, initial_high)?;
        Ok(Box::new(out))
    }

    fn pwm_output(&mut self, pin: u8, frequency_hz: u32) -> Result<Box<dyn PwmOutput>, HwError> {
        if frequency_hz == 0 {
            return Err(HwError::Unavailable("0 Hz PWM"));
        }
        let probe = self.claim(pin, "PWM output")?;
        Ok(Box::new(SimPwm { pin, probe }))
    }

    fn pulse_train(&mut self, pin: u8) -> Result<Box<dyn PulseTrain>, HwError> {
        let probe = self.claim(pin, "step pulse train")?;
        Ok(match self.pulses {
            PulseMode::Threaded => Box::new(ThreadPulseTrain::new(SimPin { pin, probe })),
            mode => Box::new(SimPulseTrain {
                pin,
                probe,
                manual: mode == PulseMode::Manual,
                pending: None,
                last_emitted: 0,
            }),
        })
    }
}
