//! Periodic subsystem lifecycle.
//!
//! Every actuator in the turret follows the same three-phase contract:
//!
//! ```text
//!   Uninitialized ──initialize(hw)──▶ Running ──shutdown()──▶ ShutDown
//!                                      │    ▲
//!                                      └────┘ periodic(dt)
//! ```
//!
//! * `initialize` claims outputs from a [`HardwareProvider`] and writes a
//!   safe default.  Failure is fatal and not retried.
//! * `periodic(dt)` advances one control step.  `dt` is the measured time
//!   since the previous step (0 on the first), never a nominal period.
//! * `shutdown` forces safe outputs and then releases them.  Release
//!   happens even if the safe-state write fails; a second call is a no-op.

pub mod angular;
pub mod stepper;

use std::time::Instant;

use log::{debug, warn};

use crate::error::{HwError, Result};
use crate::hal::HardwareProvider;

pub use angular::AngularActuator;
pub use stepper::{Direction, StepperAxis};

// ───────────────────────────────────────────────────────────────
// Phase
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Running,
    ShutDown,
}

// ───────────────────────────────────────────────────────────────
// Elapsed-time helper
// ───────────────────────────────────────────────────────────────

/// Turns monotonic instants into per-tick elapsed seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickTimer {
    last: Option<Instant>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous call.  The first call returns 0 so a
    /// subsystem never sees the time spent before the loop started.
    /// An instant earlier than the previous one yields 0.
    pub fn elapsed(&mut self, now: Instant) -> f32 {
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(match self.last {
            Some(last) if last > now => last,
            _ => now,
        });
        dt
    }

    /// Forget the previous instant; the next call returns 0 again.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ───────────────────────────────────────────────────────────────
// Contract
// ───────────────────────────────────────────────────────────────

pub trait Subsystem {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn phase(&self) -> Phase;

    fn initialize(&mut self, hw: &mut dyn HardwareProvider) -> Result<()>;

    /// One control step of `dt` seconds.  Fails with
    /// [`Error::NotRunning`](crate::error::Error::NotRunning) outside the
    /// `Running` phase; any hardware error is fatal to the loop.
    fn periodic(&mut self, dt: f32) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;

    fn tick_timer(&mut self) -> &mut TickTimer;

    /// Measure elapsed time against `now` and run [`periodic`](Self::periodic).
    fn tick(&mut self, now: Instant) -> Result<()> {
        let dt = self.tick_timer().elapsed(now);
        self.periodic(dt)
    }
}

// ───────────────────────────────────────────────────────────────
// Shared helpers
// ───────────────────────────────────────────────────────────────

/// Drive `outputs` to a safe state with `safe`, then drop them.
///
/// The outputs are dropped (and their pins released) whether or not `safe`
/// succeeds, including on unwind.  A missing set of outputs is a no-op.
pub(crate) fn release<T>(
    outputs: Option<T>,
    name: &'static str,
    safe: impl FnOnce(&mut T) -> core::result::Result<(), HwError>,
) -> Result<()> {
    let Some(mut outputs) = outputs else {
        return Ok(());
    };
    let result = safe(&mut outputs);
    drop(outputs);
    match result {
        Ok(()) => {
            debug!("{}: outputs safe and released", name);
            Ok(())
        }
        Err(e) => {
            warn!("{}: safe-state write failed ({}), outputs released anyway", name, e);
            Err(e.into())
        }
    }
}

/// Clamp a setpoint into `[min, max]`.  NaN has no meaningful clamp and is
/// refused; infinities land on the nearest limit.
pub(crate) fn clamp_setpoint(value: f32, min: f32, max: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.max(min).min(max))
    }
}
