//! Fixed-rate control loop.
//!
//! ```text
//!   ┌─────────────────────────── one period ───────────────────────────┐
//!   │ drain ≤16 commands ─▶ turret.tick(now) ─▶ sleep to next deadline │
//!   └──────────────────────────────────────────────────────────────────┘
//!        ▲                                                        │
//!        └────────────── while running && tick is Ok ─────────────┘
//!                                   │
//!                                   ▼
//!                          turret.shutdown()  (always)
//! ```
//!
//! Commands are applied on the control thread between ticks, never during
//! one.  A hardware error inside a tick stops the loop; shutdown still runs.

pub mod pacer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use log::{error, info, warn};

use crate::adapters::command_link::CommandInbox;
use crate::adapters::time::MonotonicClock;
use crate::app::service::Turret;
use crate::error::Result;

pub use pacer::Pacer;

/// Upper bound on commands applied between two ticks.  Anything beyond
/// waits for the next gap so a flood cannot stall the loop.
pub const MAX_COMMANDS_PER_TICK: usize = 16;

pub struct ControlLoop {
    turret: Turret,
    inbox: CommandInbox,
    rate_hz: f32,
    running: Arc<AtomicBool>,
    clock: MonotonicClock,
}

impl ControlLoop {
    /// `turret` should already be initialised.
    pub fn new(turret: Turret, inbox: CommandInbox, rate_hz: f32) -> Self {
        Self {
            turret,
            inbox,
            rate_hz,
            running: Arc::new(AtomicBool::new(true)),
            clock: MonotonicClock::new(),
        }
    }

    /// Flag that keeps [`run`](Self::run) going; clear it to stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn turret(&self) -> &Turret {
        &self.turret
    }

    pub fn turret_mut(&mut self) -> &mut Turret {
        &mut self.turret
    }

    /// Apply pending commands, answering each on its reply channel.
    pub fn drain_commands(&mut self) -> usize {
        let mut handled = 0;
        while handled < MAX_COMMANDS_PER_TICK {
            let Some(req) = self.inbox.try_next() else {
                break;
            };
            let reply = self.turret.handle_line(req.line());
            req.respond(reply);
            handled += 1;
        }
        handled
    }

    /// One period's work at `now`, without sleeping.
    pub fn step(&mut self, now: Instant) -> Result<()> {
        self.drain_commands();
        self.turret.tick(now)
    }

    /// Run at the configured rate until the running flag clears or a tick
    /// fails, then shut the turret down.  Returns the tick error, if any.
    pub fn run(&mut self) -> Result<()> {
        let mut pacer = Pacer::from_rate(self.rate_hz, self.clock.now());
        info!("control loop running at {:.1} Hz ({:?} period)", self.rate_hz, pacer.period());

        let mut outcome = Ok(());
        while self.running.load(Ordering::Acquire) {
            if let Err(e) = self.step(self.clock.now()) {
                error!("control loop: tick failed: {}", e);
                outcome = Err(e);
                break;
            }
            let sleep = pacer.wait(self.clock.now());
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
        }
        self.running.store(false, Ordering::Release);

        info!(
            "control loop stopping after {} ticks ({} overruns, up {} s)",
            self.turret.tick_count(),
            pacer.overruns(),
            self.clock.uptime_secs()
        );
        let failures = self.turret.shutdown();
        if failures > 0 {
            warn!("control loop: {} subsystem(s) failed to shut down cleanly", failures);
        }
        outcome
    }
}
