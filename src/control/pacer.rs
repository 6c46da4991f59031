//! Fixed-rate deadline pacing.
//!
//! Deadlines advance by exactly one period per tick, so sleep jitter does
//! not accumulate into drift.  If a tick overruns its deadline the schedule
//! resynchronises to "now" instead of bursting to catch up.

use std::time::{Duration, Instant};

use log::debug;

#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    next: Instant,
    overruns: u64,
}

impl Pacer {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
            overruns: 0,
        }
    }

    /// Build from a rate in Hz.  Non-positive or non-finite rates fall back
    /// to 1 Hz.
    pub fn from_rate(rate_hz: f32, start: Instant) -> Self {
        let rate = if rate_hz.is_finite() && rate_hz > 0.0 { rate_hz } else { 1.0 };
        Self::new(Duration::from_secs_f32(1.0 / rate), start)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks that finished after their deadline.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Time to sleep after a tick that ended at `now`, and advance the
    /// deadline.  Zero when the tick overran.
    pub fn wait(&mut self, now: Instant) -> Duration {
        let deadline = self.next;
        if now < deadline {
            self.next = deadline + self.period;
            deadline - now
        } else {
            self.overruns += 1;
            debug!(
                "control loop overrun by {:?} (total {})",
                now - deadline,
                self.overruns
            );
            self.next = now + self.period;
            Duration::ZERO
        }
    }
}
