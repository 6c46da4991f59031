//! Shooter transition table and entry actions.
//!
//! Pure functions only: the [`Shooter`](super::Shooter) owns the clock and
//! the outputs, this module only decides *where to go next* and *what to
//! set on arrival*.
//!
//! ```text
//!           shoot()                 spin_up            move_to_load
//!  IDLE ───────────────▶ SPINNING_UP ──────▶ PUSHING ──────────────▶ AT_POSITION
//!   ▲  │                                      ▲  │                     │     │
//!   │  └──────────────── push() ──────────────┘  └──── retract() ──┐   │     │
//!   │                                                              ▼   │     │
//!   └──────────────── move_to_idle ─────────── RETRACTING ◀──retract()─┘     │
//!                                                  ▲                        │
//!                                                  └────────── hold ────────┘
//! ```
//!
//! | State       | Entry action                    | Timed exit                    |
//! |-------------|---------------------------------|-------------------------------|
//! | Idle        | power = 0, pusher = idle        | (none)                        |
//! | SpinningUp  | power = target, pusher = idle   | `spin_up` → Pushing           |
//! | Pushing     | pusher = load                   | `move_to_load` → AtPosition   |
//! | AtPosition  | (none)                          | `hold` → Retracting           |
//! | Retracting  | power = 0, pusher = idle        | `move_to_idle` → Idle         |

use core::fmt;

use serde::Serialize;

use crate::config::ShooterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShooterState {
    Idle,
    SpinningUp,
    Pushing,
    AtPosition,
    Retracting,
}

impl ShooterState {
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::SpinningUp,
        Self::Pushing,
        Self::AtPosition,
        Self::Retracting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::SpinningUp => "SpinningUp",
            Self::Pushing => "Pushing",
            Self::AtPosition => "AtPosition",
            Self::Retracting => "Retracting",
        }
    }
}

impl fmt::Display for ShooterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requests that can move the machine outside its timed exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShooterEvent {
    /// Full cycle (spin up, push, hold, retract).
    Shoot,
    /// Pusher-only cycle: feed without spinning the flywheels up first.
    Push,
    /// Pull the pusher back early.
    Retract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PusherPosition {
    Idle,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Leave `target_flywheel_power` as it is.
    Keep,
    /// Force `target_flywheel_power` to 0.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryAction {
    pub power: PowerAction,
    pub pusher: Option<PusherPosition>,
}

/// Per-state durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShooterTiming {
    pub spin_up_s: f32,
    pub move_to_load_s: f32,
    pub hold_s: f32,
    pub move_to_idle_s: f32,
}

impl From<&ShooterConfig> for ShooterTiming {
    fn from(c: &ShooterConfig) -> Self {
        Self {
            spin_up_s: c.spin_up_s,
            move_to_load_s: c.move_to_load_s,
            hold_s: c.hold_s,
            move_to_idle_s: c.move_to_idle_s,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Transitions
// ═══════════════════════════════════════════════════════════════════════════

/// Transition caused by an external request, or `None` if the request is
/// not valid in `state`.
pub fn on_event(state: ShooterState, event: ShooterEvent) -> Option<ShooterState> {
    use ShooterEvent as E;
    use ShooterState as S;
    match (state, event) {
        (S::Idle, E::Shoot) => Some(S::SpinningUp),
        (S::Idle, E::Push) => Some(S::Pushing),
        (S::Pushing | S::AtPosition, E::Retract) => Some(S::Retracting),
        _ => None,
    }
}

/// Transition caused by time spent in `state`.
pub fn on_timeout(
    state: ShooterState,
    elapsed: f32,
    timing: &ShooterTiming,
) -> Option<ShooterState> {
    use ShooterState as S;
    let (limit, next) = match state {
        S::Idle => return None,
        S::SpinningUp => (timing.spin_up_s, S::Pushing),
        S::Pushing => (timing.move_to_load_s, S::AtPosition),
        S::AtPosition => (timing.hold_s, S::Retracting),
        S::Retracting => (timing.move_to_idle_s, S::Idle),
    };
    (elapsed >= limit).then_some(next)
}

/// Full transition function.  A valid event wins over a timed exit.
pub fn next_state(
    state: ShooterState,
    elapsed: f32,
    event: Option<ShooterEvent>,
    timing: &ShooterTiming,
) -> ShooterState {
    event
        .and_then(|e| on_event(state, e))
        .or_else(|| on_timeout(state, elapsed, timing))
        .unwrap_or(state)
}

/// What to do on arrival in `state`.
pub fn entry_action(state: ShooterState) -> EntryAction {
    use PowerAction as P;
    use PusherPosition as Pos;
    use ShooterState as S;
    let (power, pusher) = match state {
        S::Idle => (P::Zero, Some(Pos::Idle)),
        // `shoot` has already stored the requested power.
        S::SpinningUp => (P::Keep, Some(Pos::Idle)),
        S::Pushing => (P::Keep, Some(Pos::Load)),
        S::AtPosition => (P::Keep, None),
        S::Retracting => (P::Zero, Some(Pos::Idle)),
    };
    EntryAction { power, pusher }
}
