//! Unified error types for the turret controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the loop and logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A hardware output could not be acquired or written.
    Hardware(HwError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A subsystem was ticked while not in the `Running` phase.
    NotRunning(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::NotRunning(name) => write!(f, "{name}: subsystem not running"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// The pin is already owned by another output.
    PinInUse(u8),
    /// The provider cannot supply this kind of output.
    Unavailable(&'static str),
    /// A digital output write failed.
    DigitalWrite,
    /// A PWM duty-cycle write failed.
    PwmWrite,
    /// The step pulse generator rejected a request.
    PulseTrain,
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinInUse(pin) => write!(f, "GPIO {pin} already in use"),
            Self::Unavailable(what) => write!(f, "{what} unavailable"),
            Self::DigitalWrite => write!(f, "digital write failed"),
            Self::PwmWrite => write!(f, "PWM write failed"),
            Self::PulseTrain => write!(f, "pulse train rejected"),
        }
    }
}

impl std::error::Error for HwError {}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io,
    /// The configuration file is not valid JSON for [`TurretConfig`](crate::config::TurretConfig).
    Parse,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "could not read config file"),
            Self::Parse => write!(f, "config file is not valid JSON"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
