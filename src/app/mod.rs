//! Application core: the turret service and its command language.
//!
//! Everything here is hardware-agnostic.  Outputs come from the
//! [`HardwareProvider`](crate::hal::HardwareProvider) passed to
//! [`Turret::initialize`](service::Turret::initialize), so the whole
//! service runs unchanged against [`SimHardware`](crate::hal::sim::SimHardware).

pub mod commands;
pub mod service;

pub use commands::{Command, CommandError};
pub use service::{Turret, TurretStatus, YawAxis};
