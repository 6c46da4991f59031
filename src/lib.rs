//! Turret actuator coordinator.
//!
//! Drives a stepper (or servo) yaw axis, a servo pitch axis and a
//! dual-flywheel shooter from one fixed-rate control loop, and takes
//! setpoint commands from a line-based front end.  Hardware is reached only
//! through the capability traits in [`hal`], so the whole crate runs
//! against [`hal::sim::SimHardware`] for tests and simulation.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod hal;
pub mod shooter;
pub mod subsystem;

pub use error::{Error, Result};
