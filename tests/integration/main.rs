//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises the turret through its public API on the
//! host, against simulated (`SimHardware`) or call-recording (`mock_hw`)
//! backends.  No real hardware is required.

mod dispatcher_tests;
mod lifecycle_tests;
mod mock_hw;
mod rig;
mod turret_tests;
