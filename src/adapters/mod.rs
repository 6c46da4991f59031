//! Adapters between the turret core and the outside world.
//!
//! | Adapter        | Provides                      | Connects to                 |
//! |----------------|-------------------------------|-----------------------------|
//! | `command_link` | `CommandClient`/`CommandInbox`| control thread (mpsc)       |
//! | `tcp`          | `CommandServer`               | line-based TCP clients      |
//! | `time`         | `MonotonicClock`              | `std::time::Instant`        |

pub mod command_link;
pub mod tcp;
pub mod time;
