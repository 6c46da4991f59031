//! Command channel between front ends and the control thread.
//!
//! ```text
//!  TCP / stdin / tests                       control thread
//!  ┌──────────────┐   CommandRequest   ┌───────────────────────┐
//!  │ CommandClient│ ─────────────────▶ │ CommandInbox (drained │
//!  │  (Clone)     │ ◀───── reply ───── │   between ticks)      │
//!  └──────────────┘                    └───────────────────────┘
//! ```
//!
//! Front ends never touch the turret directly.  They submit a raw line and
//! block (bounded) until the control loop has applied it between two
//! ticks, so setters can never race a `periodic` call.

use core::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use log::debug;

/// One pending command and its reply slot.
pub struct CommandRequest {
    line: String,
    reply: Sender<String>,
}

impl CommandRequest {
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Send the reply.  The client may already have given up waiting.
    pub fn respond(self, reply: String) {
        if self.reply.send(reply).is_err() {
            debug!("command link: client left before reply to {:?}", self.line);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The control loop has stopped.
    Closed,
    /// No reply within the configured timeout.
    Timeout,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "ERR: control loop not running"),
            Self::Timeout => write!(f, "ERR: control loop did not answer"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Submitting end; cheap to clone into every connection thread.
#[derive(Clone)]
pub struct CommandClient {
    tx: Sender<CommandRequest>,
    timeout: Duration,
}

impl CommandClient {
    /// Submit one line and wait for the control loop's reply.
    pub fn submit(&self, line: &str) -> Result<String, LinkError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(CommandRequest {
                line: line.to_string(),
                reply,
            })
            .map_err(|_| LinkError::Closed)?;
        rx.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => LinkError::Timeout,
            RecvTimeoutError::Disconnected => LinkError::Closed,
        })
    }
}

/// Receiving end, owned by the control loop.
pub struct CommandInbox {
    rx: Receiver<CommandRequest>,
}

impl CommandInbox {
    /// Next pending request, without blocking.
    pub fn try_next(&self) -> Option<CommandRequest> {
        match self.rx.try_recv() {
            Ok(req) => Some(req),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a linked client/inbox pair.
pub fn command_link(reply_timeout: Duration) -> (CommandClient, CommandInbox) {
    let (tx, rx) = mpsc::channel();
    (
        CommandClient {
            tx,
            timeout: reply_timeout,
        },
        CommandInbox { rx },
    )
}
