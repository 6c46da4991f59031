//! Inbound operator commands.
//!
//! Two wire forms are accepted, one command per line:
//!
//! ```text
//!   {"cmd": "yaw", "value": 12.5}      JSON object, value may be null/absent
//!   yaw 12.5                           whitespace-separated
//! ```
//!
//! Command names are case-insensitive.

use core::fmt;

use serde::Deserialize;

/// Commands the [`Turret`](super::service::Turret) understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Yaw target in degrees.
    Yaw(f32),
    /// Pitch target in degrees.
    Tilt(f32),
    /// Start a shoot cycle at the given flywheel power.
    Shoot(f32),
    /// Manual flywheel power override.
    Flywheel(f32),
    /// Pusher-only feed cycle.
    Reload,
    /// Pull the pusher back early.
    Retract,
    /// Energise (`true`) or release the yaw stepper driver.
    Enable(bool),
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    /// The command needs a value; carries the reply label.
    MissingValue(&'static str),
    InvalidValue(String),
    Json(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "ERR: empty"),
            Self::Unknown(cmd) => write!(f, "ERR: unknown cmd '{cmd}'"),
            Self::MissingValue(label) => write!(f, "ERR: {label} needs value"),
            Self::InvalidValue(raw) => write!(f, "ERR: invalid value '{raw}'"),
            Self::Json(e) => write!(f, "ERR: {e}"),
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Deserialize)]
struct JsonCommand {
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

impl Command {
    /// Parse one line in either wire form.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.starts_with('{') {
            let obj: JsonCommand =
                serde_json::from_str(line).map_err(|e| CommandError::Json(e.to_string()))?;
            let name = obj.cmd.unwrap_or_default().to_ascii_lowercase();
            return Self::build(&name, obj.value.map(|v| v as f32));
        }

        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let value = match parts.next() {
            Some(raw) => Some(
                raw.parse::<f32>()
                    .map_err(|_| CommandError::InvalidValue(raw.to_string()))?,
            ),
            None => None,
        };
        Self::build(&name.to_ascii_lowercase(), value)
    }

    fn build(name: &str, value: Option<f32>) -> Result<Self, CommandError> {
        if value.is_some_and(f32::is_nan) {
            return Err(CommandError::InvalidValue("NaN".to_string()));
        }
        let need = |label| value.ok_or(CommandError::MissingValue(label));
        Ok(match name {
            "yaw" => Self::Yaw(need("yaw")?),
            "tilt" | "pitch" => Self::Tilt(need("tilt")?),
            "shoot" => Self::Shoot(need("shoot power")?),
            "flywheel" | "power" => Self::Flywheel(need("flywheel power")?),
            "reload" | "push" => Self::Reload,
            "retract" => Self::Retract,
            "enable" => Self::Enable(need("enable")? != 0.0),
            "status" => Self::Status,
            "" => return Err(CommandError::Empty),
            other => return Err(CommandError::Unknown(other.to_string())),
        })
    }
}
