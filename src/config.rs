//! System configuration parameters
//!
//! All tunable parameters for the turret.  Built once at startup (defaults
//! or a JSON file) and passed by reference into every subsystem constructor.
//! Nothing reads configuration through a global.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which actuator drives the yaw axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawDrive {
    /// Velocity-limited stepper (primary build).
    Stepper,
    /// Direct-drive hobby servo.
    Servo,
}

/// GPIO assignments (BCM numbering).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub stepper_dir: u8,
    pub stepper_step: u8,
    pub stepper_enable: u8,
    pub yaw_servo: u8,
    pub pitch_servo: u8,
    pub reload_servo: u8,
    /// Flywheel A (left) H-bridge inputs.
    pub motor_a_forward: u8,
    pub motor_a_backward: u8,
    /// Flywheel B (right) H-bridge inputs.
    pub motor_b_forward: u8,
    pub motor_b_backward: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            stepper_dir: 23,
            stepper_step: 25,
            stepper_enable: 24,
            yaw_servo: 18,
            pitch_servo: 19,
            reload_servo: 20,
            motor_a_forward: 13,
            motor_a_backward: 6,
            motor_b_forward: 22,
            motor_b_backward: 27,
        }
    }
}

impl PinConfig {
    /// Pins actually claimed for a given yaw drive.
    fn claimed(&self, yaw: YawDrive) -> Vec<u8> {
        let mut pins = match yaw {
            YawDrive::Stepper => vec![self.stepper_dir, self.stepper_step, self.stepper_enable],
            YawDrive::Servo => vec![self.yaw_servo],
        };
        pins.extend([
            self.pitch_servo,
            self.reload_servo,
            self.motor_a_forward,
            self.motor_a_backward,
            self.motor_b_forward,
            self.motor_b_backward,
        ]);
        pins
    }
}

/// Stepper yaw mechanics and motion limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Full steps per motor revolution (1.8°/step → 200).
    pub steps_per_rev: u32,
    /// Driver microstep setting.
    pub microstepping: u32,
    /// Motor revolutions per turret revolution.
    pub gear_ratio: f32,
    pub min_deg: f32,
    pub max_deg: f32,
    /// Maximum angular velocity (degrees per second).
    pub max_speed_dps: f32,
    /// Tolerance below which the driver is de-energised.
    pub deadband_deg: f32,
    /// Step pulse high time (seconds).  Fixed by the driver, not by speed.
    pub pulse_high_s: f32,
    /// Step pulse low time (seconds).
    pub pulse_low_s: f32,
    /// Enable line is active-low (A4988 / DRV8825 `EN`).
    pub enable_active_low: bool,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: 200,
            microstepping: 8,
            gear_ratio: 1.0,
            min_deg: -90.0,
            max_deg: 90.0,
            max_speed_dps: 180.0,
            deadband_deg: 0.5,
            pulse_high_s: 0.000_5,
            pulse_low_s: 0.000_5,
            enable_active_low: true,
        }
    }
}

impl StepperConfig {
    /// Microsteps per degree of turret rotation.
    pub fn steps_per_degree(&self) -> f32 {
        self.steps_per_rev as f32 * self.microstepping as f32 * self.gear_ratio / 360.0
    }
}

/// Servo pulse geometry and travel limits for one angular axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub min_deg: f32,
    pub max_deg: f32,
    /// Pulse width at `min_deg` (seconds).
    pub min_pulse_s: f32,
    /// Pulse width at `max_deg` (seconds).
    pub max_pulse_s: f32,
    /// PWM frame rate (Hz).  Hobby servos expect 50 Hz.
    pub frame_hz: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_deg: -90.0,
            max_deg: 90.0,
            min_pulse_s: 0.000_5,
            max_pulse_s: 0.002_5,
            frame_hz: 50,
        }
    }
}

impl ServoConfig {
    fn pitch() -> Self {
        Self {
            min_deg: -10.0,
            max_deg: 10.0,
            ..Self::default()
        }
    }

    fn reload() -> Self {
        Self {
            min_deg: 0.0,
            max_deg: 90.0,
            ..Self::default()
        }
    }
}

/// Flywheel + pusher timing.  The pusher durations are open-loop estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShooterConfig {
    pub reload_servo: ServoConfig,
    /// Pusher angle while retracted.
    pub reload_idle_deg: f32,
    /// Pusher angle while feeding a projectile.
    pub reload_load_deg: f32,
    /// Time for the flywheels to reach speed (seconds).
    pub spin_up_s: f32,
    /// Estimated pusher travel time idle → load (seconds).
    pub move_to_load_s: f32,
    /// Dwell at the load position (seconds).
    pub hold_s: f32,
    /// Estimated pusher travel time load → idle (seconds).
    pub move_to_idle_s: f32,
    /// PWM frequency for the flywheel H-bridges (Hz).
    pub motor_pwm_hz: u32,
}

impl Default for ShooterConfig {
    fn default() -> Self {
        Self {
            reload_servo: ServoConfig::reload(),
            reload_idle_deg: 90.0,
            reload_load_deg: 0.0,
            spin_up_s: 2.5,
            move_to_load_s: 1.0,
            hold_s: 0.2,
            move_to_idle_s: 1.0,
            motor_pwm_hz: 1_000,
        }
    }
}

/// Control loop and command front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Fixed control rate (Hz).
    pub loop_hz: f32,
    pub yaw_drive: YawDrive,
    /// TCP address of the line-based command receiver.
    pub listen_addr: String,
    /// How long a command client waits for the control loop to answer (ms).
    pub reply_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            loop_hz: 100.0, // 10 ms tick
            yaw_drive: YawDrive::Stepper,
            listen_addr: "0.0.0.0:9000".to_string(),
            reply_timeout_ms: 500,
        }
    }
}

/// Complete turret configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    pub pins: PinConfig,
    pub stepper: StepperConfig,
    pub yaw_servo: ServoConfig,
    pub pitch: ServoConfig,
    pub shooter: ShooterConfig,
    pub control: ControlConfig,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),
            stepper: StepperConfig::default(),
            yaw_servo: ServoConfig::default(),
            pitch: ServoConfig::pitch(),
            shooter: ShooterConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl TurretConfig {
    /// Read and validate a JSON configuration file.  Missing sections and
    /// fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            log::warn!("config: cannot read {}: {}", path.display(), e);
            ConfigError::Io
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            log::warn!("config: parse error: {}", e);
            ConfigError::Parse
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a subsystem misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stepper;
        if s.steps_per_rev == 0 || s.microstepping == 0 || s.gear_ratio <= 0.0 {
            return Err(ConfigError::ValidationFailed("stepper steps per degree must be > 0"));
        }
        if s.min_deg > s.max_deg {
            return Err(ConfigError::ValidationFailed("stepper min_deg > max_deg"));
        }
        if s.max_speed_dps <= 0.0 {
            return Err(ConfigError::ValidationFailed("stepper max_speed_dps must be > 0"));
        }
        if s.deadband_deg < 0.0 {
            return Err(ConfigError::ValidationFailed("stepper deadband_deg must be >= 0"));
        }
        if s.pulse_high_s < 0.0 || s.pulse_low_s < 0.0 {
            return Err(ConfigError::ValidationFailed("stepper pulse times must be >= 0"));
        }

        for servo in [&self.yaw_servo, &self.pitch, &self.shooter.reload_servo] {
            if servo.min_deg > servo.max_deg {
                return Err(ConfigError::ValidationFailed("servo min_deg > max_deg"));
            }
            if servo.frame_hz == 0 {
                return Err(ConfigError::ValidationFailed("servo frame_hz must be > 0"));
            }
            let frame_s = 1.0 / servo.frame_hz as f32;
            if servo.min_pulse_s <= 0.0 || servo.max_pulse_s > frame_s {
                return Err(ConfigError::ValidationFailed("servo pulse must fit inside the frame"));
            }
        }

        let sh = &self.shooter;
        if [sh.spin_up_s, sh.move_to_load_s, sh.hold_s, sh.move_to_idle_s]
            .iter()
            .any(|d| *d < 0.0)
        {
            return Err(ConfigError::ValidationFailed("shooter durations must be >= 0"));
        }
        if sh.motor_pwm_hz == 0 {
            return Err(ConfigError::ValidationFailed("shooter motor_pwm_hz must be > 0"));
        }

        if !(self.control.loop_hz > 0.0) {
            return Err(ConfigError::ValidationFailed("control loop_hz must be > 0"));
        }

        let mut pins = self.pins.claimed(self.control.yaw_drive);
        pins.sort_unstable();
        if pins.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationFailed("pin assigned to more than one output"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = TurretConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.control.yaw_drive, YawDrive::Stepper);
        assert!(c.pitch.min_deg < 0.0 && c.pitch.max_deg > 0.0);
    }

    #[test]
    fn steps_per_degree_matches_mechanics() {
        let s = StepperConfig::default();
        // 200 × 8 × 1.0 / 360
        assert!((s.steps_per_degree() - 4.444_444).abs() < 1e-4);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let c = TurretConfig::from_json(r#"{"stepper": {"max_speed_dps": 90.0}}"#).unwrap();
        assert!((c.stepper.max_speed_dps - 90.0).abs() < f32::EPSILON);
        assert_eq!(c.stepper.steps_per_rev, 200);
        assert!((c.shooter.spin_up_s - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn yaw_drive_parses_snake_case() {
        let c = TurretConfig::from_json(r#"{"control": {"yaw_drive": "servo"}}"#).unwrap();
        assert_eq!(c.control.yaw_drive, YawDrive::Servo);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert_eq!(TurretConfig::from_json("{not json").unwrap_err(), ConfigError::Parse);
    }

    #[test]
    fn inverted_range_rejected() {
        let mut c = TurretConfig::default();
        c.pitch.min_deg = 20.0;
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn zero_loop_rate_rejected() {
        let mut c = TurretConfig::default();
        c.control.loop_hz = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn duplicate_pins_rejected() {
        let mut c = TurretConfig::default();
        c.pins.pitch_servo = c.pins.stepper_step;
        assert_eq!(
            c.validate(),
            Err(ConfigError::ValidationFailed("pin assigned to more than one output"))
        );
    }

    #[test]
    fn unused_yaw_pins_do_not_collide() {
        let mut c = TurretConfig::default();
        // The servo pin is free to overlap while the stepper drives yaw.
        c.pins.yaw_servo = c.pins.stepper_dir;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn serde_roundtrip() {
        let c = TurretConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2 = TurretConfig::from_json(&json).unwrap();
        assert_eq!(c.pins.reload_servo, c2.pins.reload_servo);
        assert!((c.shooter.hold_s - c2.shooter.hold_s).abs() < 1e-6);
        assert_eq!(c.control.listen_addr, c2.control.listen_addr);
    }
}
