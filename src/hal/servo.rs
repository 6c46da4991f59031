//! Hobby servo over a PWM channel.
//!
//! Standard servos take a 50 Hz frame with a 0.5–2.5 ms pulse.  The pulse
//! width is interpolated linearly across the configured angle range:
//!
//! ```text
//!   duty = pulse_s × frame_hz
//!   pulse_s = min_pulse + (angle − min_deg) / (max_deg − min_deg) × (max_pulse − min_pulse)
//! ```

use crate::config::ServoConfig;
use crate::error::HwError;

use super::PwmOutput;

/// Angle-addressed servo capability.
pub trait ServoOutput: Send {
    /// Command an angle in degrees.  Values outside the servo's range are
    /// clamped.
    fn set_angle(&mut self, deg: f32) -> Result<(), HwError>;

    /// Last commanded angle, if any.
    fn angle(&self) -> Option<f32>;
}

/// [`ServoOutput`] built on any [`PwmOutput`].
pub struct PwmServo {
    pwm: Box<dyn PwmOutput>,
    min_deg: f32,
    max_deg: f32,
    min_pulse_s: f32,
    max_pulse_s: f32,
    frame_hz: f32,
    angle: Option<f32>,
}

impl PwmServo {
    pub fn new(pwm: Box<dyn PwmOutput>, config: &ServoConfig) -> Self {
        Self {
            pwm,
            min_deg: config.min_deg,
            max_deg: config.max_deg,
            min_pulse_s: config.min_pulse_s,
            max_pulse_s: config.max_pulse_s,
            frame_hz: config.frame_hz as f32,
            angle: None,
        }
    }

    /// Duty fraction for an angle (clamped into range).
    pub fn duty_for(&self, deg: f32) -> f32 {
        let span = self.max_deg - self.min_deg;
        let t = if span > 0.0 {
            (deg.clamp(self.min_deg, self.max_deg) - self.min_deg) / span
        } else {
            0.5
        };
        let pulse = self.min_pulse_s + t * (self.max_pulse_s - self.min_pulse_s);
        pulse * self.frame_hz
    }
}

impl ServoOutput for PwmServo {
    fn set_angle(&mut self, deg: f32) -> Result<(), HwError> {
        let deg = deg.clamp(self.min_deg, self.max_deg);
        self.pwm.set_duty(self.duty_for(deg))?;
        self.angle = Some(deg);
        Ok(())
    }

    fn angle(&self) -> Option<f32> {
        self.angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::HardwareProvider;
    use crate::hal::sim::SimHardware;

    fn servo(config: &ServoConfig) -> (PwmServo, crate::hal::sim::SimProbe) {
        let mut hw = SimHardware::instant();
        let pwm = hw.pwm_output(7, config.frame_hz).unwrap();
        (PwmServo::new(pwm, config), hw.probe(7).unwrap())
    }

    #[test]
    fn endpoints_and_centre_map_to_pulse_widths() {
        let cfg = ServoConfig::default(); // −90..90, 0.5..2.5 ms @ 50 Hz
        let (s, _) = servo(&cfg);
        assert!((s.duty_for(-90.0) - 0.025).abs() < 1e-6);
        assert!((s.duty_for(0.0) - 0.075).abs() < 1e-6);
        assert!((s.duty_for(90.0) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_angle_is_clamped() {
        let cfg = ServoConfig::default();
        let (mut s, probe) = servo(&cfg);
        s.set_angle(400.0).unwrap();
        assert_eq!(s.angle(), Some(90.0));
        assert!((probe.duty() - 0.125).abs() < 1e-3);
    }

    #[test]
    fn degenerate_range_sits_mid_pulse() {
        let cfg = ServoConfig {
            min_deg: 10.0,
            max_deg: 10.0,
            ..ServoConfig::default()
        };
        let (s, _) = servo(&cfg);
        assert!((s.duty_for(10.0) - 0.075).abs() < 1e-6);
    }
}
