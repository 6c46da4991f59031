//! End-to-end behaviour of the turret service on simulated hardware.

use turret::app::YawAxis;
use turret::config::{TurretConfig, YawDrive};
use turret::shooter::{PusherPosition, ShooterState};

use crate::rig::Rig;

/// Servo duty at the idle (90°) and load (0°) pusher angles: 0..90° maps to
/// 0.5..2.5 ms of a 20 ms frame.
const PUSHER_IDLE_DUTY: f32 = 0.125;
const PUSHER_LOAD_DUTY: f32 = 0.025;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn full_shoot_cycle_follows_the_timeline() {
    let mut rig = Rig::new();
    let motor_a = rig.probe(13);
    let motor_b = rig.probe(22);
    let pusher = rig.probe(20);

    assert_eq!(rig.send("shoot 0.8"), "OK: shoot power=0.80");
    assert_eq!(rig.turret.shooter().state(), ShooterState::SpinningUp);

    rig.run_until(2.45);
    assert_eq!(rig.turret.shooter().state(), ShooterState::SpinningUp);
    assert!(close(motor_a.duty(), 0.8) && close(motor_b.duty(), 0.8));
    assert!(close(pusher.duty(), PUSHER_IDLE_DUTY));

    rig.run_until(2.6);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Pushing);
    assert!(close(pusher.duty(), PUSHER_LOAD_DUTY));
    assert!(close(motor_a.duty(), 0.8));

    rig.run_until(3.6);
    assert_eq!(rig.turret.shooter().state(), ShooterState::AtPosition);
    assert_eq!(rig.turret.shooter().pusher_position(), PusherPosition::Load);

    rig.run_until(3.8);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Retracting);
    assert!(motor_a.duty().abs() < 1e-6 && motor_b.duty().abs() < 1e-6);
    assert!(close(pusher.duty(), PUSHER_IDLE_DUTY));

    rig.run_until(4.85);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
    assert_eq!(rig.turret.shooter().target_flywheel_power(), 0.0);

    // Back in Idle, a new cycle is accepted.
    assert_eq!(rig.send("shoot 1"), "OK: shoot power=1.00");
}

#[test]
fn stepper_yaw_reaches_target() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("yaw 30"), "OK: yaw=30.00");
    rig.run_until(2.0);

    let YawAxis::Stepper(axis) = rig.turret.yaw() else {
        panic!("default build drives yaw with the stepper");
    };
    assert!((axis.current_angle() - 30.0).abs() < 0.5);
    assert!(!axis.is_busy());
    assert!(!axis.is_driver_enabled());

    // Every issued step reached the STEP pin.
    let edges = rig.probe(25).rising_edges();
    assert_eq!(edges, axis.steps_issued_total());
    let expected = 30.0 * axis.steps_per_degree();
    assert!((edges as f32 - expected).abs() <= 3.0);
}

#[test]
fn stepper_speed_is_limited() {
    let mut rig = Rig::new();
    rig.send("yaw 90");
    rig.run_until(0.1);
    // 180 °/s at most, so no more than 18° after 0.1 s.
    assert!(rig.turret.yaw().current_angle() <= 18.0 + 0.5);
    assert!(rig.turret.yaw().current_angle() > 0.0);
}

#[test]
fn servo_yaw_variant_follows_directly() {
    let mut config = TurretConfig::default();
    config.control.yaw_drive = YawDrive::Servo;
    let mut rig = Rig::with_config(&config);

    assert!(rig.hw.probe(config.pins.stepper_step).is_none());
    assert_eq!(rig.send("yaw 45"), "OK: yaw=45.00");
    rig.tick();
    assert_eq!(rig.turret.yaw().current_angle(), 45.0);
    // −90..90° over 0.5..2.5 ms: 45° → 2.0 ms of 20 ms.
    assert!(close(rig.probe(18).duty(), 0.1));
}

#[test]
fn pitch_is_clamped_to_its_range() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("tilt 30"), "OK: tilt=10.00");
    rig.tick();
    assert_eq!(rig.turret.pitch().current_angle(), 10.0);
    assert!(close(rig.probe(19).duty(), 0.125));
}

#[test]
fn manual_flywheel_power_is_cleared_by_a_shot() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("flywheel 0.3"), "OK: flywheel power=0.30");
    rig.tick();
    assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
    assert!(close(rig.probe(13).duty(), 0.3));

    rig.send("shoot 0.6");
    rig.run_until(5.0);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
    assert!(rig.probe(13).duty().abs() < 1e-6);
}

#[test]
fn yaw_retarget_waits_for_in_flight_train() {
    let mut rig = Rig::new();
    rig.send("yaw 20");
    rig.tick(); // first tick: dt = 0, nothing issued
    rig.tick(); // train issued
    let YawAxis::Stepper(axis) = rig.turret.yaw() else {
        panic!("stepper expected");
    };
    assert!(axis.is_busy());
    let pending = axis.pending_steps();

    rig.send("yaw -20");
    rig.tick(); // completes the positive train first
    let YawAxis::Stepper(axis) = rig.turret.yaw() else {
        panic!("stepper expected");
    };
    let moved = pending as f32 / axis.steps_per_degree();
    assert!((axis.current_angle() - moved).abs() < 1e-4);

    rig.run_until(3.0);
    assert!((rig.turret.yaw().current_angle() + 20.0).abs() < 0.5);
}
