//! Initialisation, shutdown and release guarantees.

use std::time::{Duration, Instant};

use turret::app::Turret;
use turret::config::TurretConfig;
use turret::error::{Error, HwError};
use turret::hal::sim::SimHardware;
use turret::shooter::ShooterState;

use crate::mock_hw::{HwCall, MockHardware, PWM_MAX};
use crate::rig::Rig;

const ALL_PINS: [u8; 9] = [23, 24, 25, 19, 20, 13, 6, 22, 27];

#[test]
fn tick_before_initialize_is_an_error() {
    let mut turret = Turret::new(&TurretConfig::default());
    assert_eq!(turret.tick(Instant::now()), Err(Error::NotRunning("yaw")));
}

#[test]
fn failed_initialisation_rolls_back() {
    let mut hw = SimHardware::instant();
    hw.reserve(20); // reload servo pin owned elsewhere
    let mut turret = Turret::new(&TurretConfig::default());

    assert_eq!(
        turret.initialize(&mut hw),
        Err(Error::Hardware(HwError::PinInUse(20)))
    );
    for pin in [23, 24, 25, 19, 13, 6, 22, 27] {
        assert!(hw.probe(pin).unwrap().is_released(), "GPIO {pin} leaked");
    }
}

/// Drive a fresh rig into `state`.
fn rig_in(state: ShooterState) -> Rig {
    let mut rig = Rig::new();
    rig.send("yaw 45");
    rig.send("tilt -8");
    let until = match state {
        ShooterState::Idle => 0.05,
        ShooterState::SpinningUp => 1.0,
        ShooterState::Pushing => 2.7,
        ShooterState::AtPosition => 3.6,
        ShooterState::Retracting => 3.9,
    };
    if state != ShooterState::Idle {
        rig.send("shoot 0.9");
    }
    rig.run_until(until);
    assert_eq!(rig.turret.shooter().state(), state);
    rig
}

#[test]
fn shutdown_from_every_state_leaves_outputs_safe() {
    for state in ShooterState::ALL {
        let mut rig = rig_in(state);
        let probes: Vec<_> = ALL_PINS.iter().map(|&p| (p, rig.probe(p))).collect();

        assert_eq!(rig.turret.shutdown(), 0, "{state}");

        let get = |pin: u8| &probes.iter().find(|(p, _)| *p == pin).unwrap().1;
        assert!(get(13).duty().abs() < 1e-6, "{state}: motor A");
        assert!(get(22).duty().abs() < 1e-6, "{state}: motor B");
        assert!(!get(6).level() && !get(27).level(), "{state}: backward inputs");
        assert!((get(20).duty() - 0.125).abs() < 1e-4, "{state}: pusher idle");
        assert!((get(19).duty() - 0.075).abs() < 1e-4, "{state}: pitch neutral");
        assert!(get(24).level(), "{state}: stepper disabled (active-low)");
        for (pin, probe) in &probes {
            assert!(probe.is_released(), "{state}: GPIO {pin} not released");
        }
        assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
    }
}

#[test]
fn shutdown_is_idempotent_and_ends_ticking() {
    let mut hw = MockHardware::new();
    let mut turret = Turret::new(&TurretConfig::default());
    turret.initialize(&mut hw).unwrap();
    turret.tick(Instant::now()).unwrap();

    assert_eq!(turret.shutdown(), 0);
    let calls = hw.log.calls().len();
    assert_eq!(turret.shutdown(), 0);
    assert_eq!(hw.log.calls().len(), calls);
    assert!(matches!(turret.tick(Instant::now()), Err(Error::NotRunning(_))));
}

#[test]
fn safe_writes_precede_release() {
    let mut hw = MockHardware::new();
    let mut turret = Turret::new(&TurretConfig::default());
    turret.initialize(&mut hw).unwrap();

    let start = Instant::now();
    assert!(turret.shooter_mut().shoot(1.0));
    turret.yaw_mut().set_target_angle(10.0);
    for i in 0..10 {
        turret.tick(start + Duration::from_millis(10 * i)).unwrap();
    }
    assert_eq!(hw.log.last_duty(13), Some(PWM_MAX));
    assert!(hw.log.calls().iter().any(|c| matches!(c, HwCall::Pulses(25, n) if *n > 0)));

    let before = hw.log.calls().len();
    assert_eq!(turret.shutdown(), 0);
    let log = &hw.log;
    let after = |call: HwCall| {
        log.calls()[before..]
            .iter()
            .position(|c| *c == call)
            .map(|i| i + before)
    };

    let stop_a = after(HwCall::Duty(13, 0)).expect("motor A stopped");
    let release_a = after(HwCall::Release(13)).expect("motor A released");
    assert!(stop_a < release_a);

    let disable = after(HwCall::Level(24, true)).expect("stepper disabled");
    let release_en = after(HwCall::Release(24)).expect("EN released");
    assert!(disable < release_en);
    assert_eq!(log.last_level(24), Some(true));

    for pin in [23, 24, 25, 19, 20, 13, 6, 22, 27] {
        assert!(log.released(pin), "GPIO {pin}");
    }
}

#[test]
fn broken_pin_aborts_startup() {
    let mut hw = MockHardware::new();
    hw.broken.insert(19);
    let mut turret = Turret::new(&TurretConfig::default());
    assert_eq!(
        turret.initialize(&mut hw),
        Err(Error::Hardware(HwError::Unavailable("mock pin")))
    );
    // The stepper came up first and was released again.
    assert!(hw.log.released(23) && hw.log.released(24) && hw.log.released(25));
}
