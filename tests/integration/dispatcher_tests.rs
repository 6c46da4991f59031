//! Command strings in, reply strings out.

use turret::shooter::ShooterState;

use crate::rig::Rig;

#[test]
fn text_and_json_forms_are_equivalent() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("yaw 12"), "OK: yaw=12.00");
    assert_eq!(rig.send(r#"{"cmd": "yaw", "value": 12}"#), "OK: yaw=12.00");
    assert_eq!(rig.send("TILT 2.5"), "OK: tilt=2.50");
    assert_eq!(rig.send(r#"{"cmd":"Tilt","value":-2.5}"#), "OK: tilt=-2.50");
}

#[test]
fn errors_never_touch_the_turret() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("spin 3"), "ERR: unknown cmd 'spin'");
    assert_eq!(rig.send("yaw"), "ERR: yaw needs value");
    assert_eq!(rig.send(r#"{"cmd": "shoot", "value": null}"#), "ERR: shoot power needs value");
    assert_eq!(rig.send(""), "ERR: empty");
    assert!(rig.send("yaw twelve").starts_with("ERR: invalid value"));
    assert!(rig.send("{broken").starts_with("ERR:"));

    rig.tick();
    assert_eq!(rig.turret.yaw().target_angle(), 0.0);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
}

#[test]
fn busy_shooter_rejects_shoot_and_reload() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("shoot 0.5"), "OK: shoot power=0.50");
    assert_eq!(rig.send("shoot 0.9"), "ERR: shooter busy (SpinningUp)");
    assert_eq!(rig.send("reload"), "ERR: cannot reload (SpinningUp)");
    assert_eq!(rig.send("retract"), "ERR: cannot retract (SpinningUp)");
    assert_eq!(rig.turret.shooter().target_flywheel_power(), 0.5);
}

#[test]
fn reload_then_retract() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("reload"), "OK: reload");
    rig.tick();
    assert_eq!(rig.turret.shooter().state(), ShooterState::Pushing);
    assert_eq!(rig.turret.shooter().target_flywheel_power(), 0.0);

    assert_eq!(rig.send("retract"), "OK: retract");
    rig.tick();
    assert_eq!(rig.turret.shooter().state(), ShooterState::Retracting);
    rig.run_until(1.2);
    assert_eq!(rig.turret.shooter().state(), ShooterState::Idle);
}

#[test]
fn enable_toggles_the_stepper_driver() {
    let mut rig = Rig::new();
    let en = rig.probe(24);
    assert_eq!(rig.send("enable 1"), "OK: enable=1");
    assert!(!en.level());
    assert_eq!(rig.send("enable 0"), "OK: enable=0");
    assert!(en.level());
}

#[test]
fn status_reports_live_state() {
    let mut rig = Rig::new();
    rig.send("tilt 4");
    rig.send("shoot 0.25");
    rig.tick();

    let reply = rig.send("status");
    let v: serde_json::Value = serde_json::from_str(&reply).expect("status is JSON");
    assert_eq!(v["ok"], true);
    assert_eq!(v["state"], "SpinningUp");
    assert_eq!(v["flywheel_power"], 0.25);
    assert_eq!(v["pusher"], "idle");
    assert_eq!(v["pitch"], 4.0);
    assert_eq!(v["yaw_drive"], "stepper");
}
