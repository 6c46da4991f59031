//! Shared fixture: a turret on simulated hardware with a synthetic clock.

use std::time::{Duration, Instant};

use turret::app::Turret;
use turret::config::TurretConfig;
use turret::hal::sim::{SimHardware, SimProbe};

pub const TICK: Duration = Duration::from_millis(10);

pub struct Rig {
    pub turret: Turret,
    pub hw: SimHardware,
    start: Instant,
    ticks: u32,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(&TurretConfig::default())
    }

    pub fn with_config(config: &TurretConfig) -> Self {
        let mut hw = SimHardware::instant();
        let mut turret = Turret::new(config);
        turret.initialize(&mut hw).expect("initialise turret");
        Self {
            turret,
            hw,
            start: Instant::now(),
            ticks: 0,
        }
    }

    /// Seconds of synthetic time ticked so far.
    pub fn now_secs(&self) -> f32 {
        (TICK * self.ticks).as_secs_f32()
    }

    pub fn tick(&mut self) {
        let now = self.start + TICK * self.ticks;
        self.turret.tick(now).expect("tick");
        self.ticks += 1;
    }

    /// Tick until `secs` of synthetic time have passed.
    pub fn run_until(&mut self, secs: f32) {
        while self.now_secs() < secs {
            self.tick();
        }
    }

    pub fn send(&mut self, line: &str) -> String {
        self.turret.handle_line(line)
    }

    pub fn probe(&self, pin: u8) -> SimProbe {
        self.hw.probe(pin).expect("pin was claimed")
    }
}
