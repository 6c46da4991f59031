//! Turret controller entry point.
//!
//! ```text
//!  ┌──────────────┐  lines   ┌──────────────┐  mpsc   ┌───────────────────────────┐
//!  │ TCP clients  │ ───────▶ │ CommandServer│ ──────▶ │ ControlLoop (main thread)  │
//!  └──────────────┘ ◀─────── └──────────────┘ ◀────── │  Turret: yaw·pitch·shooter │
//!                   replies                  replies  └─────────────┬─────────────┘
//!                                                                   │ HardwareProvider
//!                                                                   ▼
//!                                                            SimHardware
//! ```
//!
//! Ctrl+C clears the loop's running flag; the loop then shuts every
//! subsystem down before the process exits.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use turret::adapters::command_link::command_link;
use turret::adapters::tcp::CommandServer;
use turret::app::Turret;
use turret::config::TurretConfig;
use turret::control::ControlLoop;
use turret::hal::sim::SimHardware;

/// Turret actuator coordinator
#[derive(Parser, Debug)]
#[command(name = "turret")]
#[command(version)]
#[command(about = "Fixed-rate turret controller with a line-based command server")]
struct Args {
    /// JSON configuration file.  Missing fields use built-in defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command server address (overrides the config file).
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Control loop rate in Hz (overrides the config file).
    #[arg(long, value_name = "HZ")]
    rate_hz: Option<f32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    info!("turret v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => TurretConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            info!("no config file given, using defaults");
            TurretConfig::default()
        }
    };
    if let Some(addr) = args.listen {
        config.control.listen_addr = addr;
    }
    if let Some(hz) = args.rate_hz {
        config.control.loop_hz = hz;
    }
    config.validate().context("invalid configuration")?;

    // ── 2. Command front end ──────────────────────────────────
    let (client, inbox) =
        command_link(Duration::from_millis(config.control.reply_timeout_ms));
    let mut server = CommandServer::spawn(config.control.listen_addr.as_str(), client)
        .with_context(|| format!("binding command server to {}", config.control.listen_addr))?;

    // ── 3. Hardware + subsystems ──────────────────────────────
    warn!("no board backend configured, driving simulated hardware");
    let mut hw = SimHardware::new();
    let mut turret = Turret::new(&config);
    turret
        .initialize(&mut hw)
        .context("hardware initialisation failed")?;

    // ── 4. Control loop on this thread ────────────────────────
    let mut control = ControlLoop::new(turret, inbox, config.control.loop_hz);
    let running = control.running_flag();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, Ordering::Release);
    })
    .context("installing Ctrl+C handler")?;

    let outcome = control.run();
    server.stop();
    outcome.context("control loop aborted")?;

    info!("turret shutdown complete");
    Ok(())
}

/// Route `log` records through a `tracing` fmt subscriber.  `RUST_LOG`
/// refines the filter; `--verbose` raises the default to DEBUG.
fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
