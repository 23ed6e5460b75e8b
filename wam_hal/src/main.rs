//! # WAM HAL Binary
//!
//! Brings up a Barrett WAM arm or BH8-280 hand on a CAN bus and runs the
//! control loop until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run against the simulated bus
//! wam_hal --config config/wam.toml --simulate
//!
//! # Real hardware (build with --features socketcan)
//! wam_hal --config config/wam.toml --driver socketcan
//!
//! # A bounded run with verbose JSON logs
//! wam_hal --config config/wam.toml -s --cycles 5000 -v --json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wam_common::config::{ConfigLoader, LogLevel, WamConfig};
use wam_common::consts::DEFAULT_CONFIG_PATH;
use wam_hal::core::WamCore;
use wam_hal::driver_registry::DriverRegistry;
use wam_hal::drivers::register_all;

/// WAM HAL - device layer for Barrett WAM arms and hands
#[derive(Parser, Debug)]
#[command(name = "wam_hal")]
#[command(version)]
#[command(about = "Device layer for Barrett WAM arms and BH8-280 hands over CAN")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (wam.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulated bus (overrides --driver and bus.driver)
    #[arg(short = 's', long)]
    simulate: bool,

    /// Bus driver to use instead of bus.driver
    #[arg(short, long)]
    driver: Option<String>,

    /// Stop after this many control cycles
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("wam_hal failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = WamConfig::load(&args.config);
    setup_tracing(&args, loaded.as_ref().ok().map(|c| c.shared.log_level));
    let mut config = loaded?;

    info!("WAM HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.simulate {
        info!("simulation mode enabled");
        config.bus.driver = "simulation".to_string();
    } else if let Some(driver) = &args.driver {
        config.bus.driver.clone_from(driver);
    }

    let mut registry = DriverRegistry::new();
    register_all(&mut registry);
    info!(drivers = ?registry.list_drivers(), selected = %config.bus.driver, "bus drivers");

    let mut core = WamCore::init(config, &registry)?;

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = core.run(args.cycles) {
        error!("control loop error: {e}");
    }

    core.shutdown()?;
    let stats = core.stats();
    info!(
        cycles = stats.cycle_count,
        avg_us = stats.avg_cycle_time_us(),
        max_us = stats.max_cycle_time_us,
        violations = stats.timing_violations,
        "WAM HAL shutdown complete"
    );
    Ok(())
}

/// Setup tracing subscriber. `RUST_LOG` wins over everything else.
fn setup_tracing(args: &Args, configured: Option<LogLevel>) {
    let default = if args.verbose {
        LogLevel::Debug
    } else {
        configured.unwrap_or_default()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
