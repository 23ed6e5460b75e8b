//! WamCore end to end: configuration file to control cycles on the
//! simulated bus.

use std::io::Write;
use tempfile::NamedTempFile;
use wam_common::config::{ConfigLoader, WamConfig};
use wam_common::error::WamError;
use wam_common::protocol::mode::PuckMode;
use wam_hal::core::{JointCommand, WamCore};
use wam_hal::driver_registry::DriverRegistry;
use wam_hal::drivers::register_all;

const WAM4_TOML: &str = r#"
[shared]
service_name = "wam_hal_it"
log_level = "debug"

[bus]
driver = "simulation"
verify_delay_ms = 0
wake_delay_ms = 0
zeroing_pace_us = 0
hand_settle_ms = 0

[device]
product = "wam4"
calibration = [0.0, -1.5, 0.0, 3.0]

[control]
cycle_time_us = 500
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

fn registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    register_all(&mut registry);
    registry
}

fn core_from(content: &str) -> WamCore {
    let file = write_config(content);
    let mut config = WamConfig::load(file.path()).expect("load config");
    config.bus.reply_timeout_us = 500;
    WamCore::init(config, &registry()).expect("init core")
}

#[test]
fn calibrated_wam4_reports_home_pose() {
    let mut core = core_from(WAM4_TOML);
    assert!(core.device().pucks().iter().all(|p| p.mode() == PuckMode::Torque));
    assert!(core.device().safety().is_some_and(|s| s.is_enabled()));

    core.update().unwrap();
    let pose = core.positions().latest();
    // coupled joints through the factory matrices; one count of slack
    for (measured, wanted) in pose.iter().zip([0.0, -1.5, 0.0, 3.0]) {
        assert!((measured - wanted).abs() < 0.01, "{pose:?}");
    }
}

#[test]
fn torque_commands_reach_the_pucks() {
    let mut core = core_from(WAM4_TOML);
    core.commands().submit(JointCommand::Torques(vec![0.0; 4]));
    core.update().unwrap();
    core.update().unwrap();
    assert_eq!(core.stats().cycle_count, 0, "stats only count run() cycles");
    core.run(Some(3)).unwrap();
    assert_eq!(core.stats().cycle_count, 3);
    assert!(!core.is_halted());
}

#[test]
fn recalibration_through_the_command_port() {
    let mut core = core_from(WAM4_TOML);
    core.commands().submit(JointCommand::Calibrate(vec![0.5, 0.0, 0.0, 0.0]));
    core.update().unwrap();
    core.update().unwrap();
    let pose = core.positions().latest();
    assert!((pose[0] - 0.5).abs() < 0.01, "{pose:?}");
}

#[test]
fn calibration_of_wrong_length_is_rejected_at_load() {
    let file = write_config(&WAM4_TOML.replace("[0.0, -1.5, 0.0, 3.0]", "[0.0, 1.0]"));
    let config = WamConfig::load(file.path()).expect("parses");
    assert!(matches!(
        WamCore::init(config, &registry()),
        Err(WamError::Config(_))
    ));
}

#[test]
fn halted_core_keeps_refusing() {
    let mut core = core_from(WAM4_TOML);
    core.commands().submit(JointCommand::Calibrate(vec![0.0; 7]));
    let first = core.update().unwrap_err();
    assert!(matches!(first, WamError::Halted(_)));
    assert!(matches!(core.run(None), Err(WamError::Halted(_))));
    core.shutdown().unwrap();
    assert!(core.device().pucks().iter().all(|p| p.mode() == PuckMode::Idle));
}
