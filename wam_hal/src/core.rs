//! WAM core and control loop management.
//!
//! `WamCore` owns the configured [`Device`], a command port the application
//! writes joint torques (or a calibration pose) into, and a position port it
//! reads measured joint positions from. Every cycle reads positions first,
//! then applies whatever command is pending.

use crate::bus_access::{BusAccess, ExchangePolicy};
use crate::device::layout::DeviceLayout;
use crate::device::Device;
use crate::driver_registry::DriverRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use wam_common::config::WamConfig;
use wam_common::error::WamError;
use wam_common::protocol::mode::PuckMode;

/// Cycles between timing summaries.
const STATS_INTERVAL: u64 = 1000;

/// A command for the next control cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum JointCommand {
    /// Joint torques in Nm.
    Torques(Vec<f64>),
    /// Redefine the current pose as these joint positions (radians).
    Calibrate(Vec<f64>),
}

/// Latest-value command mailbox. Each command is consumed by one cycle.
#[derive(Debug, Clone, Default)]
pub struct CommandPort(Arc<Mutex<Option<JointCommand>>>);

impl CommandPort {
    /// Replace the pending command.
    pub fn submit(&self, command: JointCommand) {
        *self.0.lock() = Some(command);
    }

    pub fn take(&self) -> Option<JointCommand> {
        self.0.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.0.lock().is_some()
    }
}

/// Measured joint positions, overwritten every cycle.
#[derive(Debug, Clone, Default)]
pub struct PositionPort(Arc<Mutex<Vec<f64>>>);

impl PositionPort {
    pub fn latest(&self) -> Vec<f64> {
        self.0.lock().clone()
    }

    fn publish(&self, positions: Vec<f64>) {
        *self.0.lock() = positions;
    }
}

/// Timing statistics for loop monitoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of timing violations (cycle exceeded target)
    pub timing_violations: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }

    fn record(&mut self, cycle_time_us: u64) {
        self.cycle_count += 1;
        self.total_cycle_time_us += cycle_time_us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(cycle_time_us);
    }
}

/// Control loop around one device.
pub struct WamCore {
    device: Device,
    commands: CommandPort,
    positions: PositionPort,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
    cycle_time: Duration,
    stats: TimingStats,
    /// First cycle error; once set, no further cycles run.
    halted: Option<WamError>,
}

impl WamCore {
    /// Open the configured bus, build and bring up the configured device.
    ///
    /// # Errors
    /// - `Config` if the configuration does not validate
    /// - `DriverNotFound` for an unknown driver name
    /// - any initialization, calibration or mode error from the device
    pub fn init(config: WamConfig, registry: &DriverRegistry) -> Result<Self, WamError> {
        config.validate()?;
        info!(
            driver = %config.bus.driver,
            device = %config.bus.device,
            product = ?config.device.product,
            "initializing WamCore"
        );

        let bus = registry.create_bus(&config.bus.driver, &config)?;
        let access = BusAccess::new(bus, ExchangePolicy::from_config(&config.bus));
        let layout =
            DeviceLayout::for_product(config.device.product).with_tip_link(&config.device.tip_link);
        let device = Device::new(layout, access, config.safety)?;
        Self::with_device(config, device)
    }

    /// Bring up an already-built device: initialize, calibrate if the
    /// configuration carries a pose, then activate torque mode.
    pub fn with_device(config: WamConfig, mut device: Device) -> Result<Self, WamError> {
        config.validate()?;
        device.initialize()?;
        if let Some(pose) = &config.device.calibration {
            info!(?pose, "applying calibration pose");
            device.set_positions(pose)?;
        }
        device.set_mode(PuckMode::Torque)?;

        let cycle_time = Duration::from_micros(config.control.cycle_time_us);
        info!(
            device = device.name(),
            dof = device.dof(),
            cycle_time_us = config.control.cycle_time_us,
            "WamCore ready"
        );
        Ok(Self {
            device,
            commands: CommandPort::default(),
            positions: PositionPort::default(),
            running: Arc::new(AtomicBool::new(false)),
            cycle_time,
            stats: TimingStats::default(),
            halted: None,
        })
    }

    /// One control cycle.
    ///
    /// # Errors
    /// `Halted` carrying the cause on the failing cycle and on every call
    /// after it. Zero torque is commanded (or, failing that, IDLE) before
    /// the error is returned.
    pub fn update(&mut self) -> Result<(), WamError> {
        if let Some(cause) = &self.halted {
            return Err(WamError::Halted(Box::new(cause.clone())));
        }

        self.device.begin_cycle();
        let result = self.cycle();
        self.device.end_cycle();

        result.map_err(|cause| {
            error!(error = %cause, "control cycle failed, halting");
            self.stop_motors();
            self.halted = Some(cause.clone());
            WamError::Halted(Box::new(cause))
        })
    }

    fn cycle(&mut self) -> Result<(), WamError> {
        let positions = self.device.get_positions()?;
        self.positions.publish(positions);

        match self.commands.take() {
            Some(JointCommand::Torques(torques)) => self.device.set_torques(&torques),
            Some(JointCommand::Calibrate(pose)) => {
                info!(?pose, "calibrating");
                self.device.set_positions(&pose)
            }
            None => Ok(()),
        }
    }

    /// Best effort: zero torque, else drop every puck to IDLE.
    fn stop_motors(&mut self) {
        let zeros = vec![0.0; self.device.dof()];
        if let Err(e) = self.device.set_torques(&zeros) {
            warn!(error = %e, "zero torque failed, idling pucks");
            if let Err(e) = self.device.set_mode(PuckMode::Idle) {
                error!(error = %e, "could not idle pucks");
            }
        }
    }

    /// Run cycles at the configured period until the running flag clears,
    /// `max_cycles` have run, or a cycle fails.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<(), WamError> {
        info!(
            cycle_time_us = self.cycle_time.as_micros() as u64,
            ?max_cycles,
            "starting control loop"
        );
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("running in real-time mode");
        } else {
            info!("running in standard (non-RT) mode");
        }

        let target_us = self.cycle_time.as_micros() as u64;
        let mut result = Ok(());
        while self.running.load(Ordering::SeqCst)
            && max_cycles.is_none_or(|max| self.stats.cycle_count < max)
        {
            let cycle_start = Instant::now();
            if let Err(e) = self.update() {
                result = Err(e);
                break;
            }

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            self.stats.record(cycle_time_us);
            if cycle_time_us > target_us {
                self.stats.timing_violations += 1;
                let n = self.stats.timing_violations;
                if n <= 10 || n % 1000 == 0 {
                    warn!(
                        violation = n,
                        cycle_time_us,
                        target_us,
                        "cycle overran its period"
                    );
                }
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }

            if self.stats.cycle_count % STATS_INTERVAL == 0 {
                debug!(
                    cycles = self.stats.cycle_count,
                    avg_us = self.stats.avg_cycle_time_us(),
                    max_us = self.stats.max_cycle_time_us,
                    violations = self.stats.timing_violations,
                    "control loop timing"
                );
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            cycles = self.stats.cycle_count,
            violations = self.stats.timing_violations,
            "control loop stopped"
        );
        result
    }

    /// Stop the loop and return every puck to IDLE.
    pub fn shutdown(&mut self) -> Result<(), WamError> {
        info!("shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.device.set_mode(PuckMode::Idle)
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn commands(&self) -> CommandPort {
        self.commands.clone()
    }

    pub fn positions(&self) -> PositionPort {
        self.positions.clone()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn stats(&self) -> TimingStats {
        self.stats
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only reads the calling thread's policy.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
