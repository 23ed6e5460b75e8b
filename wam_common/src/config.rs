//! Configuration loading traits and types.
//!
//! Every WAM binary reads one TOML file through [`ConfigLoader`]:
//!
//! ```toml
//! [shared]
//! service_name = "wam-left"
//! log_level = "info"
//!
//! [bus]
//! driver = "socketcan"
//! device = "can0"
//!
//! [device]
//! product = "wam7"
//! tip_link = "wam/wrist_palm_link"
//! ```
//!
//! All tables except `[shared]` are optional and unknown keys are rejected.

use crate::consts::{
    DEFAULT_CYCLE_RETRY_BUDGET, DEFAULT_CYCLE_TIME_US, DEFAULT_REPLY_TIMEOUT_US, DEFAULT_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common fields shared by every WAM service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// # Errors
    /// `ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── WAM Configuration ──────────────────────────────────────────────

/// Product the bus drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProductKind {
    /// 4-DOF arm.
    #[serde(rename = "wam4")]
    Wam4,
    /// 7-DOF arm.
    #[default]
    #[serde(rename = "wam7")]
    Wam7,
    /// BH8-280 hand.
    #[serde(rename = "bh8_280")]
    BarrettHand,
}

impl ProductKind {
    /// Number of joints.
    pub const fn dof(self) -> usize {
        match self {
            ProductKind::Wam4 | ProductKind::BarrettHand => 4,
            ProductKind::Wam7 => 7,
        }
    }
}

/// `[bus]` table: transport and exchange timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Registered driver name.
    pub driver: String,
    /// Interface name handed to the driver (e.g. `can0`).
    pub device: String,
    /// Time to wait for one reply.
    pub reply_timeout_us: u64,
    /// Re-sends after a timed-out request.
    pub retries: u32,
    /// Retries allowed across one control cycle.
    pub cycle_retry_budget: u32,
    /// Pause between a verified write and its read-back.
    pub verify_delay_ms: u64,
    /// Pause after commanding STAT=READY.
    pub wake_delay_ms: u64,
    /// Pause between consecutive encoder overwrites.
    pub zeroing_pace_us: u64,
    /// Pause after sending the hand through HI.
    pub hand_settle_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            driver: "simulation".to_string(),
            device: "can0".to_string(),
            reply_timeout_us: DEFAULT_REPLY_TIMEOUT_US,
            retries: DEFAULT_RETRIES,
            cycle_retry_budget: DEFAULT_CYCLE_RETRY_BUDGET,
            verify_delay_ms: 10,
            wake_delay_ms: 1000,
            zeroing_pace_us: 1000,
            hand_settle_ms: 1000,
        }
    }
}

impl BusConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_micros(self.reply_timeout_us)
    }
}

/// `[device]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub product: ProductKind,
    /// Tip link name, passed through for downstream kinematics.
    pub tip_link: String,
    /// Joint positions (rad) written to the encoders after bring-up.
    pub calibration: Option<Vec<f64>>,
}

/// `[safety]` table: safety module thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyLimits {
    pub velocity_warning: i32,
    pub velocity_fault: i32,
    pub torque_warning: i32,
    pub torque_fault: i32,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            velocity_warning: 4000,
            velocity_fault: 8000,
            torque_warning: 4000,
            torque_fault: 8000,
        }
    }
}

impl SafetyLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pairs = [
            ("velocity", self.velocity_warning, self.velocity_fault),
            ("torque", self.torque_warning, self.torque_fault),
        ];
        for (name, warning, fault) in pairs {
            if warning <= 0 || fault <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} thresholds must be positive"
                )));
            }
            if warning > fault {
                return Err(ConfigError::ValidationError(format!(
                    "{name} warning ({warning}) exceeds fault ({fault})"
                )));
            }
        }
        Ok(())
    }
}

/// `[control]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub cycle_time_us: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: DEFAULT_CYCLE_TIME_US,
        }
    }
}

/// Root configuration of a `wam_hal` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WamConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub safety: SafetyLimits,
    #[serde(default)]
    pub control: ControlConfig,
}

impl WamConfig {
    /// Configuration with every default and the given service name.
    pub fn with_service_name(name: &str) -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: name.to_string(),
            },
            bus: BusConfig::default(),
            device: DeviceConfig::default(),
            safety: SafetyLimits::default(),
            control: ControlConfig::default(),
        }
    }

    /// Semantic validation across tables.
    ///
    /// # Errors
    /// `ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.safety.validate()?;

        if self.bus.driver.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus.driver cannot be empty".to_string(),
            ));
        }
        if self.control.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "control.cycle_time_us must be positive".to_string(),
            ));
        }
        if self.bus.reply_timeout_us == 0 || self.bus.reply_timeout_us > self.control.cycle_time_us
        {
            return Err(ConfigError::ValidationError(format!(
                "bus.reply_timeout_us must be in 1..={}",
                self.control.cycle_time_us
            )));
        }
        if self.bus.retries > self.bus.cycle_retry_budget {
            return Err(ConfigError::ValidationError(
                "bus.retries exceeds bus.cycle_retry_budget".to_string(),
            ));
        }
        if let Some(cal) = &self.device.calibration {
            let dof = self.device.product.dof();
            if cal.len() != dof {
                return Err(ConfigError::ValidationError(format!(
                    "device.calibration has {} entries, product has {dof} joints",
                    cal.len()
                )));
            }
            if cal.iter().any(|q| !q.is_finite()) {
                return Err(ConfigError::ValidationError(
                    "device.calibration must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}
