//! Prelude module for common re-exports.
//!
//! ```rust
//! use wam_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, LogLevel, ProductKind, SafetyLimits, SharedConfig, WamConfig,
};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::WamError;

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::can::{BusError, CanBus, CanFrame};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::address::{Destination, GroupId, NodeId, TransportId};
pub use crate::protocol::mode::{DeviceMode, PuckMode, PuckStatus};
pub use crate::protocol::property::{Command, Property, PropertyFrame, PropertyId};
