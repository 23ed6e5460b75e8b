//! Puck mode and status.
//!
//! A puck moves through `RESET -> READY` once per power cycle. While READY
//! its mode follows a star around IDLE: any active mode is entered from
//! IDLE and left back to IDLE, never directly to another active mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Life-cycle status reported by the STAT property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PuckStatus {
    Reset,
    Ready,
}

impl PuckStatus {
    pub const fn wire(self) -> i32 {
        match self {
            PuckStatus::Reset => 0,
            PuckStatus::Ready => 2,
        }
    }

    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(PuckStatus::Reset),
            2 => Some(PuckStatus::Ready),
            _ => None,
        }
    }
}

impl fmt::Display for PuckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PuckStatus::Reset => f.write_str("RESET"),
            PuckStatus::Ready => f.write_str("READY"),
        }
    }
}

/// Control mode reported by the MODE property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuckMode {
    Idle,
    Torque,
    /// PID position hold.
    Position,
    Velocity,
    Trapezoidal,
}

impl PuckMode {
    pub const fn wire(self) -> i32 {
        match self {
            PuckMode::Idle => 0,
            PuckMode::Torque => 2,
            PuckMode::Position => 3,
            PuckMode::Velocity => 4,
            PuckMode::Trapezoidal => 5,
        }
    }

    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(PuckMode::Idle),
            2 => Some(PuckMode::Torque),
            3 => Some(PuckMode::Position),
            4 => Some(PuckMode::Velocity),
            5 => Some(PuckMode::Trapezoidal),
            _ => None,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, PuckMode::Idle)
    }

    /// Whether `self -> to` is an edge of the mode state machine.
    ///
    /// IDLE to IDLE is accepted as a no-op.
    pub const fn can_transition(self, to: PuckMode) -> bool {
        matches!((self, to), (PuckMode::Idle, _) | (_, PuckMode::Idle))
    }
}

impl fmt::Display for PuckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PuckMode::Idle => "IDLE",
            PuckMode::Torque => "TORQUE",
            PuckMode::Position => "POSITION",
            PuckMode::Velocity => "VELOCITY",
            PuckMode::Trapezoidal => "TRAPEZOIDAL",
        };
        f.write_str(s)
    }
}

/// Aggregate mode of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// At least one puck is idle.
    Idle,
    /// Every puck is in an active mode.
    Activated,
}
