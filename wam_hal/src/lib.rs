//! # WAM HAL Library
//!
//! Device layer for Barrett WAM arms and BH8-280 hands. Pucks, groups and
//! the safety module are driven over one CAN bus through a serialized
//! [`BusAccess`](bus_access::BusAccess); a [`Device`](device::Device)
//! composes them and [`WamCore`](core::WamCore) runs the control loop.
//!
//! # Module Structure
//!
//! - [`bus_access`] - one exchange at a time, retries and cycle budget
//! - [`puck`] - one motor controller node
//! - [`group`] - group broadcast and reply demultiplexing
//! - [`safety`] - safety module thresholds and fault mask
//! - [`device`] - device composition, layouts and joint transforms
//! - [`core`] - WamCore, control loop management
//! - [`driver_registry`] - bus driver factory registration
//! - [`drivers`] - bus driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        wam_hal                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────────────────┐  │
//! │  │ Command/Pos  │◄──►│   WamCore    │◄──►│  Driver Registry   │  │
//! │  │    ports     │    │ (cyclic loop)│    │                    │  │
//! │  └──────────────┘    └──────┬───────┘    └─────────┬──────────┘  │
//! │                             ▼                      │             │
//! │                   ┌───────────────────┐            │             │
//! │                   │      Device       │            │             │
//! │                   │ Safety·Group·Puck │            │             │
//! │                   └─────────┬─────────┘            │             │
//! │                             ▼                      ▼             │
//! │                   ┌───────────────────┐   ┌────────────────┐     │
//! │                   │    BusAccess      │──►│ CanBus (trait) │     │
//! │                   └───────────────────┘   └────────────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod bus_access;
pub mod core;
pub mod device;
pub mod driver_registry;
pub mod drivers;
pub mod group;
pub mod puck;
pub mod safety;

// Re-export key types for convenience
pub use crate::bus_access::{BusAccess, ExchangePolicy};
pub use crate::core::{CommandPort, JointCommand, PositionPort, WamCore};
pub use crate::device::{Device, DeviceState};
pub use crate::driver_registry::DriverRegistry;
