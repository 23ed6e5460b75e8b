//! CAN transport boundary.

pub mod bus;
pub mod frame;

pub use bus::{BusError, CanBus};
pub use frame::CanFrame;
