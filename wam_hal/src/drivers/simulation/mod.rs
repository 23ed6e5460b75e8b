//! Simulation bus driver.
//!
//! Emulates puck and safety-module firmware on an in-process CAN segment
//! for development and testing without hardware.

mod bus;
mod node;

pub use bus::{SimHandle, SimulatedBus};
pub use node::SimNode;

use wam_common::can::CanBus;
use wam_common::config::WamConfig;
use wam_common::error::WamError;

/// Factory: a segment populated for the configured product.
pub fn create_bus(config: &WamConfig) -> Result<Box<dyn CanBus>, WamError> {
    Ok(Box::new(SimulatedBus::for_product(config.device.product)))
}
