//! Bus driver implementations.
//!
//! - [`simulation`] - in-process CAN segment emulating puck firmware
//! - `socketcan` - Linux raw CAN socket (cargo feature `socketcan`)
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement [`CanBus`](wam_common::can::CanBus) and a
//!    [`BusFactory`](crate::driver_registry::BusFactory)
//! 3. Register the factory in [`register_all`]

pub mod simulation;
#[cfg(feature = "socketcan")]
pub mod socketcan;

use crate::driver_registry::DriverRegistry;

/// Register every built-in driver.
pub fn register_all(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_bus);
    #[cfg(feature = "socketcan")]
    registry.register("socketcan", socketcan::create_bus);
}
