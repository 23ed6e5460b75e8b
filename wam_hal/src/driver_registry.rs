//! Bus driver registry.
//!
//! Maps driver names to factories that open a [`CanBus`]. Built at startup,
//! populated by [`crate::drivers::register_all`] and handed to
//! [`WamCore::init`](crate::core::WamCore::init). No global state.

use std::collections::HashMap;
use wam_common::can::CanBus;
use wam_common::config::WamConfig;
use wam_common::error::WamError;

/// Opens a bus from the configuration.
pub type BusFactory = fn(&WamConfig) -> Result<Box<dyn CanBus>, WamError>;

/// Registry of available bus drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, BusFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BusFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    pub fn get_factory(&self, name: &str) -> Option<BusFactory> {
        self.factories.get(name).copied()
    }

    /// Open a bus with the named driver.
    ///
    /// # Errors
    /// `DriverNotFound` if nothing is registered under `name`, or whatever
    /// the factory reports.
    pub fn create_bus(&self, name: &str, config: &WamConfig) -> Result<Box<dyn CanBus>, WamError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| WamError::DriverNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wam_common::can::{BusError, CanFrame};
    use wam_common::protocol::address::TransportId;

    struct NullBus;

    impl CanBus for NullBus {
        fn name(&self) -> &'static str {
            "null"
        }

        fn send(&mut self, _frame: &CanFrame) -> Result<(), BusError> {
            Ok(())
        }

        fn recv(&mut self, _timeout: Duration) -> Result<CanFrame, BusError> {
            Err(BusError::Timeout)
        }

        fn install_filter(&mut self, _id: TransportId) -> Result<(), BusError> {
            Ok(())
        }
    }

    fn create_null_bus(_config: &WamConfig) -> Result<Box<dyn CanBus>, WamError> {
        Ok(Box::new(NullBus))
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("null", create_null_bus);

        let bus = reg
            .create_bus("null", &WamConfig::with_service_name("test"))
            .expect("should create");
        assert_eq!(bus.name(), "null");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_bus("nonexistent", &WamConfig::with_service_name("test"));
        assert!(matches!(result, Err(WamError::DriverNotFound(name)) if name == "nonexistent"));
    }

    #[test]
    fn registry_list_drivers() {
        let mut reg = DriverRegistry::new();
        reg.register("alpha", create_null_bus);
        reg.register("beta", create_null_bus);

        let mut names = reg.list_drivers();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DriverRegistry::new();
        reg.register("dup", create_null_bus);
        reg.register("dup", create_null_bus);
    }
}
