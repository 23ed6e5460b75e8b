//! Safety module.
//!
//! A [`Puck`] core plus the thresholds and the fault mask of the node that
//! supervises velocity and torque. Writing the fault mask is how the device
//! layer brackets encoder zeroing: the module must not see the jump in
//! absolute position as a velocity fault.

use crate::bus_access::BusAccess;
use crate::puck::Puck;
use tracing::{info, warn};
use wam_common::config::SafetyLimits;
use wam_common::error::WamError;
use wam_common::protocol::address::NodeId;
use wam_common::protocol::mode::PuckStatus;
use wam_common::protocol::property::Property;

/// Fault mask value that supervises everything.
pub const FAULTS_ENABLED: i32 = 1;
/// Fault mask value that ignores velocity faults.
pub const FAULTS_IGNORE_VELOCITY: i32 = 8;

#[derive(Debug, Clone)]
pub struct SafetyModule {
    puck: Puck,
    limits: SafetyLimits,
    enabled: bool,
}

impl SafetyModule {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            puck: Puck::new(NodeId::SAFETY_MODULE),
            limits,
            enabled: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.puck.id()
    }

    pub fn puck(&self) -> &Puck {
        &self.puck
    }

    pub fn limits(&self) -> SafetyLimits {
        self.limits
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the module is READY, write the thresholds and enable it.
    ///
    /// # Errors
    /// `UnexpectedState` if the module is not READY; `VerificationFailed`
    /// if a threshold does not read back.
    pub fn initialize(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        let status = self.puck.query(bus, Property::Status)?;
        if status != PuckStatus::Ready.wire() {
            return Err(WamError::UnexpectedState {
                node: self.node(),
                expected: PuckStatus::Ready,
                actual: status,
            });
        }
        self.puck.mark_ready();

        let limits = self.limits;
        self.set_velocity_warning(bus, limits.velocity_warning)?;
        self.set_velocity_fault(bus, limits.velocity_fault)?;
        self.set_torque_warning(bus, limits.torque_warning)?;
        self.set_torque_fault(bus, limits.torque_fault)?;
        self.enable(bus)?;
        info!(?limits, "safety module initialized");
        Ok(())
    }

    pub fn set_velocity_warning(&mut self, bus: &BusAccess, value: i32) -> Result<(), WamError> {
        self.puck.set_property(bus, Property::VelocityWarning, value, true)?;
        self.limits.velocity_warning = value;
        Ok(())
    }

    pub fn set_velocity_fault(&mut self, bus: &BusAccess, value: i32) -> Result<(), WamError> {
        self.puck.set_property(bus, Property::VelocityFault, value, true)?;
        self.limits.velocity_fault = value;
        Ok(())
    }

    pub fn set_torque_warning(&mut self, bus: &BusAccess, value: i32) -> Result<(), WamError> {
        self.puck.set_property(bus, Property::TorqueWarning, value, true)?;
        self.limits.torque_warning = value;
        Ok(())
    }

    /// The module does not echo the torque fault threshold, so this write
    /// is not verified.
    pub fn set_torque_fault(&mut self, bus: &BusAccess, value: i32) -> Result<(), WamError> {
        self.puck.set_property(bus, Property::TorqueFault, value, false)?;
        self.limits.torque_fault = value;
        Ok(())
    }

    /// Write the fault mask (verified).
    pub fn ignore_fault(&mut self, bus: &BusAccess, fault_code: i32) -> Result<(), WamError> {
        self.puck
            .set_property(bus, Property::IgnoreFault, fault_code, true)
    }

    /// Supervise all faults.
    pub fn enable(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        self.ignore_fault(bus, FAULTS_ENABLED)?;
        self.enabled = true;
        Ok(())
    }

    /// Stop supervising velocity. The module counts as disabled even if the
    /// write fails, since its state is then unknown.
    pub fn disable(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        self.enabled = false;
        self.ignore_fault(bus, FAULTS_IGNORE_VELOCITY).inspect_err(|e| {
            warn!(error = %e, "failed to disable safety module");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_access::ExchangePolicy;
    use crate::drivers::simulation::{SimHandle, SimNode, SimulatedBus};

    fn rig() -> (BusAccess, SimHandle) {
        let sim = SimulatedBus::new().with_node(SimNode::safety_module());
        let handle = sim.handle();
        (
            BusAccess::new(Box::new(sim), ExchangePolicy::default().without_delays()),
            handle,
        )
    }

    #[test]
    fn initialize_writes_limits_and_enables() {
        let (bus, sim) = rig();
        let mut sm = SafetyModule::new(SafetyLimits::default());
        sm.initialize(&bus).unwrap();
        assert!(sm.is_enabled());
        let sm_id = NodeId::SAFETY_MODULE;
        assert_eq!(sim.property(sm_id, Property::VelocityWarning), Some(4000));
        assert_eq!(sim.property(sm_id, Property::VelocityFault), Some(8000));
        assert_eq!(sim.property(sm_id, Property::TorqueWarning), Some(4000));
        assert_eq!(sim.property(sm_id, Property::TorqueFault), Some(8000));
        assert_eq!(sim.property(sm_id, Property::IgnoreFault), Some(FAULTS_ENABLED));
    }

    #[test]
    fn initialize_requires_ready() {
        let (bus, sim) = rig();
        sim.set_property(NodeId::SAFETY_MODULE, Property::Status, PuckStatus::Reset.wire());
        let mut sm = SafetyModule::new(SafetyLimits::default());
        assert!(matches!(
            sm.initialize(&bus),
            Err(WamError::UnexpectedState { actual: 0, .. })
        ));
    }

    #[test]
    fn torque_fault_is_not_verified() {
        let (bus, sim) = rig();
        sim.reject_property(NodeId::SAFETY_MODULE, Property::TorqueFault);
        let mut sm = SafetyModule::new(SafetyLimits::default());
        sm.initialize(&bus).unwrap();
        assert_eq!(sm.limits().torque_fault, 8000);

        sim.reject_property(NodeId::SAFETY_MODULE, Property::VelocityFault);
        assert!(matches!(
            sm.set_velocity_fault(&bus, 9000),
            Err(WamError::VerificationFailed { .. })
        ));
        assert_eq!(sm.limits().velocity_fault, 8000);
    }

    #[test]
    fn enable_and_disable_toggle_mask() {
        let (bus, sim) = rig();
        let mut sm = SafetyModule::new(SafetyLimits::default());
        sm.initialize(&bus).unwrap();

        sm.disable(&bus).unwrap();
        assert!(!sm.is_enabled());
        assert_eq!(
            sim.property(NodeId::SAFETY_MODULE, Property::IgnoreFault),
            Some(FAULTS_IGNORE_VELOCITY)
        );

        sim.reject_property(NodeId::SAFETY_MODULE, Property::IgnoreFault);
        assert!(sm.enable(&bus).is_err());
        assert!(!sm.is_enabled());
    }
}
