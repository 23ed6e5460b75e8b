//! Device composition.
//!
//! A [`Device`] is one arm or hand: its pucks, the groups that address them,
//! the safety module (arms only) and the joint transforms. It owns the bus
//! token for as long as it lives.
//!
//! # Zeroing interlock
//!
//! `set_positions` overwrites encoder references. The safety module would
//! read the jump as a velocity fault, so it is disabled first and re-enabled
//! after every puck has been attempted. A failed re-enable leaves the arm
//! unsupervised: the device latches [`DeviceState::Faulted`] and refuses
//! position and torque commands until `initialize` succeeds again.
//!
//! Raw `AP` writes through [`Device::set_property`] take the same path. The
//! bus token never leaves the device, so nothing else can reach an encoder.

pub mod layout;
pub mod transform;

use crate::bus_access::{BusAccess, settle};
use crate::group::Group;
use crate::puck::Puck;
use crate::safety::SafetyModule;
use layout::DeviceLayout;
use std::f64::consts::TAU;
use std::ops::Range;
use tracing::{error, info, warn};
use wam_common::config::SafetyLimits;
use wam_common::consts::{HAND_HI_COMMAND, MAX_PUCKS, MECH_COUNTS_PER_REV, NODE_ID_BITS, TORQUE_SLOTS};
use wam_common::error::WamError;
use wam_common::protocol::address::{NodeId, TransportId};
use wam_common::protocol::mode::{DeviceMode, PuckMode};
use wam_common::protocol::property::{Property, PropertyId};
use transform::JointTransforms;

/// Life-cycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Not yet (or not successfully) initialized.
    Uninitialized,
    /// Every puck READY, safety module supervising.
    Ready,
    /// Safety supervision lost; only re-initialization clears this.
    Faulted,
}

/// The pucks of one block and the groups that address them.
#[derive(Debug)]
struct DeviceBlock {
    torque: Group,
    position: Group,
    /// Index range into `Device::pucks` (and into joint vectors).
    range: Range<usize>,
}

pub struct Device {
    name: String,
    bus: BusAccess,
    safety: Option<SafetyModule>,
    /// Motor order, which is also joint order.
    pucks: Vec<Puck>,
    blocks: Vec<DeviceBlock>,
    transforms: JointTransforms,
    home_on_init: bool,
    tip_link: String,
    state: DeviceState,
}

impl Device {
    /// Build a device from a layout and take ownership of the bus.
    ///
    /// Installs the reply filters for every node. No traffic beyond that.
    ///
    /// # Errors
    /// - `LengthMismatch` if a block's pucks do not match its transform or
    ///   exceed a torque frame
    /// - `InvalidAddress` if a node appears twice
    /// - `CommunicationError` if a filter cannot be installed
    pub fn new(layout: DeviceLayout, bus: BusAccess, limits: SafetyLimits) -> Result<Self, WamError> {
        let transforms = layout.transforms();
        let mut seen = [false; MAX_PUCKS];
        let mut pucks = Vec::with_capacity(layout.dof());
        let mut blocks = Vec::with_capacity(layout.blocks.len());

        for block in &layout.blocks {
            let n = block.pucks.len();
            if n != block.transform.dim() {
                return Err(WamError::LengthMismatch {
                    expected: block.transform.dim(),
                    actual: n,
                });
            }
            if n == 0 || n > TORQUE_SLOTS {
                return Err(WamError::LengthMismatch {
                    expected: TORQUE_SLOTS,
                    actual: n,
                });
            }
            for node in &block.pucks {
                let slot = &mut seen[usize::from(node.get())];
                if *slot || *node == NodeId::SAFETY_MODULE {
                    return Err(WamError::InvalidAddress {
                        value: u16::from(node.get()),
                        bits: NODE_ID_BITS,
                    });
                }
                *slot = true;
            }

            let start = pucks.len();
            pucks.extend(block.pucks.iter().copied().map(Puck::new));
            blocks.push(DeviceBlock {
                torque: Group::new(block.torque_group, &block.pucks)?,
                position: Group::new(block.position_group, &block.pucks)?,
                range: start..pucks.len(),
            });
        }

        let safety = layout.safety_module.then(|| SafetyModule::new(limits));
        if let Some(sm) = &safety {
            bus.install_filter(TransportId::property_reply(sm.node()))?;
        }
        for puck in &pucks {
            bus.install_filter(TransportId::property_reply(puck.id()))?;
            bus.install_filter(TransportId::position_reply(puck.id()))?;
        }

        info!(
            device = %layout.name,
            tip = %layout.tip_link,
            dof = pucks.len(),
            groups = blocks.len(),
            safety = safety.is_some(),
            driver = bus.driver_name(),
            "device created"
        );

        Ok(Self {
            name: layout.name,
            bus,
            safety,
            pucks,
            blocks,
            transforms,
            home_on_init: layout.home_on_init,
            tip_link: layout.tip_link,
            state: DeviceState::Uninitialized,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dof(&self) -> usize {
        self.pucks.len()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn pucks(&self) -> &[Puck] {
        &self.pucks
    }

    pub fn puck(&self, node: NodeId) -> Option<&Puck> {
        self.pucks.iter().find(|p| p.id() == node)
    }

    pub fn safety(&self) -> Option<&SafetyModule> {
        self.safety.as_ref()
    }

    pub fn transforms(&self) -> &JointTransforms {
        &self.transforms
    }

    pub fn tip_link(&self) -> &str {
        &self.tip_link
    }

    /// Cap retries by the per-cycle budget until [`end_cycle`](Self::end_cycle).
    pub fn begin_cycle(&self) {
        self.bus.begin_cycle();
    }

    pub fn end_cycle(&self) {
        self.bus.end_cycle();
    }

    /// Give the bus back. The device is gone afterwards.
    pub fn release(self) -> BusAccess {
        info!(device = %self.name, "releasing bus");
        self.bus
    }

    // ─── Initialization ─────────────────────────────────────────────

    /// Bring up the safety module, then every puck. Hand fingers are then
    /// sent through HI.
    ///
    /// Every puck is attempted even after a failure, so pucks that did come
    /// up stay usable individually through [`get_property`](Self::get_property)
    /// and [`set_property`](Self::set_property).
    ///
    /// # Errors
    /// `PartialInitialization` naming the safety module, or the first puck
    /// in joint order that did not come up.
    pub fn initialize(&mut self) -> Result<(), WamError> {
        self.state = DeviceState::Uninitialized;
        info!(device = %self.name, "initializing");

        if let Some(sm) = &mut self.safety {
            sm.initialize(&self.bus)
                .map_err(|e| WamError::PartialInitialization {
                    node: sm.node(),
                    source: Box::new(e),
                })?;
        }

        let mut first_failure: Option<(NodeId, WamError)> = None;
        for block in &self.blocks {
            for puck in &mut self.pucks[block.range.clone()] {
                let result = puck.initialize_motor(&self.bus).and_then(|()| {
                    puck.ensure_membership(&self.bus, block.torque.id(), block.position.id())
                });
                if let Err(e) = result {
                    error!(device = %self.name, node = %puck.id(), error = %e, "puck did not come up");
                    first_failure.get_or_insert((puck.id(), e));
                }
            }
        }
        if let Some((node, source)) = first_failure {
            return Err(WamError::PartialInitialization {
                node,
                source: Box::new(source),
            });
        }

        for block in &mut self.blocks {
            let pucks = &self.pucks[block.range.clone()];
            block.torque.assign_torque_slots(|node| {
                pucks
                    .iter()
                    .find(|p| p.id() == node)
                    .map_or(0, Puck::group_index)
            });
        }

        if self.home_on_init {
            self.home()?;
        }

        self.state = DeviceState::Ready;
        info!(device = %self.name, "device ready");
        Ok(())
    }

    /// Send CMD=HI to every puck and wait for the fingers to settle.
    fn home(&self) -> Result<(), WamError> {
        info!(device = %self.name, "homing");
        for puck in &self.pucks {
            puck.set_property(&self.bus, Property::Command, HAND_HI_COMMAND, false)
                .map_err(|e| WamError::PartialInitialization {
                    node: puck.id(),
                    source: Box::new(e),
                })?;
        }
        settle(self.bus.policy().hand_settle);
        Ok(())
    }

    fn require_ready(&self) -> Result<(), WamError> {
        match self.state {
            DeviceState::Ready => Ok(()),
            DeviceState::Faulted => Err(WamError::Faulted),
            DeviceState::Uninitialized => {
                let node = self
                    .pucks
                    .iter()
                    .find(|p| !p.is_ready())
                    .or(self.pucks.first())
                    .map_or(NodeId::HOST, Puck::id);
                Err(WamError::NotInitialized { node })
            }
        }
    }

    fn check_dof(&self, actual: usize) -> Result<(), WamError> {
        if actual != self.pucks.len() {
            return Err(WamError::LengthMismatch {
                expected: self.pucks.len(),
                actual,
            });
        }
        Ok(())
    }

    fn find_puck(&self, node: NodeId) -> Result<&Puck, WamError> {
        self.puck(node).ok_or(WamError::InvalidAddress {
            value: u16::from(node.get()),
            bits: NODE_ID_BITS,
        })
    }

    // ─── Individual pucks ───────────────────────────────────────────

    /// Read a property of one puck, regardless of device state.
    pub fn get_property(&self, node: NodeId, property: impl Into<PropertyId>) -> Result<i32, WamError> {
        self.find_puck(node)?.get_property(&self.bus, property)
    }

    /// Write a property of one puck, regardless of device state.
    ///
    /// An `AP` write overwrites the encoder reference and runs inside the
    /// zeroing interlock, so it needs a supervising safety module (arms).
    pub fn set_property(
        &mut self,
        node: NodeId,
        property: impl Into<PropertyId>,
        value: i32,
        verify: bool,
    ) -> Result<(), WamError> {
        let property = property.into();
        if property != Property::Position.id() {
            return self
                .find_puck(node)?
                .set_property(&self.bus, property, value, verify);
        }
        self.find_puck(node)?;
        self.with_supervision_suspended(|dev| {
            dev.find_puck(node)?
                .set_property(&dev.bus, property, value, verify)
        })
    }

    // ─── Positions ──────────────────────────────────────────────────

    /// Joint positions in radians, one group query per block.
    pub fn get_positions(&self) -> Result<Vec<f64>, WamError> {
        self.require_ready()?;
        let mut joints = Vec::with_capacity(self.dof());
        for (i, block) in self.blocks.iter().enumerate() {
            let cts: Vec<i32> = self.pucks[block.range.clone()]
                .iter()
                .map(Puck::counts_per_rev)
                .collect();
            let motor = block.position.get_positions(&self.bus, &cts)?;
            joints.extend(self.transforms.motor_to_joint_block(i, &motor)?);
        }
        Ok(joints)
    }

    /// Overwrite every encoder reference so the arm reads `joints`.
    ///
    /// Runs inside the zeroing interlock. Every puck is attempted; the
    /// first per-puck failure is returned after the safety module is back.
    ///
    /// # Errors
    /// - `NonFiniteJoint` before anything is sent
    /// - `Faulted` if the safety module could not be re-enabled
    pub fn set_positions(&mut self, joints: &[f64]) -> Result<(), WamError> {
        self.check_dof(joints.len())?;
        self.require_ready()?;
        require_finite(joints)?;
        let motor = self.transforms.joint_to_motor_positions(joints)?;

        self.with_supervision_suspended(|dev| {
            let mut first_error = None;
            for (i, (puck, q)) in dev.pucks.iter().zip(&motor).enumerate() {
                if i > 0 {
                    settle(dev.bus.policy().zeroing_pace);
                }
                if let Err(e) = puck.set_position(&dev.bus, *q) {
                    warn!(device = %dev.name, node = %puck.id(), error = %e, "encoder overwrite failed");
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        })?;

        info!(device = %self.name, ?joints, "encoder references set");
        Ok(())
    }

    /// Run `overwrite` with velocity supervision off, then turn it back on.
    ///
    /// A failed disable writes nothing. A failed re-enable latches
    /// `Faulted` and takes precedence over the error from `overwrite`.
    fn with_supervision_suspended(
        &mut self,
        overwrite: impl FnOnce(&Self) -> Result<(), WamError>,
    ) -> Result<(), WamError> {
        if self.state == DeviceState::Faulted {
            return Err(WamError::Faulted);
        }
        if let Some(sm) = &mut self.safety {
            if !sm.puck().is_ready() {
                return Err(WamError::NotInitialized { node: sm.node() });
            }
            if let Err(e) = sm.disable(&self.bus) {
                // the mask may or may not have changed
                return match sm.enable(&self.bus) {
                    Ok(()) => Err(e),
                    Err(enable_err) => {
                        error!(device = %self.name, error = %enable_err, "safety module unrecoverable");
                        self.state = DeviceState::Faulted;
                        Err(WamError::Faulted)
                    }
                };
            }
        }

        let result = overwrite(&*self);

        if let Some(sm) = &mut self.safety {
            if let Err(e) = sm.enable(&self.bus) {
                error!(device = %self.name, error = %e, "safety module not re-enabled after zeroing");
                self.state = DeviceState::Faulted;
                return Err(WamError::Faulted);
            }
        }
        result
    }

    /// Absolute joint offsets from the magnetic encoders.
    pub fn position_offsets(&self) -> Result<Vec<f64>, WamError> {
        self.require_ready()?;
        let motor = self
            .pucks
            .iter()
            .map(|p| {
                p.get_mechanical_angle(&self.bus)
                    .map(|mech| f64::from(mech) * TAU / f64::from(MECH_COUNTS_PER_REV))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.transforms.motor_to_joint_positions(&motor)
    }

    /// Joint travel per motor revolution.
    pub fn resolver_ranges(&self) -> Vec<f64> {
        self.transforms.resolver_ranges()
    }

    // ─── Torques ────────────────────────────────────────────────────

    /// Command joint torques (Nm): one packed frame per torque group, no
    /// reply. Every frame is packed before the first one is sent.
    pub fn set_torques(&self, joints: &[f64]) -> Result<(), WamError> {
        self.check_dof(joints.len())?;
        self.require_ready()?;
        require_finite(joints)?;
        let motor = self.transforms.joint_to_motor_torques(joints)?;
        let frames = self
            .blocks
            .iter()
            .map(|block| {
                let currents: Vec<i32> = self.pucks[block.range.clone()]
                    .iter()
                    .zip(&motor[block.range.clone()])
                    .map(|(puck, torque)| (torque * f64::from(puck.amps_per_nm())).round() as i32)
                    .collect();
                block.torque.torque_frame(&currents)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for frame in &frames {
            self.bus.send(frame)?;
        }
        Ok(())
    }

    // ─── Mode ───────────────────────────────────────────────────────

    /// Move every puck to `mode`, stopping at the first refusal.
    ///
    /// # Errors
    /// - `InvalidModeTransition` naming the refusing node and the nodes
    ///   already moved
    /// - `ModeTransitionAborted` on a bus failure partway through
    /// - `Faulted` when asked for an active mode on a faulted device
    pub fn set_mode(&mut self, mode: PuckMode) -> Result<(), WamError> {
        if self.state == DeviceState::Faulted && mode.is_active() {
            return Err(WamError::Faulted);
        }
        let mut transitioned = Vec::with_capacity(self.pucks.len());
        for puck in &mut self.pucks {
            match puck.set_mode(&self.bus, mode) {
                Ok(()) => transitioned.push(puck.id()),
                Err(WamError::InvalidModeTransition { node, from, to, .. }) => {
                    warn!(device = %self.name, %node, %from, %to, moved = transitioned.len(), "mode change refused");
                    return Err(WamError::InvalidModeTransition {
                        node,
                        from,
                        to,
                        transitioned,
                    });
                }
                Err(e) => {
                    error!(device = %self.name, node = %puck.id(), error = %e, "mode change aborted");
                    return Err(WamError::ModeTransitionAborted {
                        node: puck.id(),
                        transitioned,
                        source: Box::new(e),
                    });
                }
            }
        }
        info!(device = %self.name, %mode, "mode set");
        Ok(())
    }

    /// `Idle` if any puck is idle, else `Activated`.
    pub fn get_mode(&mut self) -> Result<DeviceMode, WamError> {
        let mut any_idle = false;
        for puck in &mut self.pucks {
            any_idle |= puck.get_mode(&self.bus)? == PuckMode::Idle;
        }
        Ok(if any_idle {
            DeviceMode::Idle
        } else {
            DeviceMode::Activated
        })
    }

    // ─── Safety thresholds ──────────────────────────────────────────

    fn safety_mut(safety: &mut Option<SafetyModule>) -> Result<&mut SafetyModule, WamError> {
        safety.as_mut().ok_or(WamError::NotInitialized {
            node: NodeId::SAFETY_MODULE,
        })
    }

    pub fn set_velocity_warning(&mut self, value: i32) -> Result<(), WamError> {
        Self::safety_mut(&mut self.safety)?.set_velocity_warning(&self.bus, value)
    }

    pub fn set_velocity_fault(&mut self, value: i32) -> Result<(), WamError> {
        Self::safety_mut(&mut self.safety)?.set_velocity_fault(&self.bus, value)
    }

    pub fn set_torque_warning(&mut self, value: i32) -> Result<(), WamError> {
        Self::safety_mut(&mut self.safety)?.set_torque_warning(&self.bus, value)
    }

    pub fn set_torque_fault(&mut self, value: i32) -> Result<(), WamError> {
        Self::safety_mut(&mut self.safety)?.set_torque_fault(&self.bus, value)
    }
}

fn require_finite(joints: &[f64]) -> Result<(), WamError> {
    match joints.iter().position(|q| !q.is_finite()) {
        Some(index) => Err(WamError::NonFiniteJoint {
            index,
            value: joints[index],
        }),
        None => Ok(()),
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("pucks", &self.pucks.iter().map(Puck::id).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_access::ExchangePolicy;
    use crate::drivers::simulation::{SimHandle, SimulatedBus};
    use layout::PuckBlock;
    use transform::BlockTransform;
    use wam_common::config::ProductKind;
    use wam_common::protocol::address::GroupId;

    fn device(product: ProductKind) -> (Device, SimHandle) {
        let sim = SimulatedBus::for_product(product);
        let handle = sim.handle();
        let bus = BusAccess::new(Box::new(sim), ExchangePolicy::default().without_delays());
        let dev = Device::new(DeviceLayout::for_product(product), bus, SafetyLimits::default()).unwrap();
        (dev, handle)
    }

    #[test]
    fn new_installs_reply_filters() {
        let (dev, sim) = device(ProductKind::Wam4);
        assert_eq!(dev.dof(), 4);
        assert_eq!(dev.state(), DeviceState::Uninitialized);
        let filters = sim.filters();
        assert!(filters.contains(&TransportId::property_reply(NodeId::SAFETY_MODULE)));
        for node in &NodeId::ARM_PUCKS[..4] {
            assert!(filters.contains(&TransportId::property_reply(*node)));
            assert!(filters.contains(&TransportId::position_reply(*node)));
        }
    }

    #[test]
    fn new_rejects_block_wider_than_transform() {
        let layout = DeviceLayout::custom(
            "bad",
            vec![PuckBlock {
                torque_group: GroupId::UPPER_ARM,
                position_group: GroupId::UPPER_ARM_POSITION,
                pucks: NodeId::ARM_PUCKS[..3].to_vec(),
                transform: BlockTransform::scaled_identity(2, 1.0),
            }],
            false,
        );
        let bus = BusAccess::new(Box::new(SimulatedBus::new()), ExchangePolicy::default());
        assert!(matches!(
            Device::new(layout, bus, SafetyLimits::default()),
            Err(WamError::LengthMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn new_rejects_duplicate_pucks() {
        let block = |pucks: &[NodeId]| PuckBlock {
            torque_group: GroupId::UPPER_ARM,
            position_group: GroupId::UPPER_ARM_POSITION,
            pucks: pucks.to_vec(),
            transform: BlockTransform::scaled_identity(pucks.len(), 1.0),
        };
        let p = NodeId::ARM_PUCKS;
        let layout = DeviceLayout::custom("dup", vec![block(&p[..2]), block(&p[1..3])], false);
        let bus = BusAccess::new(Box::new(SimulatedBus::new()), ExchangePolicy::default());
        assert!(matches!(
            Device::new(layout, bus, SafetyLimits::default()),
            Err(WamError::InvalidAddress { value: 2, .. })
        ));
    }

    #[test]
    fn commands_refused_before_initialize() {
        let (mut dev, _sim) = device(ProductKind::Wam4);
        assert!(matches!(
            dev.get_positions(),
            Err(WamError::NotInitialized { .. })
        ));
        assert!(matches!(
            dev.set_torques(&[0.0; 4]),
            Err(WamError::NotInitialized { .. })
        ));
        assert!(matches!(
            dev.set_positions(&[0.0; 4]),
            Err(WamError::NotInitialized { .. })
        ));
    }

    #[test]
    fn initialize_brings_every_puck_up() {
        let (mut dev, sim) = device(ProductKind::Wam7);
        dev.initialize().unwrap();
        assert_eq!(dev.state(), DeviceState::Ready);
        assert!(dev.pucks().iter().all(Puck::is_ready));
        assert!(dev.safety().is_some_and(SafetyModule::is_enabled));
        for node in NodeId::ARM_PUCKS {
            assert_eq!(sim.property(node, Property::Status), Some(2));
            assert_eq!(sim.property(node, Property::Mode), Some(0));
        }
    }

    #[test]
    fn torques_are_scaled_by_amps_per_nm() {
        let (mut dev, sim) = device(ProductKind::BarrettHand);
        dev.initialize().unwrap();
        // hand: jtrq2mtrq = -I, IPNM = 2000
        dev.set_torques(&[0.5, -0.25, 0.0, 1.0]).unwrap();
        let currents: Vec<_> = NodeId::HAND_PUCKS
            .iter()
            .map(|n| sim.last_torque(*n))
            .collect();
        assert_eq!(currents, vec![Some(-1000), Some(500), Some(0), Some(-2000)]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let (mut dev, _sim) = device(ProductKind::Wam4);
        dev.initialize().unwrap();
        assert!(matches!(
            dev.set_torques(&[0.0; 3]),
            Err(WamError::LengthMismatch { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            dev.set_positions(&[0.0; 7]),
            Err(WamError::LengthMismatch { expected: 4, actual: 7 })
        ));
    }

    #[test]
    fn hand_has_no_safety_thresholds() {
        let (mut dev, _sim) = device(ProductKind::BarrettHand);
        dev.initialize().unwrap();
        assert!(dev.safety().is_none());
        assert!(matches!(
            dev.set_velocity_fault(9000),
            Err(WamError::NotInitialized { node }) if node == NodeId::SAFETY_MODULE
        ));
    }

    #[test]
    fn threshold_setters_reach_the_safety_module() {
        let (mut dev, sim) = device(ProductKind::Wam4);
        dev.initialize().unwrap();
        dev.set_velocity_warning(3000).unwrap();
        dev.set_torque_fault(7000).unwrap();
        assert_eq!(sim.property(NodeId::SAFETY_MODULE, Property::VelocityWarning), Some(3000));
        assert_eq!(sim.property(NodeId::SAFETY_MODULE, Property::TorqueFault), Some(7000));
    }

    #[test]
    fn get_mode_reports_idle_if_any_puck_idle() {
        let (mut dev, sim) = device(ProductKind::Wam4);
        dev.initialize().unwrap();
        dev.set_mode(PuckMode::Torque).unwrap();
        assert_eq!(dev.get_mode().unwrap(), DeviceMode::Activated);
        sim.set_property(NodeId::ARM_PUCKS[2], Property::Mode, PuckMode::Idle.wire());
        assert_eq!(dev.get_mode().unwrap(), DeviceMode::Idle);
    }

    #[test]
    fn position_offsets_use_mechanical_angle() {
        let (mut dev, sim) = device(ProductKind::BarrettHand);
        dev.initialize().unwrap();
        sim.set_property(NodeId::HAND_PUCKS[0], Property::MechanicalAngle, 1024);
        let offsets = dev.position_offsets().unwrap();
        let expected = dev.transforms().motor_to_joint_positions(&[TAU / 4.0, 0.0, 0.0, 0.0]).unwrap();
        for (a, b) in offsets.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
