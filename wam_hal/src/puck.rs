//! One motor controller node.
//!
//! A [`Puck`] caches what the device layer needs from its node (status,
//! mode, calibration constants, group membership) and runs the
//! request/reply protocol for property reads and writes. It never owns the
//! bus: every operation borrows the device's [`BusAccess`].
//!
//! Life cycle:
//!
//! ```text
//! RESET ──initialize_motor()──▶ READY/IDLE ──set_mode(X)──▶ READY/X
//!   ▲                               ▲                          │
//!   └──────────reset()──────────────┴────set_mode(IDLE)────────┘
//! ```

use crate::bus_access::{BusAccess, settle};
use std::f64::consts::TAU;
use tracing::{debug, info, warn};
use wam_common::can::CanFrame;
use wam_common::consts::MECH_COUNTS_PER_REV;
use wam_common::error::WamError;
use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
use wam_common::protocol::codec;
use wam_common::protocol::mode::{PuckMode, PuckStatus};
use wam_common::protocol::property::{Command, Property, PropertyId};

/// Cached state of one puck.
#[derive(Debug, Clone)]
pub struct Puck {
    id: NodeId,
    /// 1-based slot in a packed torque frame (PIDX).
    group_index: i32,
    counts_per_rev: i32,
    amps_per_nm: i32,
    /// GRPA, GRPB, GRPC.
    groups: [i32; 3],
    mode: PuckMode,
    status: PuckStatus,
}

impl Puck {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            group_index: 0,
            counts_per_rev: 0,
            amps_per_nm: 0,
            groups: [0; 3],
            mode: PuckMode::Idle,
            status: PuckStatus::Reset,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn group_index(&self) -> i32 {
        self.group_index
    }

    pub fn counts_per_rev(&self) -> i32 {
        self.counts_per_rev
    }

    pub fn amps_per_nm(&self) -> i32 {
        self.amps_per_nm
    }

    pub fn groups(&self) -> [i32; 3] {
        self.groups
    }

    /// Cached mode; see [`get_mode`](Self::get_mode) for the live value.
    pub fn mode(&self) -> PuckMode {
        self.mode
    }

    pub fn status(&self) -> PuckStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == PuckStatus::Ready
    }

    pub fn is_member_of(&self, group: GroupId) -> bool {
        group == GroupId::BROADCAST || self.groups.contains(&i32::from(group.get()))
    }

    // ─── Life cycle ─────────────────────────────────────────────────

    /// Bring the node to READY/IDLE and cache its constants.
    ///
    /// # Errors
    /// - `CommunicationError` if any query goes unanswered
    /// - `UnexpectedState` if the node is not READY after the wake sequence
    /// - `VerificationFailed` if the node refuses IDLE
    pub fn initialize_motor(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        self.status = PuckStatus::Reset;

        let status = self.query(bus, Property::Status)?;
        match PuckStatus::from_wire(status) {
            Some(PuckStatus::Ready) => {}
            Some(PuckStatus::Reset) => {
                info!(node = %self.id, "waking puck");
                self.write(bus, Property::Status, PuckStatus::Ready.wire(), false)?;
                settle(bus.policy().wake_delay);
                let status = self.query(bus, Property::Status)?;
                if status != PuckStatus::Ready.wire() {
                    return Err(WamError::UnexpectedState {
                        node: self.id,
                        expected: PuckStatus::Ready,
                        actual: status,
                    });
                }
            }
            None => {
                return Err(WamError::UnexpectedState {
                    node: self.id,
                    expected: PuckStatus::Ready,
                    actual: status,
                });
            }
        }

        self.write(bus, Property::Mode, PuckMode::Idle.wire(), true)?;
        self.mode = PuckMode::Idle;

        self.counts_per_rev = self.query(bus, Property::CountsPerRev)?;
        self.amps_per_nm = self.query(bus, Property::AmpsPerNm)?;
        self.group_index = self.query(bus, Property::PuckIndex)?;
        for (slot, property) in [Property::GroupA, Property::GroupB, Property::GroupC]
            .into_iter()
            .enumerate()
        {
            self.groups[slot] = self.query(bus, property)?;
        }

        self.status = PuckStatus::Ready;
        info!(
            node = %self.id,
            cts = self.counts_per_rev,
            ipnm = self.amps_per_nm,
            pidx = self.group_index,
            groups = ?self.groups,
            "puck initialized"
        );
        Ok(())
    }

    /// Command the node back to RESET. Only `initialize_motor` is valid
    /// afterwards.
    pub fn reset(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        // node reboots and does not answer
        self.write(bus, Property::Status, PuckStatus::Reset.wire(), false)?;
        self.status = PuckStatus::Reset;
        self.mode = PuckMode::Idle;
        info!(node = %self.id, "puck reset");
        Ok(())
    }

    /// Command READY and trust it, skipping the initialization queries.
    pub fn ready(&mut self, bus: &BusAccess) -> Result<(), WamError> {
        self.write(bus, Property::Status, PuckStatus::Ready.wire(), false)?;
        self.status = PuckStatus::Ready;
        Ok(())
    }

    /// Record a READY status observed by a caller-driven bring-up.
    pub(crate) fn mark_ready(&mut self) {
        self.status = PuckStatus::Ready;
    }

    /// Rewrite GRPB/GRPC so the node answers the torque and position groups
    /// its device addresses.
    pub fn ensure_membership(
        &mut self,
        bus: &BusAccess,
        torque: GroupId,
        position: GroupId,
    ) -> Result<(), WamError> {
        self.require_ready()?;
        for (slot, property, group) in [
            (1, Property::GroupB, torque),
            (2, Property::GroupC, position),
        ] {
            if self.is_member_of(group) {
                continue;
            }
            warn!(node = %self.id, %group, property = property.name(), "repairing group membership");
            let value = i32::from(group.get());
            self.write(bus, property, value, true)?;
            self.groups[slot] = value;
        }
        Ok(())
    }

    // ─── Properties ─────────────────────────────────────────────────

    /// Read one property.
    pub fn get_property(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
    ) -> Result<i32, WamError> {
        self.require_ready()?;
        self.query(bus, property)
    }

    /// Write one property, optionally reading it back.
    pub fn set_property(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
        value: i32,
        verify: bool,
    ) -> Result<(), WamError> {
        self.require_ready()?;
        self.write(bus, property, value, verify)
    }

    // ─── Mode ───────────────────────────────────────────────────────

    /// Change mode along an edge of the IDLE star.
    ///
    /// # Errors
    /// `InvalidModeTransition` for any other edge; the cached mode is left
    /// unchanged and nothing is sent.
    pub fn set_mode(&mut self, bus: &BusAccess, mode: PuckMode) -> Result<(), WamError> {
        self.require_ready()?;
        if !self.mode.can_transition(mode) {
            return Err(WamError::InvalidModeTransition {
                node: self.id,
                from: self.mode,
                to: mode,
                transitioned: Vec::new(),
            });
        }
        if self.mode == mode {
            return Ok(());
        }
        self.write(bus, Property::Mode, mode.wire(), true)?;
        debug!(node = %self.id, from = %self.mode, to = %mode, "mode changed");
        self.mode = mode;
        Ok(())
    }

    /// Query the live mode and refresh the cache.
    pub fn get_mode(&mut self, bus: &BusAccess) -> Result<PuckMode, WamError> {
        self.require_ready()?;
        let value = self.query(bus, Property::Mode)?;
        let mode = PuckMode::from_wire(value).ok_or(WamError::UnexpectedValue {
            node: self.id,
            property: Property::Mode.id(),
            value,
        })?;
        if mode != self.mode {
            warn!(node = %self.id, cached = %self.mode, live = %mode, "mode changed behind our back");
        }
        self.mode = mode;
        Ok(mode)
    }

    // ─── Position ───────────────────────────────────────────────────

    /// Overwrite the absolute encoder reference with `q` radians of motor
    /// angle. Does not command motion. Only the device calls this, inside
    /// its zeroing interlock.
    pub(crate) fn set_position(&self, bus: &BusAccess, q: f64) -> Result<(), WamError> {
        let cts = self.require_calibrated()?;
        let counts = (q * f64::from(cts) / TAU).floor() as i32;
        debug!(node = %self.id, q, counts, "overwriting encoder reference");
        self.write(bus, Property::Position, counts, false)
    }

    /// Motor angle in radians.
    pub fn get_position(&self, bus: &BusAccess) -> Result<f64, WamError> {
        let cts = self.require_calibrated()?;
        let counts = self.get_position_counts(bus)?;
        Ok(f64::from(counts) * TAU / f64::from(cts))
    }

    /// Raw encoder counts. Accepts either a packed position reply or a
    /// standard property reply.
    pub fn get_position_counts(&self, bus: &BusAccess) -> Result<i32, WamError> {
        self.require_ready()?;
        let frame = self.request_frame(Command::Get, Property::Position.id(), 0);
        let expected = Property::Position.id();
        bus.request(&frame, |reply| {
            if reply.id == TransportId::position_reply(self.id) {
                Some(codec::unpack_position_reply(reply.payload()))
            } else if reply.id == TransportId::property_reply(self.id) {
                self.decode_reply(reply, expected)
            } else {
                None
            }
        })
    }

    /// Absolute magnetic encoder reading, `0..4096`.
    pub fn get_mechanical_angle(&self, bus: &BusAccess) -> Result<i32, WamError> {
        self.require_ready()?;
        let mech = self.query(bus, Property::MechanicalAngle)?;
        Ok(mech.rem_euclid(MECH_COUNTS_PER_REV))
    }

    // ─── Exchanges ──────────────────────────────────────────────────

    fn require_ready(&self) -> Result<(), WamError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(WamError::NotInitialized { node: self.id })
        }
    }

    fn require_calibrated(&self) -> Result<i32, WamError> {
        self.require_ready()?;
        if self.counts_per_rev <= 0 {
            return Err(WamError::NotInitialized { node: self.id });
        }
        Ok(self.counts_per_rev)
    }

    fn request_frame(&self, command: Command, property: PropertyId, value: i32) -> CanFrame {
        let id = TransportId::new(NodeId::HOST, Destination::Node(self.id));
        CanFrame::new(id, codec::pack(command, property, value))
    }

    /// `None` for a stale echo of another property, which the exchange
    /// skips while it waits for the real reply.
    fn decode_reply(&self, reply: &CanFrame, expected: PropertyId) -> Option<Result<i32, WamError>> {
        let frame = match codec::unpack(reply.payload()) {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        if frame.property != expected || frame.command != Command::Set {
            debug!(node = %self.id, %expected, actual = %frame.property, "stale reply");
            return None;
        }
        Some(Ok(frame.value))
    }

    /// Unguarded GET round trip.
    pub(crate) fn query(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
    ) -> Result<i32, WamError> {
        let property = property.into();
        let frame = self.request_frame(Command::Get, property, 0);
        let reply_id = TransportId::property_reply(self.id);
        bus.request(&frame, |reply| {
            if reply.id == reply_id {
                self.decode_reply(reply, property)
            } else {
                None
            }
        })
    }

    /// Unguarded SET, with optional read-back.
    pub(crate) fn write(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
        value: i32,
        verify: bool,
    ) -> Result<(), WamError> {
        let property = property.into();
        bus.send(&self.request_frame(Command::Set, property, value))?;
        if !verify {
            return Ok(());
        }
        settle(bus.policy().verify_delay);
        let actual = self.query(bus, property)?;
        if actual != value {
            return Err(WamError::VerificationFailed {
                node: self.id,
                property,
                expected: value,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_access::ExchangePolicy;
    use crate::drivers::simulation::{SimHandle, SimNode, SimulatedBus};

    fn node(v: u8) -> NodeId {
        NodeId::new(v).unwrap()
    }

    fn rig() -> (BusAccess, SimHandle) {
        let sim = SimulatedBus::new().with_node(SimNode::puck(
            node(3),
            3,
            GroupId::UPPER_ARM,
            GroupId::UPPER_ARM_POSITION,
        ));
        let handle = sim.handle();
        let bus = BusAccess::new(Box::new(sim), ExchangePolicy::default().without_delays());
        (bus, handle)
    }

    fn ready_puck(bus: &BusAccess) -> Puck {
        let mut puck = Puck::new(node(3));
        puck.initialize_motor(bus).unwrap();
        puck
    }

    #[test]
    fn initialize_wakes_and_caches_constants() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        assert!(puck.is_ready());
        assert_eq!(puck.mode(), PuckMode::Idle);
        assert_eq!(puck.counts_per_rev(), 4096);
        assert_eq!(puck.group_index(), 3);
        assert_eq!(puck.groups(), [0, 1, 4]);
        assert_eq!(sim.property(node(3), Property::Status), Some(PuckStatus::Ready.wire()));
    }

    #[test]
    fn stuck_in_reset_is_unexpected_state() {
        let (bus, sim) = rig();
        sim.stall_in_reset(node(3));
        let mut puck = Puck::new(node(3));
        let err = puck.initialize_motor(&bus).unwrap_err();
        assert!(matches!(err, WamError::UnexpectedState { actual: 0, .. }));
        assert!(!puck.is_ready());
    }

    #[test]
    fn muted_node_is_communication_error() {
        let (bus, sim) = rig();
        sim.mute(node(3));
        let err = Puck::new(node(3)).initialize_motor(&bus).unwrap_err();
        assert!(matches!(err, WamError::CommunicationError { .. }));
        assert_eq!(err.node(), Some(node(3)));
    }

    #[test]
    fn operations_before_initialize_fail() {
        let (bus, _sim) = rig();
        let mut puck = Puck::new(node(3));
        assert!(matches!(
            puck.get_property(&bus, Property::Mode),
            Err(WamError::NotInitialized { .. })
        ));
        assert!(matches!(
            puck.set_mode(&bus, PuckMode::Torque),
            Err(WamError::NotInitialized { .. })
        ));
        assert!(puck.get_position(&bus).is_err());
    }

    #[test]
    fn reset_requires_reinitialization() {
        let (bus, sim) = rig();
        let mut puck = ready_puck(&bus);
        puck.reset(&bus).unwrap();
        assert_eq!(puck.status(), PuckStatus::Reset);
        assert!(matches!(
            puck.get_property(&bus, Property::CountsPerRev),
            Err(WamError::NotInitialized { .. })
        ));
        assert_eq!(sim.property(node(3), Property::Status), Some(0));
        puck.initialize_motor(&bus).unwrap();
        assert!(puck.is_ready());
    }

    #[test]
    fn verified_write_detects_rejection() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        puck.set_property(&bus, Property::TorqueWarning, 1234, true).unwrap();
        sim.reject_property(node(3), Property::TorqueWarning);
        let err = puck
            .set_property(&bus, Property::TorqueWarning, 99, true)
            .unwrap_err();
        assert!(matches!(
            err,
            WamError::VerificationFailed { expected: 99, actual: 1234, .. }
        ));
    }

    #[test]
    fn mode_follows_idle_star() {
        let (bus, sim) = rig();
        let mut puck = ready_puck(&bus);

        puck.set_mode(&bus, PuckMode::Idle).unwrap();
        puck.set_mode(&bus, PuckMode::Torque).unwrap();
        assert_eq!(sim.property(node(3), Property::Mode), Some(PuckMode::Torque.wire()));

        let err = puck.set_mode(&bus, PuckMode::Velocity).unwrap_err();
        assert!(matches!(
            err,
            WamError::InvalidModeTransition { from: PuckMode::Torque, to: PuckMode::Velocity, .. }
        ));
        assert_eq!(puck.mode(), PuckMode::Torque);
        assert_eq!(sim.property(node(3), Property::Mode), Some(PuckMode::Torque.wire()));

        puck.set_mode(&bus, PuckMode::Idle).unwrap();
        puck.set_mode(&bus, PuckMode::Trapezoidal).unwrap();
        assert_eq!(puck.get_mode(&bus).unwrap(), PuckMode::Trapezoidal);
    }

    #[test]
    fn get_mode_rejects_undefined_value() {
        let (bus, sim) = rig();
        let mut puck = ready_puck(&bus);
        sim.set_property(node(3), Property::Mode, 1);
        assert!(matches!(
            puck.get_mode(&bus),
            Err(WamError::UnexpectedValue { value: 1, .. })
        ));
    }

    #[test]
    fn position_round_trip_in_radians() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        puck.set_position(&bus, 1.0).unwrap();
        // floor(1.0 * 4096 / 2pi) = 651
        assert_eq!(sim.property(node(3), Property::Position), Some(651));
        let q = puck.get_position(&bus).unwrap();
        assert!((q - 1.0).abs() < TAU / 4096.0);

        puck.set_position(&bus, -0.5).unwrap();
        assert!(puck.get_position(&bus).unwrap() < 0.0);
    }

    #[test]
    fn stale_echo_is_skipped() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        sim.inject(CanFrame::new(
            TransportId::property_reply(node(3)),
            codec::pack(Command::Set, Property::Mode.id(), 0),
        ));
        assert_eq!(puck.get_property(&bus, Property::CountsPerRev).unwrap(), 4096);
    }

    #[test]
    fn unanswered_query_times_out_after_stale_echo() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        sim.mute(node(3));
        sim.inject(CanFrame::new(
            TransportId::property_reply(node(3)),
            codec::pack(Command::Set, Property::Mode.id(), 0),
        ));
        assert!(matches!(
            puck.get_property(&bus, Property::CountsPerRev),
            Err(WamError::CommunicationError { .. })
        ));
    }

    #[test]
    fn mechanical_angle_wraps() {
        let (bus, sim) = rig();
        let puck = ready_puck(&bus);
        sim.set_property(node(3), Property::MechanicalAngle, 4096 + 17);
        assert_eq!(puck.get_mechanical_angle(&bus).unwrap(), 17);
    }

    #[test]
    fn membership_is_repaired() {
        let (bus, sim) = rig();
        sim.set_property(node(3), Property::GroupC, 0);
        let mut puck = ready_puck(&bus);
        assert!(!puck.is_member_of(GroupId::UPPER_ARM_POSITION));
        puck.ensure_membership(&bus, GroupId::UPPER_ARM, GroupId::UPPER_ARM_POSITION)
            .unwrap();
        assert!(puck.is_member_of(GroupId::UPPER_ARM_POSITION));
        assert_eq!(sim.property(node(3), Property::GroupC), Some(4));
    }
}
