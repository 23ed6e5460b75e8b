//! Broadcast groups.
//!
//! A [`Group`] addresses an ordered set of pucks with one destination code.
//! Member order is significant: `values[i]` of a broadcast write and of a
//! broadcast read always belong to `members[i]`. The node-to-index lookup
//! is built once at construction; replies are placed by their origin, never
//! by arrival order.

use crate::bus_access::BusAccess;
use std::f64::consts::TAU;
use tracing::{debug, warn};
use wam_common::can::CanFrame;
use wam_common::consts::{MAX_PUCKS, TORQUE_SLOTS};
use wam_common::error::WamError;
use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
use wam_common::protocol::codec;
use wam_common::protocol::mode::PuckStatus;
use wam_common::protocol::property::{Command, Property, PropertyId};

/// One member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub node: NodeId,
    /// Slot in a packed torque frame, known once the puck reported PIDX.
    pub torque_slot: Option<usize>,
}

/// An addressable, ordered set of pucks.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    members: Vec<GroupMember>,
    index: [Option<u8>; MAX_PUCKS],
}

impl Group {
    /// # Errors
    /// `InvalidAddress` if a node appears twice.
    pub fn new(id: GroupId, nodes: &[NodeId]) -> Result<Self, WamError> {
        let mut index = [None; MAX_PUCKS];
        for (i, node) in nodes.iter().enumerate() {
            let entry = &mut index[usize::from(node.get())];
            if entry.is_some() {
                return Err(WamError::InvalidAddress {
                    value: u16::from(node.get()),
                    bits: wam_common::consts::NODE_ID_BITS,
                });
            }
            // MAX_PUCKS members at most, so the index fits a u8
            *entry = Some(i as u8);
        }
        let members = nodes
            .iter()
            .map(|&node| GroupMember {
                node,
                torque_slot: None,
            })
            .collect();
        Ok(Self { id, members, index })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of `node` in member order.
    pub fn member_index(&self, node: NodeId) -> Option<usize> {
        self.index[usize::from(node.get())].map(usize::from)
    }

    /// Record the packed-torque slot of each member from its 1-based puck
    /// index. Members with an index outside `1..=4` get no slot.
    pub fn assign_torque_slots(&mut self, puck_index: impl Fn(NodeId) -> i32) {
        for member in &mut self.members {
            let pidx = puck_index(member.node);
            member.torque_slot = usize::try_from(pidx - 1)
                .ok()
                .filter(|slot| *slot < TORQUE_SLOTS);
            if member.torque_slot.is_none() {
                warn!(group = %self.id, node = %member.node, pidx, "puck index outside torque frame");
            }
        }
    }

    fn frame(&self, payload: codec::Payload) -> CanFrame {
        CanFrame::new(
            TransportId::new(NodeId::HOST, Destination::Group(self.id)),
            payload,
        )
    }

    fn check_len(&self, actual: usize) -> Result<(), WamError> {
        if actual != self.members.len() {
            return Err(WamError::LengthMismatch {
                expected: self.members.len(),
                actual,
            });
        }
        Ok(())
    }

    // ─── Writes ─────────────────────────────────────────────────────

    /// Write one value per member.
    ///
    /// Torque is packed into a single frame by torque slot. Any other
    /// property goes out as one group frame when all values agree, and as
    /// one addressed frame per member otherwise.
    pub fn broadcast_set(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
        values: &[i32],
    ) -> Result<(), WamError> {
        let property = property.into();
        self.check_len(values.len())?;

        if property == Property::Torque.id() {
            return bus.send(&self.torque_frame(values)?);
        }

        match values.split_first() {
            None => Ok(()),
            Some((first, rest)) if rest.iter().all(|v| v == first) => {
                self.set_property(bus, property, *first)
            }
            Some(_) => {
                debug!(group = %self.id, %property, "non-uniform values, writing members individually");
                for (member, value) in self.members.iter().zip(values) {
                    let id = TransportId::new(NodeId::HOST, Destination::Node(member.node));
                    bus.send(&CanFrame::new(id, codec::pack(Command::Set, property, *value)))?;
                }
                Ok(())
            }
        }
    }

    /// Pack one current per member into a torque frame, by torque slot.
    ///
    /// # Errors
    /// `NotInitialized` naming a member without a slot.
    pub fn torque_frame(&self, currents: &[i32]) -> Result<CanFrame, WamError> {
        self.check_len(currents.len())?;
        let mut slots = [0i32; TORQUE_SLOTS];
        for (member, value) in self.members.iter().zip(currents) {
            let slot = member
                .torque_slot
                .ok_or(WamError::NotInitialized { node: member.node })?;
            slots[slot] = *value;
        }
        Ok(self.frame(codec::pack_torques(&slots)))
    }

    /// Write the same value to every member with one frame.
    pub fn set_property(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
        value: i32,
    ) -> Result<(), WamError> {
        bus.send(&self.frame(codec::pack(Command::Set, property.into(), value)))
    }

    // ─── Reads ──────────────────────────────────────────────────────

    /// Query every member with one frame and return the values in member
    /// order.
    ///
    /// Position queries are answered with packed position replies; every
    /// other property with standard replies. Replies from non-members,
    /// duplicates and undecodable replies are logged and dropped.
    ///
    /// # Errors
    /// `IncompleteGroupReply` naming every member that did not answer.
    pub fn broadcast_get(
        &self,
        bus: &BusAccess,
        property: impl Into<PropertyId>,
    ) -> Result<Vec<i32>, WamError> {
        let property = property.into();
        let mut values: Vec<Option<i32>> = vec![None; self.members.len()];
        let request = self.frame(codec::pack(Command::Get, property, 0));

        bus.collect(&request, self.members.len(), |reply| {
            let origin = reply.id.origin();
            let Some(i) = self.member_index(origin) else {
                warn!(group = %self.id, %origin, frame = %reply, "reply from non-member");
                return false;
            };
            if values[i].is_some() {
                warn!(group = %self.id, %origin, "duplicate reply");
                return false;
            }
            match self.decode(reply, property) {
                Ok(v) => {
                    values[i] = Some(v);
                    true
                }
                Err(e) => {
                    warn!(group = %self.id, %origin, error = %e, "dropping undecodable reply");
                    false
                }
            }
        })?;

        let missing: Vec<NodeId> = self
            .members
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(m, _)| m.node)
            .collect();
        if !missing.is_empty() {
            return Err(WamError::IncompleteGroupReply {
                group: self.id,
                missing,
            });
        }
        Ok(values.into_iter().flatten().collect())
    }

    fn decode(&self, reply: &CanFrame, property: PropertyId) -> Result<i32, WamError> {
        let origin = reply.id.origin();
        if reply.id == TransportId::position_reply(origin) && property == Property::Position.id() {
            return codec::unpack_position_reply(reply.payload());
        }
        if reply.id != TransportId::property_reply(origin) {
            return Err(WamError::MalformedFrame {
                len: reply.payload().len(),
                reason: "not a reply destination",
            });
        }
        let frame = codec::unpack(reply.payload())?;
        if frame.property != property || frame.command != Command::Set {
            return Err(WamError::UnexpectedProperty {
                node: origin,
                expected: property,
                actual: frame.property,
            });
        }
        Ok(frame.value)
    }

    /// Member motor angles in radians.
    pub fn get_positions(&self, bus: &BusAccess, counts_per_rev: &[i32]) -> Result<Vec<f64>, WamError> {
        self.check_len(counts_per_rev.len())?;
        let counts = self.broadcast_get(bus, Property::Position)?;
        counts
            .iter()
            .zip(counts_per_rev)
            .zip(&self.members)
            .map(|((&c, &cts), member)| {
                if cts <= 0 {
                    return Err(WamError::NotInitialized { node: member.node });
                }
                Ok(f64::from(c) * TAU / f64::from(cts))
            })
            .collect()
    }

    /// Member statuses; undefined status values are reported as errors.
    pub fn status(&self, bus: &BusAccess) -> Result<Vec<PuckStatus>, WamError> {
        let raw = self.broadcast_get(bus, Property::Status)?;
        raw.iter()
            .zip(&self.members)
            .map(|(&value, member)| {
                PuckStatus::from_wire(value).ok_or(WamError::UnexpectedValue {
                    node: member.node,
                    property: Property::Status.id(),
                    value,
                })
            })
            .collect()
    }
}
