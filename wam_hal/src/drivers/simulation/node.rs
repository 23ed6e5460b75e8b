//! Firmware model of one simulated node.

use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use wam_common::can::CanFrame;
use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
use wam_common::protocol::codec;
use wam_common::protocol::mode::{PuckMode, PuckStatus};
use wam_common::protocol::property::{Command, Property};

/// A puck or safety module on the simulated segment.
#[derive(Debug, Clone)]
pub struct SimNode {
    id: NodeId,
    properties: HashMap<u8, i32>,
    /// Last current received in a packed torque frame.
    torque: Option<i32>,
    pub(super) faults: NodeFaults,
}

/// Injected misbehaviour.
#[derive(Debug, Clone, Default)]
pub(super) struct NodeFaults {
    /// Answers nothing.
    pub muted: bool,
    /// Accepts STAT=READY but stays in RESET.
    pub stall_in_reset: bool,
    /// Ignores queries addressed to a group.
    pub skip_group_queries: bool,
    /// Writes to these properties are silently dropped.
    pub rejected: HashSet<u8>,
    /// Writes of exactly these (property, value) pairs are dropped.
    pub rejected_values: HashSet<(u8, i32)>,
    /// Frames addressed to this node are never acknowledged.
    pub unreachable: bool,
}

impl SimNode {
    /// A motor puck in RESET, answering `torque` and `position` groups.
    pub fn puck(id: NodeId, puck_index: i32, torque: GroupId, position: GroupId) -> Self {
        let properties = HashMap::from([
            (Property::Status as u8, PuckStatus::Reset.wire()),
            (Property::Mode as u8, PuckMode::Idle.wire()),
            (Property::CountsPerRev as u8, 4096),
            (Property::AmpsPerNm as u8, 2000),
            (Property::PuckIndex as u8, puck_index),
            (Property::GroupA as u8, i32::from(GroupId::BROADCAST.get())),
            (Property::GroupB as u8, i32::from(torque.get())),
            (Property::GroupC as u8, i32::from(position.get())),
            (Property::Position as u8, 0),
            (Property::MechanicalAngle as u8, 0),
        ]);
        Self {
            id,
            properties,
            torque: None,
            faults: NodeFaults::default(),
        }
    }

    /// The safety module, READY from power-up.
    pub fn safety_module() -> Self {
        let properties = HashMap::from([
            (Property::Status as u8, PuckStatus::Ready.wire()),
            (Property::IgnoreFault as u8, 0),
        ]);
        Self {
            id: NodeId::SAFETY_MODULE,
            properties,
            torque: None,
            faults: NodeFaults::default(),
        }
    }

    /// Override one property.
    pub fn with_property(mut self, property: Property, value: i32) -> Self {
        self.properties.insert(property as u8, value);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn property(&self, property: Property) -> Option<i32> {
        self.properties.get(&(property as u8)).copied()
    }

    pub(super) fn set_property(&mut self, property: Property, value: i32) {
        self.properties.insert(property as u8, value);
    }

    pub fn last_torque(&self) -> Option<i32> {
        self.torque
    }

    fn status(&self) -> PuckStatus {
        self.properties
            .get(&(Property::Status as u8))
            .and_then(|v| PuckStatus::from_wire(*v))
            .unwrap_or(PuckStatus::Reset)
    }

    fn is_member_of(&self, group: GroupId) -> bool {
        group == GroupId::BROADCAST
            || [Property::GroupA, Property::GroupB, Property::GroupC]
                .iter()
                .any(|p| self.property(*p) == Some(i32::from(group.get())))
    }

    /// Process one frame from the host and return the replies.
    pub(super) fn handle(&mut self, frame: &CanFrame) -> Vec<CanFrame> {
        let to_group = match frame.id.destination() {
            Destination::Node(n) if n == self.id => false,
            Destination::Group(g) if self.is_member_of(g) => true,
            _ => return Vec::new(),
        };
        if self.faults.muted {
            return Vec::new();
        }

        let data = frame.payload();
        if codec::is_set_frame(data) {
            if to_group {
                if let Ok(currents) = codec::unpack_torques(data) {
                    self.apply_torque(&currents);
                    return Vec::new();
                }
            }
            if let Ok(write) = codec::unpack(data) {
                self.write(write.property.get(), write.value);
            }
            return Vec::new();
        }

        if to_group && self.faults.skip_group_queries {
            return Vec::new();
        }
        let Ok(query) = codec::unpack(data) else {
            return Vec::new();
        };
        let property = query.property.get();
        if self.status() == PuckStatus::Reset && property != Property::Status as u8 {
            trace!(node = %self.id, property, "query ignored in RESET");
            return Vec::new();
        }

        let value = self.properties.get(&property).copied().unwrap_or(0);
        let reply = if to_group && property == Property::Position as u8 {
            CanFrame::new(
                TransportId::position_reply(self.id),
                codec::pack_position_reply(value),
            )
        } else {
            CanFrame::new(
                TransportId::property_reply(self.id),
                codec::pack(Command::Set, query.property, value),
            )
        };
        vec![reply]
    }

    fn apply_torque(&mut self, currents: &[i32; 4]) {
        let pidx = self.property(Property::PuckIndex).unwrap_or(0);
        if let Some(current) = usize::try_from(pidx - 1).ok().and_then(|slot| currents.get(slot)) {
            self.torque = Some(*current);
        }
    }

    fn write(&mut self, property: u8, value: i32) {
        if self.faults.rejected.contains(&property)
            || self.faults.rejected_values.contains(&(property, value))
        {
            debug!(node = %self.id, property, value, "write rejected");
            return;
        }
        let status = Property::Status as u8;
        if self.status() == PuckStatus::Reset && property != status {
            return;
        }
        if property == status {
            let next = match PuckStatus::from_wire(value) {
                Some(PuckStatus::Ready) if self.faults.stall_in_reset => PuckStatus::Reset,
                Some(s) => s,
                None => return,
            };
            if next == PuckStatus::Reset {
                self.properties
                    .insert(Property::Mode as u8, PuckMode::Idle.wire());
            }
            self.properties.insert(status, next.wire());
            return;
        }
        self.properties.insert(property, value);
    }
}
