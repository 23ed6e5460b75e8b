//! Node addressing.
//!
//! A transport identifier is a standard 11-bit CAN id laid out as:
//!
//! ```text
//!  10   9 ..... 5   4 ..... 0
//! [G] [  origin  ] [   dest  ]
//! ```
//!
//! `G` set means the destination field is a group id rather than a node id.
//! Encoding and decoding are pure shift/mask pairs.

use crate::consts::{MAX_NODE_ID, NODE_ID_BITS, TRANSPORT_ID_MASK};
use crate::error::WamError;
use std::fmt;

const GROUP_FLAG: u16 = 1 << (2 * NODE_ID_BITS);
const FIELD_MASK: u16 = MAX_NODE_ID as u16;

// ─── NodeId ─────────────────────────────────────────────────────────

/// Identifier of one node on the bus (5 bits of protocol space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u8);

impl NodeId {
    /// The host computer.
    pub const HOST: NodeId = NodeId(0);
    /// Reserved id of the safety module.
    pub const SAFETY_MODULE: NodeId = NodeId(10);
    /// Arm pucks in joint order.
    pub const ARM_PUCKS: [NodeId; 7] = [
        NodeId(1),
        NodeId(2),
        NodeId(3),
        NodeId(4),
        NodeId(5),
        NodeId(6),
        NodeId(7),
    ];
    /// Hand pucks F1, F2, F3, spread.
    pub const HAND_PUCKS: [NodeId; 4] = [NodeId(11), NodeId(12), NodeId(13), NodeId(14)];

    /// Validate a raw node id.
    ///
    /// # Errors
    /// `InvalidAddress` if `raw` does not fit in [`NODE_ID_BITS`].
    pub fn new(raw: u8) -> Result<Self, WamError> {
        if raw > MAX_NODE_ID {
            return Err(WamError::InvalidAddress {
                value: u16::from(raw),
                bits: NODE_ID_BITS,
            });
        }
        Ok(Self(raw))
    }

    /// Raw 5-bit value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Next node in bring-up order.
    ///
    /// Arm pucks 1..=6 and hand pucks 11..=13 advance by one. The last arm
    /// puck, the last hand puck and the safety module itself clamp to the
    /// safety module, as does any id outside those ranges.
    pub fn succ(self) -> NodeId {
        match self.0 {
            1..=6 | 11..=13 => NodeId(self.0 + 1),
            7 | 10 | 14 => Self::SAFETY_MODULE,
            other => {
                tracing::warn!(node = other, "increment of unknown node id, clamping to safety module");
                Self::SAFETY_MODULE
            }
        }
    }

    /// Returns `true` for the arm and hand motor controller ranges.
    pub const fn is_puck(self) -> bool {
        matches!(self.0, 1..=7 | 11..=14)
    }
}

impl TryFrom<u8> for NodeId {
    type Error = WamError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── GroupId ────────────────────────────────────────────────────────

/// Identifier of a broadcast group (shares the 5-bit destination field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u8);

impl GroupId {
    /// Every node on the bus.
    pub const BROADCAST: GroupId = GroupId(0);
    /// Upper-arm torque group (pucks 1-4).
    pub const UPPER_ARM: GroupId = GroupId(1);
    /// Forearm torque group (pucks 5-7).
    pub const FOREARM: GroupId = GroupId(2);
    /// Destination of every packed position reply.
    pub const POSITION: GroupId = GroupId(3);
    /// Upper-arm position query group.
    pub const UPPER_ARM_POSITION: GroupId = GroupId(4);
    /// Forearm position query group.
    pub const FOREARM_POSITION: GroupId = GroupId(5);
    /// Destination of every property reply.
    pub const PROPERTY: GroupId = GroupId(6);
    /// Hand torque group.
    pub const HAND: GroupId = GroupId(7);
    /// Hand position query group.
    pub const HAND_POSITION: GroupId = GroupId(8);

    /// Validate a raw group id.
    ///
    /// # Errors
    /// `InvalidAddress` if `raw` does not fit in [`NODE_ID_BITS`].
    pub fn new(raw: u8) -> Result<Self, WamError> {
        if raw > MAX_NODE_ID {
            return Err(WamError::InvalidAddress {
                value: u16::from(raw),
                bits: NODE_ID_BITS,
            });
        }
        Ok(Self(raw))
    }

    /// Raw 5-bit value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Destination ────────────────────────────────────────────────────

/// Destination field of a transport id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Node(NodeId),
    Group(GroupId),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Node(n) => write!(f, "node {n}"),
            Destination::Group(g) => write!(f, "group {g}"),
        }
    }
}

// ─── TransportId ────────────────────────────────────────────────────

/// 11-bit wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u16);

impl TransportId {
    /// Encode from already-validated ids. Total.
    pub const fn new(origin: NodeId, destination: Destination) -> Self {
        let (flag, dest) = match destination {
            Destination::Node(n) => (0, n.0),
            Destination::Group(g) => (GROUP_FLAG, g.0),
        };
        Self(flag | ((origin.0 as u16) << NODE_ID_BITS) | dest as u16)
    }

    /// Encode from raw integers.
    ///
    /// # Errors
    /// `InvalidAddress` if either id exceeds the 5-bit field.
    pub fn encode(origin: u8, destination: u8, group: bool) -> Result<Self, WamError> {
        let origin = NodeId::new(origin)?;
        let destination = if group {
            Destination::Group(GroupId::new(destination)?)
        } else {
            Destination::Node(NodeId::new(destination)?)
        };
        Ok(Self::new(origin, destination))
    }

    /// Accept a raw identifier received from the transport.
    ///
    /// # Errors
    /// `InvalidAddress` if bits above the 11-bit standard id are set.
    pub fn from_raw(raw: u16) -> Result<Self, WamError> {
        if raw & !TRANSPORT_ID_MASK != 0 {
            return Err(WamError::InvalidAddress {
                value: raw,
                bits: crate::consts::TRANSPORT_ID_BITS,
            });
        }
        Ok(Self(raw))
    }

    /// Raw wire value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_group(self) -> bool {
        self.0 & GROUP_FLAG != 0
    }

    pub const fn origin(self) -> NodeId {
        NodeId(((self.0 >> NODE_ID_BITS) & FIELD_MASK) as u8)
    }

    pub const fn destination(self) -> Destination {
        let dest = (self.0 & FIELD_MASK) as u8;
        if self.is_group() {
            Destination::Group(GroupId(dest))
        } else {
            Destination::Node(NodeId(dest))
        }
    }

    /// Id carried by a property reply from `origin`.
    pub const fn property_reply(origin: NodeId) -> Self {
        Self::new(origin, Destination::Group(GroupId::PROPERTY))
    }

    /// Id carried by a packed position reply from `origin`.
    pub const fn position_reply(origin: NodeId) -> Self {
        Self::new(origin, Destination::Group(GroupId::POSITION))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x} ({} -> {})", self.0, self.origin(), self.destination())
    }
}
