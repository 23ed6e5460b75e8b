//! Device-layer error taxonomy.
//!
//! Every failure carries the node or group it concerns so the caller can
//! decide between retrying a single exchange and re-initializing the device.
//! Group and mode-transition errors may follow partial side effects and are
//! never retried wholesale.

use crate::can::bus::BusError;
use crate::config::ConfigError;
use crate::protocol::address::{Destination, GroupId, NodeId};
use crate::protocol::mode::{PuckMode, PuckStatus};
use crate::protocol::property::PropertyId;
use thiserror::Error;

/// Errors raised by the protocol and device layers.
#[derive(Debug, Clone, Error)]
pub enum WamError {
    /// An id does not fit its protocol field.
    #[error("address {value} exceeds the {bits}-bit field")]
    InvalidAddress { value: u16, bits: u32 },

    /// Payload length matches no valid encoding.
    #[error("malformed frame ({len} bytes): {reason}")]
    MalformedFrame { len: usize, reason: &'static str },

    /// No usable reply within the retry budget.
    #[error("communication with {target} failed: {source}")]
    CommunicationError {
        target: Destination,
        #[source]
        source: BusError,
    },

    /// A group query collected fewer replies than members.
    #[error("group {group}: no reply from node(s) {}", node_list(.missing))]
    IncompleteGroupReply { group: GroupId, missing: Vec<NodeId> },

    /// A verified write read back a different value.
    #[error("node {node}: {property} verification failed (wrote {expected}, read {actual})")]
    VerificationFailed {
        node: NodeId,
        property: PropertyId,
        expected: i32,
        actual: i32,
    },

    /// A mode change outside the IDLE star.
    ///
    /// `transitioned` lists nodes a device-wide change had already moved
    /// before the rejection; empty for a single puck.
    #[error(
        "node {node}: invalid mode transition {from} -> {to} (already transitioned: [{}])",
        node_list(.transitioned)
    )]
    InvalidModeTransition {
        node: NodeId,
        from: PuckMode,
        to: PuckMode,
        transitioned: Vec<NodeId>,
    },

    /// A device-wide mode change stopped on a bus failure.
    #[error(
        "node {node}: mode change aborted (already transitioned: [{}]): {source}",
        node_list(.transitioned)
    )]
    ModeTransitionAborted {
        node: NodeId,
        transitioned: Vec<NodeId>,
        #[source]
        source: Box<WamError>,
    },

    /// Operation on a puck that has not completed `initialize_motor`.
    #[error("node {node} is not initialized")]
    NotInitialized { node: NodeId },

    /// Device bring-up stopped at the first node that did not come up.
    #[error("initialization failed at node {node}: {source}")]
    PartialInitialization {
        node: NodeId,
        #[source]
        source: Box<WamError>,
    },

    /// The device lost safety supervision and refuses motion.
    #[error("device is faulted; re-initialize before commanding it")]
    Faulted,

    /// A node reported a status other than the one required.
    #[error("node {node}: expected status {expected}, got {actual}")]
    UnexpectedState {
        node: NodeId,
        expected: PuckStatus,
        actual: i32,
    },

    /// A reply echoed a different property than the one requested.
    #[error("node {node}: expected reply for {expected}, got {actual}")]
    UnexpectedProperty {
        node: NodeId,
        expected: PropertyId,
        actual: PropertyId,
    },

    /// A property read back a value outside its defined set.
    #[error("node {node}: {property} has undefined value {value}")]
    UnexpectedValue {
        node: NodeId,
        property: PropertyId,
        value: i32,
    },

    /// A joint value is NaN or infinite.
    #[error("joint {index} is not finite ({value})")]
    NonFiniteJoint { index: usize, value: f64 },

    /// A joint or motor vector has the wrong length.
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The control loop latched a fatal error.
    #[error("control loop halted: {0}")]
    Halted(Box<WamError>),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bus driver not found: {0}")]
    DriverNotFound(String),
}

impl WamError {
    /// Wrap a transport failure for the exchange addressed to `target`.
    pub fn communication(target: Destination, source: BusError) -> Self {
        WamError::CommunicationError { target, source }
    }

    /// Node the error is about, where there is exactly one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            WamError::CommunicationError {
                target: Destination::Node(n),
                ..
            } => Some(*n),
            WamError::VerificationFailed { node, .. }
            | WamError::InvalidModeTransition { node, .. }
            | WamError::ModeTransitionAborted { node, .. }
            | WamError::NotInitialized { node }
            | WamError::PartialInitialization { node, .. }
            | WamError::UnexpectedState { node, .. }
            | WamError::UnexpectedProperty { node, .. }
            | WamError::UnexpectedValue { node, .. } => Some(*node),
            _ => None,
        }
    }
}

fn node_list(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(NodeId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::property::Property;

    fn n(v: u8) -> NodeId {
        NodeId::new(v).unwrap()
    }

    #[test]
    fn incomplete_reply_names_missing_nodes() {
        let e = WamError::IncompleteGroupReply {
            group: GroupId::UPPER_ARM_POSITION,
            missing: vec![n(2), n(4)],
        };
        assert_eq!(e.to_string(), "group 4: no reply from node(s) 2, 4");
    }

    #[test]
    fn communication_error_carries_target_node() {
        let e = WamError::communication(Destination::Node(n(3)), BusError::Timeout);
        assert_eq!(e.node(), Some(n(3)));
        assert!(e.to_string().contains("node 3"));
    }

    #[test]
    fn verification_message_uses_mnemonic() {
        let e = WamError::VerificationFailed {
            node: NodeId::SAFETY_MODULE,
            property: Property::VelocityFault.id(),
            expected: 8000,
            actual: 0,
        };
        assert_eq!(
            e.to_string(),
            "node 10: VL2 verification failed (wrote 8000, read 0)"
        );
    }

    #[test]
    fn non_finite_joint_names_the_index() {
        let e = WamError::NonFiniteJoint {
            index: 2,
            value: f64::NAN,
        };
        assert_eq!(e.to_string(), "joint 2 is not finite (NaN)");
        assert_eq!(e.node(), None);
    }

    #[test]
    fn config_error_converts() {
        let e: WamError = ConfigError::FileNotFound.into();
        assert!(matches!(e, WamError::Config(ConfigError::FileNotFound)));
        assert_eq!(e.node(), None);
    }
}
