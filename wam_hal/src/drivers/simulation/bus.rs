//! Simulated CAN segment.
//!
//! [`SimulatedBus`] implements [`CanBus`] over a set of [`SimNode`]s.
//! Sending a frame runs it through every node immediately; the replies are
//! queued for `recv`, which never blocks. A cloneable [`SimHandle`] shares
//! the segment state so tests can inject faults and inspect what the host
//! sent while the bus itself is owned by the device layer.

use super::node::SimNode;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use wam_common::can::{BusError, CanBus, CanFrame};
use wam_common::config::ProductKind;
use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
use wam_common::protocol::codec;
use wam_common::protocol::property::{Property, PropertyId};

#[derive(Default)]
struct SimState {
    nodes: BTreeMap<NodeId, SimNode>,
    rx: VecDeque<CanFrame>,
    filters: Vec<TransportId>,
    /// Origin order imposed on the replies to one host frame.
    reply_order: Option<Vec<NodeId>>,
    /// Every frame the host sent, in order.
    sent: Vec<CanFrame>,
    closed: bool,
}

impl SimState {
    fn accepts(&self, id: TransportId) -> bool {
        self.filters.is_empty() || self.filters.contains(&id)
    }
}

/// Firmware-emulating CAN segment.
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    /// Empty segment.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Segment populated the way a product ships: pucks in RESET, the safety
    /// module (arms only) READY.
    pub fn for_product(product: ProductKind) -> Self {
        let puck = |id: u8, pidx: i32, torque: GroupId, position: GroupId| {
            NodeId::new(id).map(|id| SimNode::puck(id, pidx, torque, position))
        };
        let mut nodes = Vec::new();
        match product {
            ProductKind::Wam4 | ProductKind::Wam7 => {
                nodes.push(Ok(SimNode::safety_module()));
                for id in 1..=4u8 {
                    nodes.push(puck(id, i32::from(id), GroupId::UPPER_ARM, GroupId::UPPER_ARM_POSITION));
                }
                if product == ProductKind::Wam7 {
                    for id in 5..=7u8 {
                        nodes.push(puck(id, i32::from(id) - 4, GroupId::FOREARM, GroupId::FOREARM_POSITION));
                    }
                }
            }
            ProductKind::BarrettHand => {
                for id in 11..=14u8 {
                    nodes.push(puck(id, i32::from(id) - 10, GroupId::HAND, GroupId::HAND_POSITION));
                }
            }
        }
        nodes
            .into_iter()
            .flatten()
            .fold(Self::new(), |bus, node| bus.with_node(node))
    }

    /// Add or replace a node.
    pub fn with_node(self, node: SimNode) -> Self {
        self.state.lock().nodes.insert(node.id(), node);
        self
    }

    /// Shared handle for fault injection and inspection.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CanBus for SimulatedBus {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(BusError::Closed);
        }
        if let Destination::Node(node) = frame.id.destination() {
            if state.nodes.get(&node).is_some_and(|n| n.faults.unreachable) {
                return Err(BusError::Io(format!("no acknowledge from node {node}")));
            }
        }
        trace!(%frame, "host -> bus");
        state.sent.push(frame.clone());

        let mut replies: Vec<CanFrame> = state
            .nodes
            .values_mut()
            .flat_map(|node| node.handle(frame))
            .collect();
        if let Some(order) = &state.reply_order {
            let rank = |f: &CanFrame| {
                order
                    .iter()
                    .position(|n| *n == f.id.origin())
                    .unwrap_or(order.len())
            };
            replies.sort_by_key(rank);
        }
        for reply in replies {
            if state.accepts(reply.id) {
                state.rx.push_back(reply);
            }
        }
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<CanFrame, BusError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        state.rx.pop_front().ok_or(BusError::Timeout)
    }

    fn install_filter(&mut self, id: TransportId) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if !state.filters.contains(&id) {
            state.filters.push(id);
        }
        Ok(())
    }
}

/// Test-side view of a [`SimulatedBus`].
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&mut SimNode) -> R) -> Option<R> {
        self.state.lock().nodes.get_mut(&node).map(f)
    }

    // ─── Fault injection ────────────────────────────────────────────

    /// Node stops answering anything.
    pub fn mute(&self, node: NodeId) {
        self.with_node(node, |n| n.faults.muted = true);
    }

    pub fn unmute(&self, node: NodeId) {
        self.with_node(node, |n| n.faults.muted = false);
    }

    /// Node accepts STAT=READY but never leaves RESET.
    pub fn stall_in_reset(&self, node: NodeId) {
        self.with_node(node, |n| n.faults.stall_in_reset = true);
    }

    /// Node ignores group queries but still answers direct ones.
    pub fn skip_group_queries(&self, node: NodeId) {
        self.with_node(node, |n| n.faults.skip_group_queries = true);
    }

    /// Writes of `property` to `node` are silently dropped.
    pub fn reject_property(&self, node: NodeId, property: Property) {
        self.with_node(node, |n| n.faults.rejected.insert(property as u8));
    }

    pub fn accept_property(&self, node: NodeId, property: Property) {
        self.with_node(node, |n| n.faults.rejected.remove(&(property as u8)));
    }

    /// Only writes of `value` to `property` are dropped.
    pub fn reject_value(&self, node: NodeId, property: Property, value: i32) {
        self.with_node(node, |n| n.faults.rejected_values.insert((property as u8, value)));
    }

    /// Sends addressed to `node` fail at the transport.
    pub fn unreachable(&self, node: NodeId) {
        self.with_node(node, |n| n.faults.unreachable = true);
    }

    /// Deliver replies to each host frame in this origin order.
    pub fn reply_order(&self, order: Vec<NodeId>) {
        self.state.lock().reply_order = Some(order);
    }

    /// Queue a frame for the host as if a node had sent it. Subject to the
    /// installed filters.
    pub fn inject(&self, frame: CanFrame) {
        let mut state = self.state.lock();
        if state.accepts(frame.id) {
            state.rx.push_back(frame);
        }
    }

    /// Every further send and receive fails with `BusError::Closed`.
    pub fn disconnect(&self) {
        self.state.lock().closed = true;
    }

    // ─── Inspection ─────────────────────────────────────────────────

    pub fn property(&self, node: NodeId, property: Property) -> Option<i32> {
        self.with_node(node, |n| n.property(property)).flatten()
    }

    pub fn set_property(&self, node: NodeId, property: Property, value: i32) {
        self.with_node(node, |n| n.set_property(property, value));
    }

    pub fn last_torque(&self, node: NodeId) -> Option<i32> {
        self.with_node(node, |n| n.last_torque()).flatten()
    }

    /// Frames sent by the host since the last [`clear_sent`](Self::clear_sent).
    pub fn sent(&self) -> Vec<CanFrame> {
        self.state.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Property writes sent by the host, in order. Packed torque frames are
    /// not included.
    pub fn writes(&self) -> Vec<(Destination, PropertyId, i32)> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|f| codec::is_set_frame(f.payload()))
            .filter_map(|f| {
                codec::unpack(f.payload())
                    .ok()
                    .map(|w| (f.id.destination(), w.property, w.value))
            })
            .collect()
    }

    /// Installed acceptance filters.
    pub fn filters(&self) -> Vec<TransportId> {
        self.state.lock().filters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wam_common::protocol::property::Command;

    #[test]
    fn product_segments() {
        let wam7 = SimulatedBus::for_product(ProductKind::Wam7).handle();
        assert_eq!(wam7.property(NodeId::SAFETY_MODULE, Property::Status), Some(2));
        let n7 = NodeId::new(7).unwrap();
        assert_eq!(wam7.property(n7, Property::PuckIndex), Some(3));
        assert_eq!(wam7.property(n7, Property::GroupC), Some(5));

        let hand = SimulatedBus::for_product(ProductKind::BarrettHand).handle();
        assert_eq!(hand.property(NodeId::SAFETY_MODULE, Property::Status), None);
        assert_eq!(hand.property(NodeId::new(14).unwrap(), Property::PuckIndex), Some(4));
    }

    #[test]
    fn filters_drop_unlisted_replies() {
        let mut bus = SimulatedBus::for_product(ProductKind::Wam4);
        let sm = NodeId::SAFETY_MODULE;
        let query = CanFrame::new(
            TransportId::new(NodeId::HOST, Destination::Node(sm)),
            codec::pack(Command::Get, Property::Status.id(), 0),
        );

        bus.install_filter(TransportId::property_reply(NodeId::new(1).unwrap()))
            .unwrap();
        bus.send(&query).unwrap();
        assert_eq!(bus.recv(Duration::ZERO), Err(BusError::Timeout));

        bus.install_filter(TransportId::property_reply(sm)).unwrap();
        bus.send(&query).unwrap();
        let reply = bus.recv(Duration::ZERO).unwrap();
        assert_eq!(reply.id.origin(), sm);
    }

    #[test]
    fn disconnect_closes_both_directions() {
        let mut bus = SimulatedBus::new();
        let handle = bus.handle();
        handle.disconnect();
        assert_eq!(bus.recv(Duration::ZERO), Err(BusError::Closed));
        let frame = CanFrame::from_slice(TransportId::from_raw(1).unwrap(), &[5]).unwrap();
        assert_eq!(bus.send(&frame), Err(BusError::Closed));
    }
}
