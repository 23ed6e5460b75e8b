//! Round-trip laws for addressing and the property codec.

use proptest::prelude::*;
use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
use wam_common::protocol::codec;
use wam_common::protocol::property::{Command, PropertyId, ValueWidth};

fn node() -> impl Strategy<Value = NodeId> {
    (0u8..32).prop_map(|v| NodeId::new(v).unwrap())
}

fn destination() -> impl Strategy<Value = Destination> {
    prop_oneof![
        (0u8..32).prop_map(|v| Destination::Node(NodeId::new(v).unwrap())),
        (0u8..32).prop_map(|v| Destination::Group(GroupId::new(v).unwrap())),
    ]
}

/// Property ids without a fixed wire width.
fn free_property() -> impl Strategy<Value = PropertyId> {
    (0u8..0x80)
        .prop_filter("fixed-width property", |v| ![26, 28, 30].contains(v))
        .prop_map(|v| PropertyId::new(v).unwrap())
}

proptest! {
    #[test]
    fn address_round_trip(origin in node(), dest in destination()) {
        let id = TransportId::new(origin, dest);
        prop_assert!(id.raw() <= 0x7FF);
        prop_assert_eq!(id.origin(), origin);
        prop_assert_eq!(id.destination(), dest);
        prop_assert_eq!(TransportId::from_raw(id.raw()).unwrap(), id);
    }

    #[test]
    fn raw_encode_rejects_out_of_range(origin in 32u8.., dest in 0u8..32) {
        prop_assert!(TransportId::encode(origin, dest, false).is_err());
        prop_assert!(TransportId::encode(dest, origin, true).is_err());
    }

    #[test]
    fn codec_round_trip(property in free_property(), value in any::<i32>()) {
        let payload = codec::pack(Command::Set, property, value);
        prop_assert_eq!(payload.len(), 2 + ValueWidth::minimal(value).bytes());
        prop_assert!(codec::is_set_frame(&payload));

        let frame = codec::unpack(&payload).unwrap();
        prop_assert_eq!(frame.command, Command::Set);
        prop_assert_eq!(frame.property, property);
        prop_assert_eq!(frame.value, value);
    }

    #[test]
    fn full_width_round_trip(property in free_property(), value in any::<i32>()) {
        let payload = codec::pack_full(Command::Set, property, value);
        prop_assert_eq!(payload.len(), 6);
        prop_assert_eq!(codec::unpack(&payload).unwrap().value, value);
    }

    #[test]
    fn get_round_trip(property in free_property()) {
        let frame = codec::unpack(&codec::pack(Command::Get, property, 0)).unwrap();
        prop_assert_eq!(frame.command, Command::Get);
        prop_assert_eq!(frame.property, property);
    }

    #[test]
    fn position_reply_round_trip(counts in codec::POSITION_MIN..=codec::POSITION_MAX) {
        let payload = codec::pack_position_reply(counts);
        prop_assert_eq!(codec::unpack_position_reply(&payload).unwrap(), counts);
    }

    #[test]
    fn torque_round_trip(currents in prop::array::uniform4(codec::TORQUE_MIN..=codec::TORQUE_MAX)) {
        let payload = codec::pack_torques(&currents);
        prop_assert_eq!(codec::unpack_torques(&payload).unwrap(), currents);
    }
}
