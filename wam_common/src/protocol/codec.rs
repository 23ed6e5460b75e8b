//! Payload codec.
//!
//! Three payload shapes travel on the bus:
//!
//! | Frame | Layout |
//! |-------|--------|
//! | property GET | `[id]` |
//! | property SET / reply | `[0x80 \| id, 0x00, value LE (1, 2 or 4 bytes)]` |
//! | packed position reply | `[0x80 \| hi6, mid, lo]` (22-bit two's complement) |
//! | packed torque | `[0x80 \| TORQ, 4 x 14-bit two's complement, big-endian]` |
//!
//! The set flag is the top bit of the first byte in every shape, so
//! [`is_set_frame`] never needs a full decode.

use crate::consts::{MAX_PAYLOAD, TORQUE_SLOTS};
use crate::error::WamError;
use crate::protocol::property::{Command, Property, PropertyFrame, PropertyId, ValueWidth};

/// Set/get flag in the first payload byte.
pub const SET_FLAG: u8 = 0x80;

/// Bit width of a packed position reply.
pub const POSITION_BITS: u32 = 22;
/// Largest count a packed position reply carries.
pub const POSITION_MAX: i32 = (1 << (POSITION_BITS - 1)) - 1;
/// Smallest count a packed position reply carries.
pub const POSITION_MIN: i32 = -(1 << (POSITION_BITS - 1));

/// Bit width of one packed torque slot.
pub const TORQUE_BITS: u32 = 14;
/// Largest current a torque slot carries.
pub const TORQUE_MAX: i32 = (1 << (TORQUE_BITS - 1)) - 1;
/// Smallest current a torque slot carries.
pub const TORQUE_MIN: i32 = -(1 << (TORQUE_BITS - 1));

/// Encoded frame payload.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Returns `true` if the payload is a write (or a reply, which firmware
/// sends in SET form).
pub fn is_set_frame(bytes: &[u8]) -> bool {
    bytes.first().is_some_and(|b| b & SET_FLAG != 0)
}

/// Property id carried in the header byte, without decoding the value.
pub fn peek_property(bytes: &[u8]) -> Option<PropertyId> {
    bytes.first().map(|b| PropertyId::from_header(*b))
}

// ─── Property frames ────────────────────────────────────────────────

/// Pack a property frame using the narrowest width that holds `value`,
/// or the property's fixed width when it has one.
pub fn pack(command: Command, property: PropertyId, value: i32) -> Payload {
    let width = property
        .known()
        .and_then(Property::fixed_width)
        .unwrap_or_else(|| ValueWidth::minimal(value));
    pack_with_width(command, property, value, width)
}

/// Pack a property frame with a full 4-byte value.
pub fn pack_full(command: Command, property: PropertyId, value: i32) -> Payload {
    pack_with_width(command, property, value, ValueWidth::Four)
}

/// Pack a [`PropertyFrame`].
pub fn pack_frame(frame: &PropertyFrame) -> Payload {
    pack(frame.command, frame.property, frame.value)
}

fn pack_with_width(command: Command, property: PropertyId, value: i32, width: ValueWidth) -> Payload {
    let mut payload = Payload::new();
    match command {
        Command::Get => payload.extend([property.get()]),
        Command::Set => {
            // never narrower than the value needs
            let width = width.max(ValueWidth::minimal(value));
            payload.extend([SET_FLAG | property.get(), 0x00]);
            payload.extend(value.to_le_bytes().into_iter().take(width.bytes()));
        }
    }
    payload
}

/// Unpack a property frame.
///
/// # Errors
/// `MalformedFrame` if the payload is empty, a GET carries a value, or a
/// SET value is not 1, 2 or 4 bytes.
pub fn unpack(bytes: &[u8]) -> Result<PropertyFrame, WamError> {
    let Some(&header) = bytes.first() else {
        return Err(WamError::MalformedFrame {
            len: 0,
            reason: "empty payload",
        });
    };
    let property = PropertyId::from_header(header);

    if header & SET_FLAG == 0 {
        if bytes.len() != 1 {
            return Err(WamError::MalformedFrame {
                len: bytes.len(),
                reason: "get request carries a value",
            });
        }
        return Ok(PropertyFrame {
            command: Command::Get,
            property,
            value: 0,
        });
    }

    let value_len = bytes.len().saturating_sub(2);
    let value = match (bytes.len() >= 3).then(|| ValueWidth::from_bytes(value_len)).flatten() {
        Some(ValueWidth::One) => i32::from(bytes[2] as i8),
        Some(ValueWidth::Two) => i32::from(i16::from_le_bytes([bytes[2], bytes[3]])),
        Some(ValueWidth::Four) => i32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        None => {
            return Err(WamError::MalformedFrame {
                len: bytes.len(),
                reason: "value is not 1, 2 or 4 bytes",
            });
        }
    };

    Ok(PropertyFrame {
        command: Command::Set,
        property,
        value,
    })
}

// ─── Packed position replies ────────────────────────────────────────

/// Pack a 22-bit position reply. Counts outside the field saturate.
pub fn pack_position_reply(counts: i32) -> Payload {
    let v = counts.clamp(POSITION_MIN, POSITION_MAX) as u32;
    let mut payload = Payload::new();
    payload.extend([
        SET_FLAG | ((v >> 16) as u8 & 0x3F),
        (v >> 8) as u8,
        v as u8,
    ]);
    payload
}

/// Unpack a 22-bit position reply.
///
/// # Errors
/// `MalformedFrame` unless the payload is exactly 3 bytes with the set flag.
pub fn unpack_position_reply(bytes: &[u8]) -> Result<i32, WamError> {
    let [b0, b1, b2] = bytes else {
        return Err(WamError::MalformedFrame {
            len: bytes.len(),
            reason: "position reply is not 3 bytes",
        });
    };
    if b0 & SET_FLAG == 0 {
        return Err(WamError::MalformedFrame {
            len: 3,
            reason: "position reply without set flag",
        });
    }
    let raw = (u32::from(b0 & 0x3F) << 16) | (u32::from(*b1) << 8) | u32::from(*b2);
    Ok(sign_extend(raw, POSITION_BITS))
}

// ─── Packed torque frames ───────────────────────────────────────────

/// Pack four motor currents into one group torque frame.
///
/// Slot `k` belongs to the member with puck index `k + 1`. Currents outside
/// the 14-bit range saturate.
pub fn pack_torques(currents: &[i32; TORQUE_SLOTS]) -> Payload {
    let packed = currents.iter().fold(0u64, |acc, c| {
        let slot = (*c).clamp(TORQUE_MIN, TORQUE_MAX);
        (acc << TORQUE_BITS) | u64::from(slot as u32 & 0x3FFF)
    });
    let mut payload = Payload::new();
    payload.extend([SET_FLAG | Property::Torque as u8]);
    // 56 bits of slots occupy the low seven bytes
    payload.extend(packed.to_be_bytes().into_iter().skip(1));
    payload
}

/// Unpack a group torque frame.
///
/// # Errors
/// `MalformedFrame` if the payload is not an 8-byte TORQ write.
pub fn unpack_torques(bytes: &[u8]) -> Result<[i32; TORQUE_SLOTS], WamError> {
    if bytes.len() != MAX_PAYLOAD || bytes[0] != SET_FLAG | Property::Torque as u8 {
        return Err(WamError::MalformedFrame {
            len: bytes.len(),
            reason: "not a packed torque frame",
        });
    }
    let mut be = [0u8; 8];
    be[1..].copy_from_slice(&bytes[1..]);
    let packed = u64::from_be_bytes(be);

    let mut out = [0i32; TORQUE_SLOTS];
    for (k, slot) in out.iter_mut().enumerate() {
        let shift = TORQUE_BITS * (TORQUE_SLOTS - 1 - k) as u32;
        *slot = sign_extend(((packed >> shift) & 0x3FFF) as u32, TORQUE_BITS);
    }
    Ok(out)
}

fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}
