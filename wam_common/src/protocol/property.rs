//! Property identifiers.
//!
//! Every readable or writable attribute of a puck is addressed by a 7-bit
//! property id. [`Property`] names the ones the device layer uses;
//! [`PropertyId`] carries any id that travels on the wire.

use crate::error::WamError;
use std::fmt;

/// Largest 7-bit property id.
pub const MAX_PROPERTY_ID: u8 = 0x7F;

/// A 7-bit property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(u8);

impl PropertyId {
    /// # Errors
    /// `InvalidAddress` when `raw` has the set/get flag bit set.
    pub fn new(raw: u8) -> Result<Self, WamError> {
        if raw > MAX_PROPERTY_ID {
            return Err(WamError::InvalidAddress {
                value: u16::from(raw),
                bits: 7,
            });
        }
        Ok(Self(raw))
    }

    /// Build from the low 7 bits of a payload header byte.
    pub(crate) const fn from_header(byte: u8) -> Self {
        Self(byte & MAX_PROPERTY_ID)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The named property, if this id is one the device layer knows.
    pub fn known(self) -> Option<Property> {
        Property::ALL.iter().copied().find(|p| *p as u8 == self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known() {
            Some(p) => write!(f, "{}", p.name()),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// Properties used by the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Property {
    /// Life-cycle status (RESET / READY).
    Status = 5,
    /// Control mode.
    Mode = 8,
    /// Commanded motor current.
    Torque = 10,
    /// Absolute position in encoder counts.
    Position = 26,
    /// Mechanical angle from the magnetic encoder.
    MechanicalAngle = 28,
    /// One-shot firmware command (hand pucks).
    Command = 29,
    /// Encoder counts per revolution.
    CountsPerRev = 30,
    /// Group memberships.
    GroupA = 51,
    GroupB = 52,
    GroupC = 53,
    /// Slot within the packed torque frame (1-based).
    PuckIndex = 54,
    /// Velocity warning threshold.
    VelocityWarning = 88,
    /// Velocity fault threshold.
    VelocityFault = 89,
    /// Torque warning threshold.
    TorqueWarning = 90,
    /// Torque fault threshold.
    TorqueFault = 91,
    /// Fault mask on the safety module.
    IgnoreFault = 98,
    /// Current units per Newton-metre.
    AmpsPerNm = 106,
}

impl Property {
    const ALL: [Property; 17] = [
        Property::Status,
        Property::Mode,
        Property::Torque,
        Property::Position,
        Property::MechanicalAngle,
        Property::Command,
        Property::CountsPerRev,
        Property::GroupA,
        Property::GroupB,
        Property::GroupC,
        Property::PuckIndex,
        Property::VelocityWarning,
        Property::VelocityFault,
        Property::TorqueWarning,
        Property::TorqueFault,
        Property::IgnoreFault,
        Property::AmpsPerNm,
    ];

    pub const fn id(self) -> PropertyId {
        PropertyId(self as u8)
    }

    /// Firmware mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            Property::Status => "STAT",
            Property::Mode => "MODE",
            Property::Torque => "TORQ",
            Property::Position => "AP",
            Property::MechanicalAngle => "MECH",
            Property::Command => "CMD",
            Property::CountsPerRev => "CTS",
            Property::GroupA => "GRPA",
            Property::GroupB => "GRPB",
            Property::GroupC => "GRPC",
            Property::PuckIndex => "PIDX",
            Property::VelocityWarning => "VL1",
            Property::VelocityFault => "VL2",
            Property::TorqueWarning => "TL1",
            Property::TorqueFault => "TL2",
            Property::IgnoreFault => "IFAULT",
            Property::AmpsPerNm => "IPNM",
        }
    }

    /// Width the firmware always uses for this property, if fixed.
    pub const fn fixed_width(self) -> Option<ValueWidth> {
        match self {
            Property::Position | Property::MechanicalAngle | Property::CountsPerRev => {
                Some(ValueWidth::Four)
            }
            _ => None,
        }
    }
}

impl From<Property> for PropertyId {
    fn from(p: Property) -> Self {
        p.id()
    }
}

/// Read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Set,
}

/// Encoded width of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueWidth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl ValueWidth {
    /// Smallest width whose signed range holds `value`.
    pub fn minimal(value: i32) -> Self {
        if i8::try_from(value).is_ok() {
            ValueWidth::One
        } else if i16::try_from(value).is_ok() {
            ValueWidth::Two
        } else {
            ValueWidth::Four
        }
    }

    pub const fn bytes(self) -> usize {
        self as usize
    }

    pub const fn from_bytes(n: usize) -> Option<Self> {
        match n {
            1 => Some(ValueWidth::One),
            2 => Some(ValueWidth::Two),
            4 => Some(ValueWidth::Four),
            _ => None,
        }
    }
}

/// One decoded property request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFrame {
    pub command: Command,
    pub property: PropertyId,
    /// Zero for a GET.
    pub value: i32,
}

impl PropertyFrame {
    pub fn get(property: impl Into<PropertyId>) -> Self {
        Self {
            command: Command::Get,
            property: property.into(),
            value: 0,
        }
    }

    pub fn set(property: impl Into<PropertyId>, value: i32) -> Self {
        Self {
            command: Command::Set,
            property: property.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_id_is_seven_bits() {
        assert!(PropertyId::new(0x7F).is_ok());
        assert!(PropertyId::new(0x80).is_err());
    }

    #[test]
    fn known_properties_resolve() {
        assert_eq!(PropertyId::new(54).unwrap().known(), Some(Property::PuckIndex));
        assert_eq!(PropertyId::new(3).unwrap().known(), None);
        assert_eq!(Property::IgnoreFault.id().to_string(), "IFAULT");
        assert_eq!(PropertyId::new(3).unwrap().to_string(), "#3");
        assert_eq!(PropertyId::new(29).unwrap().known(), Some(Property::Command));
    }

    #[test]
    fn minimal_width_boundaries() {
        assert_eq!(ValueWidth::minimal(127), ValueWidth::One);
        assert_eq!(ValueWidth::minimal(-128), ValueWidth::One);
        assert_eq!(ValueWidth::minimal(128), ValueWidth::Two);
        assert_eq!(ValueWidth::minimal(-32768), ValueWidth::Two);
        assert_eq!(ValueWidth::minimal(32768), ValueWidth::Four);
        assert_eq!(ValueWidth::minimal(i32::MIN), ValueWidth::Four);
    }

    #[test]
    fn fixed_width_properties() {
        assert_eq!(Property::Position.fixed_width(), Some(ValueWidth::Four));
        assert_eq!(Property::CountsPerRev.fixed_width(), Some(ValueWidth::Four));
        assert_eq!(Property::Mode.fixed_width(), None);
    }
}
