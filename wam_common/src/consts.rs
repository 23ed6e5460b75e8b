//! System-wide constants for the WAM workspace.
//!
//! Single source of truth for protocol widths, timing defaults and paths.

use static_assertions::const_assert;

/// Width of a node (or group) identifier in a transport id.
pub const NODE_ID_BITS: u32 = 5;

/// Largest node id representable on the wire.
pub const MAX_NODE_ID: u8 = (1 << NODE_ID_BITS) - 1;

/// Width of a CAN 2.0A standard identifier.
pub const TRANSPORT_ID_BITS: u32 = 11;

/// Mask of a valid transport identifier.
pub const TRANSPORT_ID_MASK: u16 = (1 << TRANSPORT_ID_BITS) - 1;

/// Maximum CAN payload length.
pub const MAX_PAYLOAD: usize = 8;

/// Number of torque slots in a packed group torque frame.
pub const TORQUE_SLOTS: usize = 4;

/// Maximum number of pucks a device can address (one per node id).
pub const MAX_PUCKS: usize = MAX_NODE_ID as usize + 1;

/// Counts per revolution of the absolute magnetic encoder (MECH property).
pub const MECH_COUNTS_PER_REV: i32 = 4096;

/// CMD value that sends a hand puck through its HI (homing) sequence.
pub const HAND_HI_COMMAND: i32 = 13;

/// Default control cycle time in microseconds (500 Hz).
pub const DEFAULT_CYCLE_TIME_US: u64 = 2000;

/// Default time to wait for a single reply in microseconds.
pub const DEFAULT_REPLY_TIMEOUT_US: u64 = 2000;

/// Default number of re-sends after a timed-out request.
pub const DEFAULT_RETRIES: u32 = 1;

/// Default number of retries allowed across one control cycle.
pub const DEFAULT_CYCLE_RETRY_BUDGET: u32 = 2;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wam/wam.toml";

// group flag + origin + destination must fit a standard CAN id
const_assert!(1 + 2 * NODE_ID_BITS <= TRANSPORT_ID_BITS);
const_assert!(MAX_PAYLOAD >= 2 + 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(MAX_NODE_ID, 31);
        assert_eq!(TRANSPORT_ID_MASK, 0x07FF);
        assert!(DEFAULT_REPLY_TIMEOUT_US <= DEFAULT_CYCLE_TIME_US);
        assert!(DEFAULT_RETRIES <= DEFAULT_CYCLE_RETRY_BUDGET);
    }
}
