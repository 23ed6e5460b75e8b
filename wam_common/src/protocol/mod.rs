//! Puck wire protocol.
//!
//! - [`address`] - Node ids, group ids and the 11-bit transport identifier
//! - [`property`] - Property identifiers, commands and value widths
//! - [`codec`] - Payload pack/unpack for property, position and torque frames
//! - [`mode`] - Puck mode and status state values

pub mod address;
pub mod codec;
pub mod mode;
pub mod property;
