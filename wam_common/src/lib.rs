//! WAM Common Library
//!
//! Shared types for talking to Barrett motor controllers ("pucks") over a
//! CAN bus. Everything here is transport-agnostic and allocation-light so
//! it can be used from the real-time device layer as well as from tests
//! and tooling.
//!
//! # Module Structure
//!
//! - [`protocol`] - Node/group addressing, property ids, frame codec, puck modes
//! - [`can`] - CAN frame type and the `CanBus` transport trait
//! - [`error`] - Device-layer error taxonomy
//! - [`config`] - Configuration model and TOML loading
//! - [`consts`] - System-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use wam_common::protocol::address::{Destination, GroupId, NodeId, TransportId};
//!
//! let id = TransportId::new(NodeId::HOST, Destination::Group(GroupId::UPPER_ARM_POSITION));
//! assert!(id.is_group());
//! assert_eq!(id.origin(), NodeId::HOST);
//! ```

pub mod can;
pub mod config;
pub mod consts;
pub mod error;
pub mod prelude;
pub mod protocol;
