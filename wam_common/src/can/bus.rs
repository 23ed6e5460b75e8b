//! The transport trait consumed by the device layer.
//!
//! Implementations move whole frames and nothing more: no retransmission,
//! no request/reply correlation. Those live in the device layer, which
//! serializes every exchange on one bus behind a single lock.

use crate::can::frame::CanFrame;
use crate::protocol::address::TransportId;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Nothing arrived within the receive timeout.
    #[error("receive timed out")]
    Timeout,

    /// The interface went away.
    #[error("bus closed")]
    Closed,

    /// OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Payload longer than a CAN frame can carry.
    #[error("payload of {0} bytes exceeds CAN frame")]
    FrameTooLong(usize),
}

impl From<std::io::Error> for BusError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => BusError::Timeout,
            _ => BusError::Io(e.to_string()),
        }
    }
}

/// A CAN segment.
///
/// # Contract
///
/// - `send` queues one frame; it does not wait for any reply.
/// - `recv` returns the next accepted frame, or `BusError::Timeout` once
///   `timeout` has elapsed. FIFO per direction.
/// - `install_filter` adds an exact-match acceptance filter. With no
///   filter installed every frame is accepted.
pub trait CanBus: Send {
    /// Driver identifier (e.g. "simulation", "socketcan").
    fn name(&self) -> &'static str;

    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError>;

    fn recv(&mut self, timeout: Duration) -> Result<CanFrame, BusError>;

    fn install_filter(&mut self, id: TransportId) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_timeout() {
        let e = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert_eq!(BusError::from(e), BusError::Timeout);
        let e = std::io::Error::other("boom");
        assert!(matches!(BusError::from(e), BusError::Io(_)));
    }
}
