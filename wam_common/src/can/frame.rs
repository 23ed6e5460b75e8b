//! CAN 2.0A data frame.

use crate::can::bus::BusError;
use crate::protocol::address::TransportId;
use crate::protocol::codec::Payload;
use std::fmt;

/// One standard-id data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: TransportId,
    pub data: Payload,
}

impl CanFrame {
    pub fn new(id: TransportId, data: Payload) -> Self {
        Self { id, data }
    }

    /// Build from raw bytes received by a driver.
    ///
    /// # Errors
    /// `FrameTooLong` if `bytes` exceeds the 8-byte CAN payload.
    pub fn from_slice(id: TransportId, bytes: &[u8]) -> Result<Self, BusError> {
        let data = Payload::from_slice(bytes).map_err(|_| BusError::FrameTooLong(bytes.len()))?;
        Ok(Self { id, data })
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03x} [{}]", self.id.raw(), self.data.len())?;
        for b in &self.data {
            write!(f, " {b:02x}")?;
        }
        Ok(())
    }
}
