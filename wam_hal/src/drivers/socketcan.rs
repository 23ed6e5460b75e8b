//! Linux SocketCAN bus driver.
//!
//! Opens a raw CAN socket on `bus.device` (e.g. `can0`). Reply filters are
//! pushed into the kernel so only frames addressed to the host reach `recv`.

use socketcan::{
    CanFilter, CanFrame as RawFrame, CanSocket, EmbeddedFrame, Id, Socket, SocketOptions,
    StandardId,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use wam_common::can::{BusError, CanBus, CanFrame};
use wam_common::config::WamConfig;
use wam_common::consts::TRANSPORT_ID_MASK;
use wam_common::error::WamError;
use wam_common::protocol::address::TransportId;

/// Smallest read timeout handed to the kernel; zero would mean "block".
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

pub struct SocketCanBus {
    socket: CanSocket,
    filters: Vec<CanFilter>,
}

impl SocketCanBus {
    pub fn open(device: &str) -> Result<Self, BusError> {
        let socket = CanSocket::open(device).map_err(|e| BusError::Io(format!("{device}: {e}")))?;
        info!(%device, "CAN socket open");
        Ok(Self {
            socket,
            filters: Vec::new(),
        })
    }
}

impl CanBus for SocketCanBus {
    fn name(&self) -> &'static str {
        "socketcan"
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        let id = StandardId::new(frame.id.raw())
            .ok_or_else(|| BusError::Io(format!("id {:#05x} out of range", frame.id.raw())))?;
        let raw = RawFrame::new(id, frame.payload())
            .ok_or(BusError::FrameTooLong(frame.payload().len()))?;
        self.socket.write_frame(&raw)?;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<CanFrame, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BusError::Timeout);
            }
            self.socket.set_read_timeout(remaining.max(MIN_READ_TIMEOUT))?;
            let RawFrame::Data(frame) = self.socket.read_frame()? else {
                debug!("skipping non-data frame");
                continue;
            };
            let Id::Standard(sid) = frame.id() else {
                continue;
            };
            let Ok(id) = TransportId::from_raw(sid.as_raw()) else {
                continue;
            };
            return CanFrame::from_slice(id, frame.data());
        }
    }

    fn install_filter(&mut self, id: TransportId) -> Result<(), BusError> {
        self.filters
            .push(CanFilter::new(u32::from(id.raw()), u32::from(TRANSPORT_ID_MASK)));
        self.socket.set_filters(&self.filters)?;
        Ok(())
    }
}

/// Factory: open the configured interface.
pub fn create_bus(config: &WamConfig) -> Result<Box<dyn CanBus>, WamError> {
    let device = &config.bus.device;
    let bus = SocketCanBus::open(device)
        .map_err(|e| WamError::DriverNotFound(format!("socketcan on {device}: {e}")))?;
    Ok(Box::new(bus))
}
