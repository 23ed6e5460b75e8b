//! Serialized access to one CAN bus.
//!
//! Replies are correlated to requests only by timing and origin address, so
//! at most one request/reply exchange may be outstanding per bus. All
//! exchanges go through [`BusAccess`], which holds the transport behind a
//! single lock for the whole exchange.
//!
//! `BusAccess` is not `Clone`: it is the ownership token for the bus. A
//! [`Device`](crate::device::Device) takes it by value and hands it back on
//! `release()`, so two devices can never drive the same bus at once.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wam_common::can::{BusError, CanBus, CanFrame};
use wam_common::config::BusConfig;
use wam_common::error::WamError;
use wam_common::protocol::address::TransportId;

/// Timing and retry rules for exchanges on one bus.
#[derive(Debug, Clone)]
pub struct ExchangePolicy {
    /// Time to wait for one reply.
    pub reply_timeout: Duration,
    /// Re-sends after a timed-out request.
    pub retries: u32,
    /// Retries allowed across one control cycle.
    pub cycle_retry_budget: u32,
    /// Pause between a verified write and its read-back.
    pub verify_delay: Duration,
    /// Pause after commanding STAT=READY.
    pub wake_delay: Duration,
    /// Pause between consecutive encoder overwrites.
    pub zeroing_pace: Duration,
    /// Pause after sending the hand through HI.
    pub hand_settle: Duration,
}

impl ExchangePolicy {
    pub fn from_config(bus: &BusConfig) -> Self {
        Self {
            reply_timeout: bus.reply_timeout(),
            retries: bus.retries,
            cycle_retry_budget: bus.cycle_retry_budget,
            verify_delay: Duration::from_millis(bus.verify_delay_ms),
            wake_delay: Duration::from_millis(bus.wake_delay_ms),
            zeroing_pace: Duration::from_micros(bus.zeroing_pace_us),
            hand_settle: Duration::from_millis(bus.hand_settle_ms),
        }
    }

    /// Same retry rules with every firmware settling delay removed.
    ///
    /// Only meaningful against the simulated bus, whose nodes settle
    /// instantly.
    pub fn without_delays(self) -> Self {
        Self {
            verify_delay: Duration::ZERO,
            wake_delay: Duration::ZERO,
            zeroing_pace: Duration::ZERO,
            hand_settle: Duration::ZERO,
            ..self
        }
    }
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self::from_config(&BusConfig::default())
    }
}

struct BusInner {
    bus: Box<dyn CanBus>,
    /// Remaining retries in the current control cycle; `None` outside one.
    cycle_budget: Option<u32>,
}

/// Exclusive, serialized handle to one CAN bus.
pub struct BusAccess {
    inner: Mutex<BusInner>,
    policy: ExchangePolicy,
}

impl BusAccess {
    pub fn new(bus: Box<dyn CanBus>, policy: ExchangePolicy) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                bus,
                cycle_budget: None,
            }),
            policy,
        }
    }

    pub fn policy(&self) -> &ExchangePolicy {
        &self.policy
    }

    /// Name of the underlying driver.
    pub fn driver_name(&self) -> &'static str {
        self.inner.lock().bus.name()
    }

    /// Give the transport back.
    pub fn into_inner(self) -> Box<dyn CanBus> {
        self.inner.into_inner().bus
    }

    /// Start a control cycle: retries are capped by the cycle budget until
    /// [`end_cycle`](Self::end_cycle).
    pub fn begin_cycle(&self) {
        self.inner.lock().cycle_budget = Some(self.policy.cycle_retry_budget);
    }

    pub fn end_cycle(&self) {
        self.inner.lock().cycle_budget = None;
    }

    pub fn install_filter(&self, id: TransportId) -> Result<(), WamError> {
        self.inner
            .lock()
            .bus
            .install_filter(id)
            .map_err(|e| WamError::communication(id.destination(), e))
    }

    /// Fire-and-forget send.
    pub fn send(&self, frame: &CanFrame) -> Result<(), WamError> {
        self.inner
            .lock()
            .bus
            .send(frame)
            .map_err(|e| WamError::communication(frame.id.destination(), e))
    }

    /// One request, one reply.
    ///
    /// `accept` classifies each received frame: `None` for a frame that is
    /// not the awaited reply (logged and skipped), `Some(Ok(_))` for the
    /// reply, `Some(Err(_))` for a reply that is present but unusable.
    /// A timeout re-sends up to `retries` times, each retry drawing on the
    /// cycle budget while inside a control cycle.
    pub fn request<T>(
        &self,
        frame: &CanFrame,
        mut accept: impl FnMut(&CanFrame) -> Option<Result<T, WamError>>,
    ) -> Result<T, WamError> {
        let target = frame.id.destination();
        let mut inner = self.inner.lock();

        for attempt in 0..=self.policy.retries {
            if attempt > 0 {
                match inner.cycle_budget.as_mut() {
                    Some(0) => {
                        debug!(%target, "cycle retry budget exhausted");
                        break;
                    }
                    Some(left) => *left -= 1,
                    None => {}
                }
                debug!(%target, attempt, "retrying request");
            }

            inner
                .bus
                .send(frame)
                .map_err(|e| WamError::communication(target, e))?;

            let deadline = Instant::now() + self.policy.reply_timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match inner.bus.recv(remaining) {
                    Ok(reply) => match accept(&reply) {
                        Some(result) => return result,
                        None => warn!(%target, frame = %reply, "ignoring unexpected frame"),
                    },
                    Err(BusError::Timeout) => break,
                    Err(e) => return Err(WamError::communication(target, e)),
                }
            }
        }

        Err(WamError::communication(target, BusError::Timeout))
    }

    /// One request, many replies.
    ///
    /// Sends `frame` once and feeds received frames to `sink` until it has
    /// accepted `expected` of them or the reply timeout elapses. Returns how
    /// many were accepted. Never retried: a group query has side effects on
    /// every member.
    pub fn collect(
        &self,
        frame: &CanFrame,
        expected: usize,
        mut sink: impl FnMut(&CanFrame) -> bool,
    ) -> Result<usize, WamError> {
        let target = frame.id.destination();
        let mut inner = self.inner.lock();

        inner
            .bus
            .send(frame)
            .map_err(|e| WamError::communication(target, e))?;

        let deadline = Instant::now() + self.policy.reply_timeout;
        let mut accepted = 0;
        while accepted < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match inner.bus.recv(remaining) {
                Ok(reply) => {
                    if sink(&reply) {
                        accepted += 1;
                    }
                }
                Err(BusError::Timeout) => break,
                Err(e) => return Err(WamError::communication(target, e)),
            }
        }
        Ok(accepted)
    }
}

/// Sleep unless the delay is zero.
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
