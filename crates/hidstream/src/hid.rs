//! HID report specialization
//!
//! [`HidReportSource`] adapts a [`ReportTransport`] to the [`PacketSource`]
//! contract: outbound chunks are framed into fixed-length reports, inbound
//! reports lose their `0x00` pad byte, and waiting follows the configured
//! [`AccessStrategy`].

use crate::config::{AccessStrategy, StreamConfig};
use crate::interface::{BufferedInterface, PacketSource, WaitOutcome};
use crate::report::ReportFraming;
use crate::transport::{DeviceOpener, Readiness, ReportTransport, WaitToken};
use crate::{DeviceAddress, HidStreamError, HidStreamResult, WakeSignal};
use std::collections::VecDeque;
#[cfg(unix)]
use std::os::fd::RawFd;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Byte stream over a HID device.
pub type HidStream = BufferedInterface<HidReportSource>;

pub struct HidReportSource {
    address: DeviceAddress,
    opener: Box<dyn DeviceOpener>,
    transport: Option<Box<dyn ReportTransport>>,
    framing: ReportFraming,
    strategy: AccessStrategy,
    token: Option<WaitToken>,
    /// Reports already pulled off the transport by a direct wait.
    pending: VecDeque<Vec<u8>>,
    hung_up: bool,
}

impl HidReportSource {
    pub fn new(
        address: DeviceAddress,
        config: &StreamConfig,
        opener: Box<dyn DeviceOpener>,
    ) -> Self {
        Self {
            address,
            opener,
            transport: None,
            framing: config.framing(),
            strategy: config.strategy,
            token: None,
            pending: VecDeque::new(),
            hung_up: false,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn strategy(&self) -> AccessStrategy {
        self.strategy
    }

    pub fn framing(&self) -> &ReportFraming {
        &self.framing
    }

    pub fn set_report_id(&mut self, report_id: u8) {
        self.framing.set_report_id(report_id);
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    /// Descriptor of the registered waitable, for callers composing their
    /// own multiplexed wait. Only available with the event-driven strategy.
    #[cfg(unix)]
    pub fn raw_fd(&mut self) -> Option<RawFd> {
        self.token?;
        self.transport.as_mut()?.waitable()?.raw_fd()
    }

    fn transport_mut(&mut self) -> HidStreamResult<&mut Box<dyn ReportTransport>> {
        self.transport.as_mut().ok_or(HidStreamError::DeviceNotOpen)
    }

    fn abandon(&self, mut transport: Box<dyn ReportTransport>) {
        if let Err(e) = transport.close() {
            warn!(device = %self.address, error = %e, "Failed to close transport after open failure");
        }
    }

    fn wait_direct(
        &mut self,
        read_timeout: Duration,
        timeout: Option<Duration>,
        wake: &WakeSignal,
    ) -> HidStreamResult<WaitOutcome> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            if wake.take() {
                return Ok(WaitOutcome::Woken);
            }

            // An unrepresentable deadline waits like no timeout at all.
            let slice = match deadline {
                Some(deadline) => {
                    read_timeout.min(deadline.saturating_duration_since(Instant::now()))
                }
                None => read_timeout,
            };

            let report = match self.transport_mut()?.read_report(slice) {
                Ok(report) => report,
                Err(HidStreamError::DeviceDisconnected(_)) => {
                    self.hung_up = true;
                    return Ok(WaitOutcome::Disconnected);
                }
                Err(e) => return Err(e),
            };
            if !report.is_empty() {
                self.pending.push_back(report);
                return Ok(WaitOutcome::DataReady);
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(WaitOutcome::TimedOut);
            }
        }
    }

    fn wait_event_driven(
        &mut self,
        timeout: Option<Duration>,
        wake: &WakeSignal,
    ) -> HidStreamResult<WaitOutcome> {
        let token = self.token.ok_or(HidStreamError::DeviceNotOpen)?;
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            if wake.take() {
                return Ok(WaitOutcome::Woken);
            }

            let remaining = match deadline {
                Some(deadline) => Some(deadline.saturating_duration_since(Instant::now())),
                None => timeout,
            };
            let device = self.address.to_string();
            let waitable = self
                .transport_mut()?
                .waitable()
                .ok_or_else(|| HidStreamError::transport(format!("{device}: waitable went away")))?;

            match waitable.poll(token, remaining)? {
                Readiness::Readable => return Ok(WaitOutcome::DataReady),
                Readiness::TimedOut => return Ok(WaitOutcome::TimedOut),
                Readiness::Woken => {
                    // The hook fires on every raise; the signal itself says
                    // whether this wake is still unconsumed.
                    if wake.take() {
                        return Ok(WaitOutcome::Woken);
                    }
                    if remaining.is_some_and(|r| r.is_zero()) {
                        return Ok(WaitOutcome::TimedOut);
                    }
                }
                readiness @ (Readiness::HangUp | Readiness::Error) => {
                    warn!(device = %self.address, ?readiness, "Device stopped responding");
                    self.hung_up = true;
                    return Ok(WaitOutcome::Disconnected);
                }
            }
        }
    }
}

impl PacketSource for HidReportSource {
    fn open(&mut self, wake: &WakeSignal) -> HidStreamResult<()> {
        if self.transport.is_some() {
            return Err(HidStreamError::AlreadyOpen);
        }

        let mut transport = match self.opener.open_device(&self.address) {
            Ok(transport) => transport,
            Err(e @ HidStreamError::DeviceOpenFailed { .. }) => return Err(e),
            Err(e) => return Err(HidStreamError::open_failed(self.address.to_string(), e.to_string())),
        };

        if self.strategy.is_event_driven() {
            let registered = match transport.waitable() {
                Some(waitable) => waitable.register(wake),
                None => Err(HidStreamError::transport(
                    "transport has no readiness capability",
                )),
            };
            match registered {
                Ok(token) => self.token = Some(token),
                Err(e) => {
                    self.abandon(transport);
                    return Err(HidStreamError::open_failed(
                        self.address.to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        self.transport = Some(transport);
        self.pending.clear();
        self.hung_up = false;
        info!(
            device = %self.address,
            strategy = self.strategy.name(),
            report_size = self.framing.report_size(),
            "Opened HID stream"
        );
        Ok(())
    }

    fn recv_packet(&mut self) -> HidStreamResult<Vec<u8>> {
        loop {
            let raw = match self.pending.pop_front() {
                Some(report) => report,
                None => {
                    if self.hung_up {
                        return Ok(Vec::new());
                    }
                    match self.transport_mut()?.read_report(Duration::ZERO) {
                        Ok(report) => report,
                        Err(HidStreamError::DeviceDisconnected(_)) => {
                            // Surfaced by the next wait.
                            self.hung_up = true;
                            return Ok(Vec::new());
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
            if raw.is_empty() {
                return Ok(Vec::new());
            }

            let data = self.framing.normalize_input(&raw);
            trace!(raw_len = raw.len(), len = data.len(), "Received report");
            if !data.is_empty() {
                return Ok(data.to_vec());
            }
        }
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> HidStreamResult<()> {
        let report = self.framing.frame_output(chunk)?;
        let written = self.transport_mut()?.write_report(&report)?;
        trace!(
            report_id = self.framing.report_id(),
            payload = chunk.len(),
            written,
            "Sent report"
        );
        if written < report.len() {
            return Err(HidStreamError::transport(format!(
                "short write: {written} of {} bytes",
                report.len()
            )));
        }
        Ok(())
    }

    fn max_chunk_len(&self) -> usize {
        self.framing.report_size()
    }

    fn wait_for_event(
        &mut self,
        timeout: Option<Duration>,
        wake: &WakeSignal,
    ) -> HidStreamResult<WaitOutcome> {
        if !self.pending.is_empty() {
            return Ok(WaitOutcome::DataReady);
        }
        if self.hung_up {
            return Ok(WaitOutcome::Disconnected);
        }

        match self.strategy {
            AccessStrategy::Direct { read_timeout } => self.wait_direct(read_timeout, timeout, wake),
            AccessStrategy::EventDriven => self.wait_event_driven(timeout, wake),
        }
    }

    fn release(&mut self) -> HidStreamResult<()> {
        let mut first_error = None;
        let token = self.token.take();

        if let Some(mut transport) = self.transport.take() {
            // Unregister before the handle goes away.
            if let (Some(token), Some(waitable)) = (token, transport.waitable()) {
                if let Err(e) = waitable.unregister(token) {
                    warn!(device = %self.address, error = %e, "Failed to unregister waitable");
                    first_error = Some(e);
                }
            }
            if let Err(e) = transport.close() {
                warn!(device = %self.address, error = %e, "Failed to close transport");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            debug!(device = %self.address, "Released HID transport");
        }

        self.pending.clear();
        first_error.map_or(Ok(()), Err)
    }

    fn describe(&self) -> String {
        self.address.to_string()
    }
}

impl HidStream {
    /// Build an unopened stream for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(
        address: impl Into<DeviceAddress>,
        config: StreamConfig,
        opener: impl DeviceOpener + 'static,
    ) -> HidStreamResult<Self> {
        config.validate()?;
        let source = HidReportSource::new(address.into(), &config, Box::new(opener));
        let mut stream = Self::from_source(source);
        stream.set_timeout(config.timeout);
        Ok(stream)
    }

    /// Change the report ID prefixed to subsequent writes.
    pub fn set_report_id(&mut self, report_id: u8) {
        self.source_mut().set_report_id(report_id);
    }

    pub fn report_id(&self) -> u8 {
        self.source().framing().report_id()
    }

    pub fn address(&self) -> &DeviceAddress {
        self.source().address()
    }

    #[cfg(unix)]
    pub fn raw_fd(&mut self) -> Option<RawFd> {
        self.source_mut().raw_fd()
    }
}
