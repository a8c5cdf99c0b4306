//! Buffered byte-stream interface over a packet source
//!
//! [`BufferedInterface`] turns any [`PacketSource`] into a serial-port style
//! stream: `write` chunks, `read(n)` blocks until `n` bytes are buffered, the
//! wake signal fires or a wait times out.
//!
//! Reads loop over three steps:
//! 1. serve from the buffer if it already holds enough bytes;
//! 2. drain every packet the source has queued;
//! 3. block in [`PacketSource::wait_for_event`] and react to the outcome.
//!
//! Timeouts apply to each wait, not to the whole `read`.

use crate::{HidStreamError, HidStreamResult, WakeSignal};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Why a [`PacketSource::wait_for_event`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one packet can be received without blocking.
    DataReady,
    /// The wake signal was raised. No data is implied.
    Woken,
    /// The wait timed out.
    TimedOut,
    /// The device hung up or reported an error.
    Disconnected,
}

/// The specialization a [`BufferedInterface`] drives.
pub trait PacketSource {
    /// Acquire the device. `wake` is the signal later passed to
    /// [`wait_for_event`](Self::wait_for_event).
    fn open(&mut self, wake: &WakeSignal) -> HidStreamResult<()>;

    /// Return one queued packet without blocking, or an empty vector.
    fn recv_packet(&mut self) -> HidStreamResult<Vec<u8>>;

    /// Send one chunk of at most [`max_chunk_len`](Self::max_chunk_len) bytes.
    fn send_chunk(&mut self, chunk: &[u8]) -> HidStreamResult<()>;

    fn max_chunk_len(&self) -> usize;

    /// Block until a packet is pending, `wake` is raised, the device goes
    /// away or `timeout` elapses (`None` waits forever).
    fn wait_for_event(
        &mut self,
        timeout: Option<Duration>,
        wake: &WakeSignal,
    ) -> HidStreamResult<WaitOutcome>;

    /// Release everything acquired by `open`. Must be idempotent and safe
    /// after a failed open.
    fn release(&mut self) -> HidStreamResult<()>;

    /// Human-readable name used in logs and errors.
    fn describe(&self) -> String;
}

/// Lifecycle of a [`BufferedInterface`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Created,
    Opened,
    Closed,
}

pub struct BufferedInterface<S: PacketSource> {
    source: S,
    state: InterfaceState,
    buffer: VecDeque<u8>,
    timeout: Option<Duration>,
    wake: WakeSignal,
    disconnected: bool,
}

impl<S: PacketSource> BufferedInterface<S> {
    pub fn from_source(source: S) -> Self {
        Self {
            source,
            state: InterfaceState::Created,
            buffer: VecDeque::new(),
            timeout: None,
            wake: WakeSignal::new(),
            disconnected: false,
        }
    }

    /// Open the underlying source.
    ///
    /// # Errors
    ///
    /// `AlreadyOpen` if already opened, `DeviceNotOpen` once closed, or
    /// whatever the source reports. A failed open leaves the interface in
    /// [`InterfaceState::Created`].
    pub fn open(&mut self) -> HidStreamResult<()> {
        match self.state {
            InterfaceState::Opened => return Err(HidStreamError::AlreadyOpen),
            InterfaceState::Closed => return Err(HidStreamError::DeviceNotOpen),
            InterfaceState::Created => {}
        }

        self.source.open(&self.wake)?;
        self.state = InterfaceState::Opened;
        self.disconnected = false;
        debug!(device = %self.source.describe(), "Interface opened");
        Ok(())
    }

    /// Alias for [`open`](Self::open).
    pub fn run(&mut self) -> HidStreamResult<()> {
        self.open()
    }

    pub fn is_open(&self) -> bool {
        self.state == InterfaceState::Opened
    }

    pub fn state(&self) -> InterfaceState {
        self.state
    }

    /// Whether a hang-up has been observed since `open`.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// A handle to the cancellation signal. Raising it from any thread makes
    /// a blocked `read` return empty.
    pub fn wake_signal(&self) -> WakeSignal {
        self.wake.clone()
    }

    /// Install an externally owned wake signal. Only allowed before `open`.
    pub fn set_wake_signal(&mut self, wake: WakeSignal) -> HidStreamResult<()> {
        match self.state {
            InterfaceState::Created => {
                self.wake = wake;
                Ok(())
            }
            InterfaceState::Opened => Err(HidStreamError::AlreadyOpen),
            InterfaceState::Closed => Err(HidStreamError::DeviceNotOpen),
        }
    }

    /// Bytes buffered so far, without touching the device.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Write `data`, one chunk per packet. Returns the number of payload
    /// bytes submitted.
    pub fn write(&mut self, data: &[u8]) -> HidStreamResult<usize> {
        self.ensure_connected()?;
        if data.is_empty() {
            return Ok(0);
        }

        let max = self.source.max_chunk_len().max(1);
        debug!(
            len = data.len(),
            chunks = data.len().div_ceil(max),
            "Writing payload"
        );
        for chunk in data.chunks(max) {
            if let Err(e) = self.source.send_chunk(chunk) {
                self.note_failure(&e);
                return Err(e);
            }
        }
        Ok(data.len())
    }

    /// Read exactly `size` bytes, or nothing on timeout or wake-up.
    ///
    /// Bytes drained before a wake-up stay buffered for the next call.
    pub fn read(&mut self, size: usize) -> HidStreamResult<Vec<u8>> {
        self.ensure_open()?;
        if size == 0 {
            return Ok(Vec::new());
        }

        loop {
            if self.buffer.len() >= size {
                return Ok(self.buffer.drain(..size).collect());
            }

            self.drain()?;
            if self.buffer.len() >= size {
                continue;
            }

            let outcome = match self.source.wait_for_event(self.timeout, &self.wake) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.note_failure(&e);
                    return Err(e);
                }
            };
            trace!(?outcome, buffered = self.buffer.len(), wanted = size, "Wait returned");

            match outcome {
                WaitOutcome::DataReady => {}
                WaitOutcome::Woken | WaitOutcome::TimedOut => return Ok(Vec::new()),
                WaitOutcome::Disconnected => {
                    warn!(device = %self.source.describe(), "Device disconnected during read");
                    self.disconnected = true;
                    return Ok(Vec::new());
                }
            }
        }
    }

    /// Drain queued packets and report how many bytes are buffered.
    /// Never blocks.
    pub fn in_waiting(&mut self) -> HidStreamResult<usize> {
        self.drain()?;
        Ok(self.buffer.len())
    }

    /// Drain queued packets and hand over the whole buffer without blocking.
    pub fn receive(&mut self) -> HidStreamResult<Vec<u8>> {
        self.ensure_open()?;
        if !self.disconnected {
            self.drain()?;
        } else if self.buffer.is_empty() {
            return Err(HidStreamError::disconnected(self.source.describe()));
        }
        Ok(self.buffer.drain(..).collect())
    }

    /// Close the interface and release the source exactly once. Later calls
    /// are no-ops.
    ///
    /// The interface ends up closed even if releasing fails; the first
    /// release error is returned.
    pub fn close(&mut self) -> HidStreamResult<()> {
        if self.state == InterfaceState::Closed {
            return Ok(());
        }

        self.state = InterfaceState::Closed;
        self.buffer.clear();
        let result = self.source.release();
        match &result {
            Ok(()) => info!(device = %self.source.describe(), "Interface closed"),
            Err(e) => warn!(device = %self.source.describe(), error = %e, "Release failed during close"),
        }
        result
    }

    fn ensure_open(&self) -> HidStreamResult<()> {
        if self.state == InterfaceState::Opened {
            Ok(())
        } else {
            Err(HidStreamError::DeviceNotOpen)
        }
    }

    fn ensure_connected(&self) -> HidStreamResult<()> {
        self.ensure_open()?;
        if self.disconnected {
            return Err(HidStreamError::disconnected(self.source.describe()));
        }
        Ok(())
    }

    fn drain(&mut self) -> HidStreamResult<usize> {
        self.ensure_connected()?;
        let mut drained = 0;
        loop {
            let packet = match self.source.recv_packet() {
                Ok(packet) => packet,
                Err(e) => {
                    self.note_failure(&e);
                    return Err(e);
                }
            };
            if packet.is_empty() {
                break;
            }
            drained += packet.len();
            self.buffer.extend(packet);
        }
        if drained > 0 {
            trace!(drained, buffered = self.buffer.len(), "Drained packets");
        }
        Ok(drained)
    }

    fn note_failure(&mut self, error: &HidStreamError) {
        if matches!(error, HidStreamError::DeviceDisconnected(_)) {
            warn!(device = %self.source.describe(), "Device disconnected");
            self.disconnected = true;
        }
    }
}

impl<S: PacketSource> Drop for BufferedInterface<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!(error = %e, "Close on drop failed");
        }
    }
}
