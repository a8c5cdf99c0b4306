use hidapi::{HidDevice, HidError};
use hidstream::{HidStreamError, HidStreamResult, ReportTransport};
use std::time::Duration;
use tracing::{debug, trace};

/// Read buffer size; larger than any full-speed or high-speed HID report.
pub const READ_CAPACITY: usize = 4096;

pub struct HidApiTransport {
    name: String,
    device: Option<HidDevice>,
}

impl HidApiTransport {
    pub fn new(device: HidDevice, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: Some(device),
        }
    }

    fn device(&self) -> HidStreamResult<&HidDevice> {
        self.device.as_ref().ok_or(HidStreamError::DeviceNotOpen)
    }
}

/// `hid_read_timeout` milliseconds, rounded up and saturated.
pub(crate) fn read_timeout_millis(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX)
}

/// Map a hidapi failure, recognising the ways backends report an unplug.
pub(crate) fn classify(error: &HidError, device: &str) -> HidStreamError {
    let message = error.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("disconnected") || lower.contains("no such device") {
        HidStreamError::disconnected(device)
    } else {
        HidStreamError::transport(format!("{device}: {message}"))
    }
}

impl ReportTransport for HidApiTransport {
    fn read_report(&mut self, timeout: Duration) -> HidStreamResult<Vec<u8>> {
        let mut buf = vec![0u8; READ_CAPACITY];
        let len = self
            .device()?
            .read_timeout(&mut buf, read_timeout_millis(timeout))
            .map_err(|e| classify(&e, &self.name))?;
        buf.truncate(len);
        if len > 0 {
            trace!(device = %self.name, len, "hidapi read");
        }
        Ok(buf)
    }

    fn write_report(&mut self, report: &[u8]) -> HidStreamResult<usize> {
        let written = self
            .device()?
            .write(report)
            .map_err(|e| classify(&e, &self.name))?;
        trace!(device = %self.name, written, "hidapi write");
        Ok(written)
    }

    fn close(&mut self) -> HidStreamResult<()> {
        if self.device.take().is_some() {
            debug!(device = %self.name, "Closed hidapi device");
        }
        Ok(())
    }
}
