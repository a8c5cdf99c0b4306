//! `/dev/hidraw*` report transport
//!
//! The device file is opened non-blocking. Direct reads wait in `poll(2)`
//! before reading; event-driven waits poll the device together with the read
//! end of a self-pipe that a wake hook writes to.

use hidstream::wake::HookId;
use hidstream::{
    HidStreamError, HidStreamResult, Readiness, ReportTransport, WaitToken, Waitable, WakeSignal,
};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::unistd::pipe2;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Largest report the hidraw driver hands out (`HID_MAX_BUFFER_SIZE`).
pub const MAX_REPORT_LEN: usize = 4096;

const FAILURE_FLAGS: PollFlags = PollFlags::POLLERR
    .union(PollFlags::POLLHUP)
    .union(PollFlags::POLLNVAL);

struct Registration {
    token: WaitToken,
    wake: WakeSignal,
    hook: HookId,
    wake_rx: File,
}

pub struct HidrawDevice {
    name: String,
    file: Option<File>,
    registration: Option<Registration>,
    next_token: u64,
}

impl HidrawDevice {
    /// Open a hidraw node for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)?;
        debug!(path = %path.display(), "Opened hidraw device");
        Ok(Self::from_file(file, path.display().to_string()))
    }

    /// Wrap an already opened, non-blocking, packet-preserving descriptor.
    pub fn from_file(file: File, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: Some(file),
            registration: None,
            next_token: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn file(&self) -> HidStreamResult<&File> {
        self.file.as_ref().ok_or(HidStreamError::DeviceNotOpen)
    }

    fn map_io_error(&self, error: io::Error) -> HidStreamError {
        match error.raw_os_error() {
            Some(libc::ENODEV) | Some(libc::EPIPE) => HidStreamError::disconnected(self.name.clone()),
            _ => HidStreamError::Io(error),
        }
    }

    /// Non-blocking read of one report. End-of-file means the node is gone.
    fn read_available(&self) -> HidStreamResult<Vec<u8>> {
        let mut buf = vec![0u8; MAX_REPORT_LEN];
        match self.file()?.read(&mut buf) {
            Ok(0) => Err(HidStreamError::disconnected(self.name.clone())),
            Ok(len) => {
                buf.truncate(len);
                trace!(device = %self.name, len, "hidraw read");
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(self.map_io_error(e)),
        }
    }
}

/// Milliseconds for `poll(2)`, rounded up and saturated; `-1` waits forever.
fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(timeout) => i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX),
    }
}

fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout_millis(timeout) {
        -1 => PollTimeout::NONE,
        ms => PollTimeout::try_from(ms).unwrap_or(PollTimeout::MAX),
    }
}

/// `poll(2)` that restarts after `EINTR`.
fn poll_retrying(fds: &mut [PollFd<'_>], timeout: Option<Duration>) -> HidStreamResult<i32> {
    loop {
        match poll(fds, poll_timeout(timeout)) {
            Ok(ready) => return Ok(ready),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(HidStreamError::Io(io::Error::from(errno))),
        }
    }
}

fn drain_pipe(mut rx: &File) {
    let mut scratch = [0u8; 64];
    while matches!(rx.read(&mut scratch), Ok(n) if n > 0) {}
}

impl ReportTransport for HidrawDevice {
    fn read_report(&mut self, timeout: Duration) -> HidStreamResult<Vec<u8>> {
        if !timeout.is_zero() {
            let file = self.file()?;
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
            if poll_retrying(&mut fds, Some(timeout))? == 0 {
                return Ok(Vec::new());
            }
            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            if !revents.contains(PollFlags::POLLIN) && revents.intersects(FAILURE_FLAGS) {
                return Err(HidStreamError::disconnected(self.name.clone()));
            }
        }
        self.read_available()
    }

    fn write_report(&mut self, report: &[u8]) -> HidStreamResult<usize> {
        let mut file = self.file()?;
        match file.write(report) {
            Ok(written) => {
                trace!(device = %self.name, written, "hidraw write");
                Ok(written)
            }
            Err(e) => Err(self.map_io_error(e)),
        }
    }

    fn close(&mut self) -> HidStreamResult<()> {
        if let Some(token) = self.registration.as_ref().map(|r| r.token) {
            self.unregister(token)?;
        }
        if self.file.take().is_some() {
            debug!(device = %self.name, "Closed hidraw device");
        }
        Ok(())
    }

    fn waitable(&mut self) -> Option<&mut dyn Waitable> {
        Some(self)
    }
}

impl Waitable for HidrawDevice {
    fn register(&mut self, wake: &WakeSignal) -> HidStreamResult<WaitToken> {
        if self.registration.is_some() {
            return Err(HidStreamError::transport(format!(
                "{}: already registered",
                self.name
            )));
        }
        self.file()?;

        let (rx, tx) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(|errno| HidStreamError::Io(io::Error::from(errno)))?;
        let tx = Arc::new(File::from(tx));
        let hook = wake.add_hook(move || {
            // EAGAIN means the pipe already holds a pending wake.
            if let Err(e) = (&*tx).write(&[1]) {
                trace!(error = %e, "Wake pipe write skipped");
            }
        });

        let token = WaitToken::new(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.registration = Some(Registration {
            token,
            wake: wake.clone(),
            hook,
            wake_rx: File::from(rx),
        });
        debug!(device = %self.name, token = token.raw(), "Registered wake pipe");
        Ok(token)
    }

    fn poll(&mut self, token: WaitToken, timeout: Option<Duration>) -> HidStreamResult<Readiness> {
        let registration = self
            .registration
            .as_ref()
            .filter(|r| r.token == token)
            .ok_or_else(|| HidStreamError::transport("unknown wait token"))?;
        let file = self.file.as_ref().ok_or(HidStreamError::DeviceNotOpen)?;

        let mut fds = [
            PollFd::new(file.as_fd(), PollFlags::POLLIN),
            PollFd::new(registration.wake_rx.as_fd(), PollFlags::POLLIN),
        ];
        if poll_retrying(&mut fds, timeout)? == 0 {
            return Ok(Readiness::TimedOut);
        }
        let [device, wake] = fds.map(|fd| fd.revents().unwrap_or(PollFlags::empty()));

        if wake.contains(PollFlags::POLLIN) {
            drain_pipe(&registration.wake_rx);
            return Ok(Readiness::Woken);
        }
        if device.contains(PollFlags::POLLIN) {
            return Ok(Readiness::Readable);
        }
        if device.contains(PollFlags::POLLHUP) {
            return Ok(Readiness::HangUp);
        }
        if device.intersects(FAILURE_FLAGS) {
            return Ok(Readiness::Error);
        }
        Ok(Readiness::TimedOut)
    }

    fn unregister(&mut self, token: WaitToken) -> HidStreamResult<()> {
        if self.registration.as_ref().is_some_and(|r| r.token == token) {
            if let Some(registration) = self.registration.take() {
                registration.wake.remove_hook(registration.hook);
                debug!(device = %self.name, token = token.raw(), "Unregistered wake pipe");
            }
        }
        Ok(())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }
}

impl Drop for HidrawDevice {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.wake.remove_hook(registration.hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_millis() {
        assert_eq!(timeout_millis(None), -1);
        assert_eq!(timeout_millis(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_millis(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_millis(Some(Duration::from_millis(250))), 250);
        assert_eq!(timeout_millis(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }

    #[test]
    fn test_open_missing_node_fails() {
        let result = HidrawDevice::open("/dev/hidraw-does-not-exist");
        assert!(matches!(result, Err(e) if e.kind() == ErrorKind::NotFound));
    }
}
