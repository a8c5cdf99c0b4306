//! Report transport capabilities
//!
//! A platform adapter supplies up to three capabilities: opening a device
//! ([`DeviceOpener`]), moving single reports ([`ReportTransport`]) and, for the
//! event-driven strategy, blocking until a report or a wake-up is pending
//! ([`Waitable`]).

use crate::{DeviceAddress, HidStreamResult, WakeSignal};
#[cfg(unix)]
use std::os::fd::RawFd;
use std::time::Duration;

/// Result of one [`Waitable::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least one report can be read without blocking.
    Readable,
    /// The handle reported an error condition.
    Error,
    /// The device went away.
    HangUp,
    /// Nothing happened within the timeout.
    TimedOut,
    /// The wake signal registered with the waitable was raised.
    Woken,
}

/// Registration handle returned by [`Waitable::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitToken(u64);

impl WaitToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Raw single-report I/O on an opened device.
pub trait ReportTransport: Send {
    /// Read one raw report.
    ///
    /// Blocks for at most `timeout`; `Duration::ZERO` only returns a report
    /// that is already queued. Returns an empty vector when nothing arrived.
    fn read_report(&mut self, timeout: Duration) -> HidStreamResult<Vec<u8>>;

    /// Write one framed report, returning the number of bytes accepted.
    fn write_report(&mut self, report: &[u8]) -> HidStreamResult<usize>;

    /// Release the handle. Must tolerate being called more than once.
    fn close(&mut self) -> HidStreamResult<()>;

    /// The readiness capability, if this transport has one.
    fn waitable(&mut self) -> Option<&mut dyn Waitable> {
        None
    }
}

/// Readiness notification for the event-driven strategy.
pub trait Waitable: Send {
    /// Subscribe to `wake` so that raising it makes [`poll`](Self::poll)
    /// return [`Readiness::Woken`].
    fn register(&mut self, wake: &WakeSignal) -> HidStreamResult<WaitToken>;

    /// Block until a report is readable, the device fails, the wake signal
    /// fires or `timeout` elapses (`None` waits forever).
    fn poll(&mut self, token: WaitToken, timeout: Option<Duration>) -> HidStreamResult<Readiness>;

    /// Drop the registration. Unknown or stale tokens are ignored.
    fn unregister(&mut self, token: WaitToken) -> HidStreamResult<()>;

    /// Descriptor a caller can add to its own multiplexed wait.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Turns a [`DeviceAddress`] into an opened transport.
pub trait DeviceOpener: Send {
    fn open_device(&self, address: &DeviceAddress) -> HidStreamResult<Box<dyn ReportTransport>>;
}

impl<F> DeviceOpener for F
where
    F: Fn(&DeviceAddress) -> HidStreamResult<Box<dyn ReportTransport>> + Send,
{
    fn open_device(&self, address: &DeviceAddress) -> HidStreamResult<Box<dyn ReportTransport>> {
        self(address)
    }
}

pub mod mock {
    //! In-memory device for tests. Clones share state, so a test keeps one
    //! handle to drive the device while the stream owns another.

    use super::*;
    use crate::HidStreamError;
    use crate::wake::HookId;
    use parking_lot::{Condvar, Mutex};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use std::time::Instant;

    /// Lifecycle calls observed by the mock, in order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockEvent {
        Registered(WaitToken),
        Unregistered(WaitToken),
        Closed,
    }

    struct Registration {
        token: WaitToken,
        wake: WakeSignal,
        hook: HookId,
    }

    #[derive(Default)]
    struct MockState {
        read_queue: VecDeque<Vec<u8>>,
        write_history: Vec<Vec<u8>>,
        write_error: Option<String>,
        hung_up: bool,
        poll_error: bool,
        woken: bool,
        close_count: usize,
        events: Vec<MockEvent>,
        registration: Option<Registration>,
        next_token: u64,
    }

    #[derive(Default)]
    struct Shared {
        state: Mutex<MockState>,
        cond: Condvar,
    }

    #[derive(Clone)]
    pub struct MockReportDevice {
        shared: Arc<Shared>,
        supports_waiting: bool,
    }

    impl MockReportDevice {
        pub fn new() -> Self {
            Self {
                shared: Arc::new(Shared::default()),
                supports_waiting: true,
            }
        }

        /// A device without the [`Waitable`] capability.
        pub fn direct_only() -> Self {
            Self {
                supports_waiting: false,
                ..Self::new()
            }
        }

        pub fn queue_read(&self, data: Vec<u8>) {
            self.shared.state.lock().read_queue.push_back(data);
            self.shared.cond.notify_all();
        }

        pub fn get_write_history(&self) -> Vec<Vec<u8>> {
            self.shared.state.lock().write_history.clone()
        }

        pub fn pending_reads(&self) -> usize {
            self.shared.state.lock().read_queue.len()
        }

        /// Make every following write fail with a transport error.
        pub fn fail_writes(&self, message: impl Into<String>) {
            self.shared.state.lock().write_error = Some(message.into());
        }

        /// Simulate the device disappearing. Queued reports stay readable.
        pub fn hang_up(&self) {
            self.shared.state.lock().hung_up = true;
            self.shared.cond.notify_all();
        }

        /// Make the next poll report an error condition.
        pub fn signal_error(&self) {
            self.shared.state.lock().poll_error = true;
            self.shared.cond.notify_all();
        }

        pub fn close_count(&self) -> usize {
            self.shared.state.lock().close_count
        }

        pub fn events(&self) -> Vec<MockEvent> {
            self.shared.state.lock().events.clone()
        }

        pub fn is_registered(&self) -> bool {
            self.shared.state.lock().registration.is_some()
        }
    }

    impl Default for MockReportDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ReportTransport for MockReportDevice {
        fn read_report(&mut self, timeout: Duration) -> HidStreamResult<Vec<u8>> {
            let deadline = Instant::now().checked_add(timeout);
            let mut state = self.shared.state.lock();
            loop {
                if state.close_count > 0 {
                    return Err(HidStreamError::DeviceNotOpen);
                }
                if let Some(report) = state.read_queue.pop_front() {
                    return Ok(report);
                }
                if state.hung_up {
                    return Err(HidStreamError::disconnected("mock device"));
                }
                let Some(deadline) = deadline else {
                    self.shared.cond.wait(&mut state);
                    continue;
                };
                if timeout.is_zero() || self.shared.cond.wait_until(&mut state, deadline).timed_out()
                {
                    return Ok(state.read_queue.pop_front().unwrap_or_default());
                }
            }
        }

        fn write_report(&mut self, report: &[u8]) -> HidStreamResult<usize> {
            let mut state = self.shared.state.lock();
            if state.close_count > 0 {
                return Err(HidStreamError::DeviceNotOpen);
            }
            if state.hung_up {
                return Err(HidStreamError::disconnected("mock device"));
            }
            if let Some(message) = &state.write_error {
                return Err(HidStreamError::transport(message.clone()));
            }
            state.write_history.push(report.to_vec());
            Ok(report.len())
        }

        fn close(&mut self) -> HidStreamResult<()> {
            let mut state = self.shared.state.lock();
            state.close_count += 1;
            state.events.push(MockEvent::Closed);
            Ok(())
        }

        fn waitable(&mut self) -> Option<&mut dyn Waitable> {
            if self.supports_waiting {
                Some(self)
            } else {
                None
            }
        }
    }

    impl Waitable for MockReportDevice {
        fn register(&mut self, wake: &WakeSignal) -> HidStreamResult<WaitToken> {
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            let hook = wake.add_hook(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.state.lock().woken = true;
                    shared.cond.notify_all();
                }
            });

            let mut state = self.shared.state.lock();
            let token = WaitToken::new(state.next_token);
            state.next_token += 1;
            state.registration = Some(Registration {
                token,
                wake: wake.clone(),
                hook,
            });
            state.events.push(MockEvent::Registered(token));
            Ok(token)
        }

        fn poll(&mut self, token: WaitToken, timeout: Option<Duration>) -> HidStreamResult<Readiness> {
            let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
            let mut state = self.shared.state.lock();
            if state.registration.as_ref().map(|r| r.token) != Some(token) {
                return Err(HidStreamError::transport("unknown wait token"));
            }

            loop {
                if std::mem::take(&mut state.woken) {
                    return Ok(Readiness::Woken);
                }
                if std::mem::take(&mut state.poll_error) {
                    return Ok(Readiness::Error);
                }
                if !state.read_queue.is_empty() {
                    return Ok(Readiness::Readable);
                }
                if state.hung_up {
                    return Ok(Readiness::HangUp);
                }
                match deadline {
                    Some(deadline) => {
                        if self.shared.cond.wait_until(&mut state, deadline).timed_out() {
                            if !state.read_queue.is_empty() {
                                return Ok(Readiness::Readable);
                            }
                            return Ok(Readiness::TimedOut);
                        }
                    }
                    None => self.shared.cond.wait(&mut state),
                }
            }
        }

        fn unregister(&mut self, token: WaitToken) -> HidStreamResult<()> {
            let mut state = self.shared.state.lock();
            if state.registration.as_ref().map(|r| r.token) == Some(token) {
                if let Some(registration) = state.registration.take() {
                    registration.wake.remove_hook(registration.hook);
                }
                state.events.push(MockEvent::Unregistered(token));
            }
            Ok(())
        }
    }

    /// Opener over a fixed set of mock devices.
    #[derive(Default)]
    pub struct MockOpener {
        devices: Vec<(DeviceAddress, MockReportDevice)>,
        open_count: AtomicUsize,
    }

    impl MockOpener {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_device(&mut self, address: impl Into<DeviceAddress>, device: MockReportDevice) {
            self.devices.push((address.into(), device));
        }

        pub fn with_device(
            mut self,
            address: impl Into<DeviceAddress>,
            device: MockReportDevice,
        ) -> Self {
            self.add_device(address, device);
            self
        }

        pub fn device_count(&self) -> usize {
            self.devices.len()
        }

        pub fn open_count(&self) -> usize {
            self.open_count.load(Ordering::SeqCst)
        }
    }

    impl DeviceOpener for MockOpener {
        fn open_device(
            &self,
            address: &DeviceAddress,
        ) -> HidStreamResult<Box<dyn ReportTransport>> {
            let (_, device) = self
                .devices
                .iter()
                .find(|(known, _)| known == address)
                .ok_or_else(|| HidStreamError::open_failed(address.to_string(), "no such device"))?;
            self.open_count.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(device.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockEvent, MockOpener, MockReportDevice};
    use super::*;
    use crate::{DeviceIdentity, HidStreamError};

    #[test]
    fn test_mock_device_write() -> HidStreamResult<()> {
        let mut device = MockReportDevice::new();

        let written = device.write_report(&[0x01, 0x02, 0x03])?;
        assert_eq!(written, 3);

        let history = device.get_write_history();
        assert_eq!(history, vec![vec![0x01, 0x02, 0x03]]);
        Ok(())
    }

    #[test]
    fn test_mock_device_read() -> HidStreamResult<()> {
        let mut device = MockReportDevice::new();
        device.queue_read(vec![0xAA, 0xBB, 0xCC]);

        assert_eq!(device.read_report(Duration::ZERO)?, vec![0xAA, 0xBB, 0xCC]);
        assert!(device.read_report(Duration::ZERO)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_mock_device_read_times_out_empty() -> HidStreamResult<()> {
        let mut device = MockReportDevice::new();
        assert!(device.read_report(Duration::from_millis(10))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_mock_device_hang_up() -> HidStreamResult<()> {
        let mut device = MockReportDevice::new();
        device.queue_read(vec![0x01]);
        device.hang_up();

        assert_eq!(device.read_report(Duration::ZERO)?, vec![0x01]);
        assert!(matches!(
            device.read_report(Duration::ZERO),
            Err(HidStreamError::DeviceDisconnected(_))
        ));
        assert!(matches!(
            device.write_report(&[0x01]),
            Err(HidStreamError::DeviceDisconnected(_))
        ));
        Ok(())
    }

    #[test]
    fn test_mock_waitable_woken_by_signal() -> HidStreamResult<()> {
        let mut device = MockReportDevice::new();
        let wake = WakeSignal::new();
        let waitable = device.waitable().ok_or(HidStreamError::DeviceNotOpen)?;
        let token = waitable.register(&wake)?;

        assert_eq!(
            waitable.poll(token, Some(Duration::from_millis(5)))?,
            Readiness::TimedOut
        );

        wake.set();
        assert_eq!(waitable.poll(token, None)?, Readiness::Woken);

        waitable.unregister(token)?;
        waitable.unregister(token)?;
        assert_eq!(wake.hook_count(), 0);
        assert_eq!(
            device.events(),
            vec![MockEvent::Registered(token), MockEvent::Unregistered(token)]
        );
        Ok(())
    }

    #[test]
    fn test_direct_only_device_has_no_waitable() {
        let mut device = MockReportDevice::direct_only();
        assert!(device.waitable().is_none());
    }

    #[test]
    fn test_mock_opener() -> HidStreamResult<()> {
        let identity = DeviceIdentity::new(0x1234, 0x5678);
        let opener = MockOpener::new()
            .with_device(identity, MockReportDevice::new())
            .with_device(DeviceAddress::path("/dev/hidraw1"), MockReportDevice::new());
        assert_eq!(opener.device_count(), 2);

        let mut transport = opener.open_device(&identity.into())?;
        assert_eq!(transport.write_report(&[0x01])?, 1);
        assert_eq!(opener.open_count(), 1);

        let missing = opener.open_device(&DeviceAddress::path("/dev/nonexistent"));
        assert!(matches!(
            missing,
            Err(HidStreamError::DeviceOpenFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_closure_opener() {
        let opener = |address: &DeviceAddress| -> HidStreamResult<Box<dyn ReportTransport>> {
            Err(HidStreamError::open_failed(address.to_string(), "denied"))
        };
        let result = opener.open_device(&DeviceAddress::path("/dev/hidraw9"));
        assert!(matches!(result, Err(HidStreamError::DeviceOpenFailed { .. })));
    }
}
