//! Serial-port style byte streams over HID report devices
//!
//! A HID device exchanges fixed-size reports. This crate buffers those
//! reports behind a blocking `read(n)` / `write(bytes)` / `in_waiting`
//! contract, framing outbound payloads into padded reports and stripping the
//! pad byte from inbound ones. A [`WakeSignal`] can be raised from any thread
//! to make a blocked read return empty.
//!
//! Opening devices is delegated to a [`DeviceOpener`]; platform adapters live
//! in the `hidstream-hidraw` and `hidstream-hidapi` crates.
//!
//! # Example
//!
//! ```
//! use hidstream::prelude::*;
//! use hidstream::transport::mock::{MockOpener, MockReportDevice};
//!
//! # fn main() -> HidStreamResult<()> {
//! let device = MockReportDevice::new();
//! device.queue_read(vec![0x00, b'o', b'k']);
//! let address = DeviceAddress::path("/dev/hidraw0");
//! let opener = MockOpener::new().with_device(address.clone(), device.clone());
//!
//! let mut stream = HidStream::new(address, StreamConfig::default(), opener)?;
//! stream.open()?;
//! assert_eq!(stream.read(2)?, b"ok");
//!
//! stream.write(b"ping")?;
//! assert_eq!(device.get_write_history()[0].len(), 65);
//! stream.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod address;
pub mod config;
pub mod error;
pub mod hid;
pub mod interface;
pub mod prelude;
pub mod report;
pub mod transport;
pub mod wake;

pub use address::{DeviceAddress, DeviceIdentity};
pub use config::{AccessStrategy, DEFAULT_DIRECT_READ_TIMEOUT, StreamConfig, StreamConfigBuilder};
pub use error::{HidStreamError, HidStreamResult};
pub use hid::{HidReportSource, HidStream};
pub use interface::{BufferedInterface, InterfaceState, PacketSource, WaitOutcome};
pub use report::{DEFAULT_REPORT_SIZE, ReportFraming};
pub use transport::{DeviceOpener, Readiness, ReportTransport, WaitToken, Waitable};
pub use wake::{HookId, WakeHook, WakeSignal};
