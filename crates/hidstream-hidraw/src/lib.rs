//! Linux hidraw transport for `hidstream`
//!
//! [`HidrawDevice`] supports both access strategies. Its waitable polls the
//! device node together with a self-pipe, so raising the stream's wake
//! signal interrupts a blocked `poll(2)` immediately. With the event-driven
//! strategy, [`HidStream::raw_fd`](hidstream::HidStream::raw_fd) returns the
//! node's descriptor for use in a caller's own event loop.
//!
//! ```no_run
//! use hidstream::{DeviceAddress, HidStream, StreamConfig};
//! use hidstream_hidraw::HidrawOpener;
//!
//! # fn main() -> hidstream::HidStreamResult<()> {
//! let config = StreamConfig::builder().event_driven().build()?;
//! let mut stream = HidStream::new(DeviceAddress::path("/dev/hidraw0"), config, HidrawOpener)?;
//! stream.open()?;
//! stream.write(b"hello")?;
//! let reply = stream.read(5)?;
//! # drop(reply);
//! # Ok(())
//! # }
//! ```

#![cfg(target_os = "linux")]
#![deny(clippy::unwrap_used)]

mod device;
mod opener;

pub use device::{HidrawDevice, MAX_REPORT_LEN};
pub use opener::HidrawOpener;
