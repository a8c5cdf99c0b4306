//! `hidapi` transport for `hidstream`
//!
//! hidapi has no pollable handle, so [`HidApiTransport`] only supports the
//! direct strategy: each report read blocks inside `hid_read_timeout`.
//! Opening a stream with the event-driven strategy over this transport fails
//! with `DeviceOpenFailed`.

#![deny(clippy::unwrap_used)]

mod opener;
mod transport;

pub use opener::HidApiOpener;
pub use transport::{READ_CAPACITY, HidApiTransport};
